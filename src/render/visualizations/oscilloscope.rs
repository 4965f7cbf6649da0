//! Time-domain oscilloscope line.

use super::{Paint, Visualization};
use crate::analysis::AnalysisFrame;
use crate::render::surface::Surface;

/// Connected line through the waveform, normalized to [-1, 1] and scaled to the surface height.
pub struct Oscilloscope {
    paint: Paint,
}

impl Oscilloscope {
    pub fn new(paint: Paint) -> Self {
        Self { paint }
    }

    /// Draws the line without touching the previous frame.
    pub fn paint_layer(&self, surface: &mut dyn Surface, time: &[u8]) {
        let (width, height) = (surface.width(), surface.height());
        if width == 0 || height == 0 {
            return;
        }
        let points = trace_points(time, width as f32, height as f32);
        surface.polyline(&points, self.paint.color, self.paint.opacity);
    }
}

impl Visualization for Oscilloscope {
    fn name(&self) -> &'static str {
        "oscilloscope"
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &AnalysisFrame) {
        self.paint.prepare(surface);
        self.paint_layer(surface, &frame.time);
    }
}

/// Maps waveform bytes onto surface coordinates spanning the full width.
///
/// Fewer than two samples produce a flat centerline.
fn trace_points(time: &[u8], width: f32, height: f32) -> Vec<(f32, f32)> {
    let max_x = (width - 1.0).max(0.0);
    let half = (height - 1.0).max(0.0) / 2.0;

    if time.len() < 2 {
        return vec![(0.0, half), (max_x, half)];
    }

    let step = max_x / (time.len() - 1) as f32;
    time.iter()
        .enumerate()
        .map(|(i, &v)| {
            let normalized = v as f32 / 128.0 - 1.0;
            (i as f32 * step, half * (1.0 - normalized))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::{PixelCanvas, Rgb};

    #[test]
    fn test_silence_is_a_centerline() {
        let points = trace_points(&[128; 16], 31.0, 21.0);
        assert!(points.iter().all(|&(_, y)| (y - 10.0).abs() < f32::EPSILON));
        assert_eq!(points.first().map(|p| p.0), Some(0.0));
        assert_eq!(points.last().map(|p| p.0), Some(30.0));
    }

    #[test]
    fn test_extremes_map_to_edges() {
        let points = trace_points(&[0, 255], 10.0, 11.0);
        assert!((points[0].1 - 10.0).abs() < 1e-4);
        assert!(points[1].1 < 0.1);
    }

    #[test]
    fn test_draws_across_full_width() {
        let mut canvas = PixelCanvas::new(40, 20, Rgb::BLACK);
        Oscilloscope::new(Paint::default()).paint_layer(&mut canvas, &[128; 256]);
        for x in 0..40 {
            assert!((0..20).any(|y| canvas.pixel(x, y) != Some(Rgb::BLACK)));
        }
    }
}
