//! Frequency spectrum bars, optionally mirrored around the center axes.

use super::{Paint, Visualization};
use crate::analysis::AnalysisFrame;
use crate::render::surface::Surface;

/// One rectangle per frequency column, height proportional to magnitude / 255.
pub struct BarSpectrum {
    paint: Paint,
    mirrored: bool,
}

impl BarSpectrum {
    pub fn new(paint: Paint, mirrored: bool) -> Self {
        Self { paint, mirrored }
    }

    /// Draws the bars without touching the previous frame.
    pub fn paint_layer(&self, surface: &mut dyn Surface, frequency: &[u8]) {
        let (width, height) = (surface.width() as f32, surface.height() as f32);
        if width < 1.0 || height < 1.0 {
            return;
        }
        if self.mirrored {
            self.paint_mirrored(surface, frequency, width, height);
        } else {
            self.paint_bottom_up(surface, frequency, width, height);
        }
    }

    fn paint_bottom_up(&self, surface: &mut dyn Surface, frequency: &[u8], width: f32, height: f32) {
        let columns = fold_to_columns(frequency, width as usize);
        let bar_width = width / columns.len() as f32;
        let gap = if bar_width >= 3.0 { 1.0 } else { 0.0 };

        for (i, &magnitude) in columns.iter().enumerate() {
            // Silent bins keep a one-pixel baseline.
            let bar_height = (magnitude as f32 / 255.0 * height).max(1.0);
            surface.fill_rect(
                i as f32 * bar_width,
                height - bar_height,
                bar_width - gap,
                bar_height,
                self.paint.color,
                self.paint.opacity,
            );
        }
    }

    /// Bars grow outward from the center in both directions, up and down.
    fn paint_mirrored(&self, surface: &mut dyn Surface, frequency: &[u8], width: f32, height: f32) {
        let half_width = (width / 2.0).max(1.0);
        let columns = fold_to_columns(frequency, half_width as usize);
        let bar_width = half_width / columns.len() as f32;
        let gap = if bar_width >= 3.0 { 1.0 } else { 0.0 };
        let (center_x, center_y) = (width / 2.0, height / 2.0);

        for (i, &magnitude) in columns.iter().enumerate() {
            let bar_height = (magnitude as f32 / 255.0 * center_y).max(1.0);
            let offset = i as f32 * bar_width;
            for x in [center_x + offset, center_x - offset - bar_width] {
                surface.fill_rect(
                    x,
                    center_y - bar_height,
                    bar_width - gap,
                    bar_height,
                    self.paint.color,
                    self.paint.opacity,
                );
                surface.fill_rect(
                    x,
                    center_y,
                    bar_width - gap,
                    bar_height,
                    self.paint.color,
                    self.paint.opacity * 0.5,
                );
            }
        }
    }
}

impl Visualization for BarSpectrum {
    fn name(&self) -> &'static str {
        if self.mirrored {
            "mirrored"
        } else {
            "bars"
        }
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &AnalysisFrame) {
        self.paint.prepare(surface);
        self.paint_layer(surface, &frame.frequency);
    }
}

/// Reduces `bins` to at most `max_columns` values, keeping each group's peak.
///
/// An empty input yields a single silent column so a baseline is still drawn.
pub fn fold_to_columns(bins: &[u8], max_columns: usize) -> Vec<u8> {
    let max_columns = max_columns.max(1);
    if bins.is_empty() {
        return vec![0];
    }
    if bins.len() <= max_columns {
        return bins.to_vec();
    }
    (0..max_columns)
        .map(|col| {
            let start = col * bins.len() / max_columns;
            let end = ((col + 1) * bins.len() / max_columns).max(start + 1);
            bins[start..end].iter().copied().max().unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::{PixelCanvas, Rgb};

    #[test]
    fn test_fold_keeps_group_peaks() {
        assert_eq!(fold_to_columns(&[1, 9, 3, 4], 2), vec![9, 4]);
        assert_eq!(fold_to_columns(&[1, 2], 8), vec![1, 2]);
        assert_eq!(fold_to_columns(&[], 8), vec![0]);
    }

    #[test]
    fn test_full_scale_bar_reaches_the_top() {
        let paint = Paint {
            opacity: 1.0,
            ..Paint::default()
        };
        let mut canvas = PixelCanvas::new(4, 10, Rgb::BLACK);
        BarSpectrum::new(paint, false).paint_layer(&mut canvas, &[255, 0, 0, 0]);

        assert_eq!(canvas.pixel(0, 0), Some(paint.color));
        assert_eq!(canvas.pixel(1, 8), Some(Rgb::BLACK));
        assert_eq!(canvas.pixel(1, 9), Some(paint.color));
    }

    #[test]
    fn test_mirrored_bars_are_symmetric() {
        let mut canvas = PixelCanvas::new(16, 16, Rgb::BLACK);
        BarSpectrum::new(Paint::default(), true).paint_layer(&mut canvas, &[200, 120, 60, 10]);

        for y in 0..16 {
            for x in 0..8 {
                assert_eq!(canvas.pixel(x, y), canvas.pixel(15 - x, y), "at ({x}, {y})");
            }
        }
    }
}
