//! Spectrum bars with the waveform drawn over them.

use super::{BarSpectrum, Oscilloscope, Paint, Visualization};
use crate::analysis::AnalysisFrame;
use crate::render::surface::Surface;

pub struct Hybrid {
    paint: Paint,
    bars: BarSpectrum,
    line: Oscilloscope,
}

impl Hybrid {
    pub fn new(paint: Paint) -> Self {
        Self {
            paint,
            bars: BarSpectrum::new(paint.dimmed(0.5), false),
            line: Oscilloscope::new(paint),
        }
    }
}

impl Visualization for Hybrid {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &AnalysisFrame) {
        self.paint.prepare(surface);
        self.bars.paint_layer(surface, &frame.frequency);
        self.line.paint_layer(surface, &frame.time);
    }
}
