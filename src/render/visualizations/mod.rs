//! Interchangeable drawing strategies for the live recording display.
//!
//! Every strategy is a pure function of the current [`AnalysisFrame`] and its
//! static [`Paint`], so any of them can be selected when a session starts.
//! New styles are added by implementing [`Visualization`] and extending [`build`].

pub mod hybrid;
pub mod oscilloscope;
pub mod spectrum;

pub use hybrid::Hybrid;
pub use oscilloscope::Oscilloscope;
pub use spectrum::BarSpectrum;

use super::surface::{Rgb, Surface};
use crate::analysis::AnalysisFrame;
use crate::config::{Persistence, VisualizationStyle};

/// A drawing algorithm over one analysis frame.
pub trait Visualization {
    fn name(&self) -> &'static str;

    /// Replaces or fades the previous frame, then draws `frame`.
    fn draw(&self, surface: &mut dyn Surface, frame: &AnalysisFrame);
}

/// Static color and persistence parameters shared by all strategies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub color: Rgb,
    pub opacity: f32,
    pub persistence: Persistence,
    /// Fraction faded toward the background per frame when leaving a trail
    pub trail_decay: f32,
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            color: Rgb::new(0xEA, 0x38, 0x4C),
            opacity: 0.8,
            persistence: Persistence::default(),
            trail_decay: 0.2,
        }
    }
}

impl Paint {
    /// Removes the previous frame according to the persistence effect.
    pub fn prepare(&self, surface: &mut dyn Surface) {
        match self.persistence {
            Persistence::Clear => surface.clear(),
            Persistence::Trail => surface.fade(self.trail_decay),
        }
    }

    /// Same paint at a fraction of the opacity.
    pub fn dimmed(&self, factor: f32) -> Self {
        Self {
            opacity: self.opacity * factor,
            ..*self
        }
    }
}

/// Creates the strategy for `style`.
pub fn build(style: VisualizationStyle, paint: Paint) -> Box<dyn Visualization> {
    match style {
        VisualizationStyle::Bars => Box::new(BarSpectrum::new(paint, false)),
        VisualizationStyle::Mirrored => Box::new(BarSpectrum::new(paint, true)),
        VisualizationStyle::Oscilloscope => Box::new(Oscilloscope::new(paint)),
        VisualizationStyle::Hybrid => Box::new(Hybrid::new(paint)),
    }
}
