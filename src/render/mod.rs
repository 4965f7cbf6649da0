//! Live visualization: drawing surfaces, strategies and the frame scheduler.

pub mod scheduler;
pub mod surface;
pub mod visualizations;

pub use scheduler::{FramePacer, Liveness, RenderScheduler};
pub use surface::{CanvasView, PixelCanvas, Rgb, Surface};
pub use visualizations::{build, Paint, Visualization};
