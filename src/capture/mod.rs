//! Microphone acquisition and fan-out of the live stream.
//!
//! The gateway opens a device and produces a [`LiveInput`]; the recording
//! session and the signal analyzer both read from it through taps, and only
//! the gateway closes it.

pub mod gateway;
pub mod input;
pub mod synthetic;

pub use gateway::{mix_to_mono, CaptureGateway, CpalGateway};
pub use input::{InputEvent, LiveInput, SampleWindow, TapBus, TapId};
pub use synthetic::{SyntheticFeeder, SyntheticGateway};
