//! In-process capture gateway for exercising the pipeline without hardware.
//!
//! A [`SyntheticFeeder`] plays the role of the device callback: it pushes PCM
//! blocks into the acquired input's tap bus or ends the stream.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::gateway::CaptureGateway;
use super::input::{LiveInput, TapBus};
use crate::error::{PipelineError, Result};

/// Stream guard that counts how many times a synthetic stream was stopped.
struct SyntheticStream {
    stops: Arc<AtomicUsize>,
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Capture gateway that hands out synthetic live inputs.
#[derive(Clone)]
pub struct SyntheticGateway {
    sample_rate: u32,
    deny: bool,
    acquisitions: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    last_bus: Arc<std::sync::Mutex<Weak<TapBus>>>,
}

impl SyntheticGateway {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            deny: false,
            acquisitions: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
            last_bus: Arc::new(std::sync::Mutex::new(Weak::new())),
        }
    }

    /// A gateway whose every acquisition is refused.
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::new(16000)
        }
    }

    /// Feeder for the most recently acquired input.
    pub fn feeder(&self) -> SyntheticFeeder {
        SyntheticFeeder {
            bus: super::input::lock(&self.last_bus).clone(),
            sample_rate: self.sample_rate,
        }
    }

    /// Number of successful acquisitions.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Number of streams whose tracks have been stopped.
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl CaptureGateway for SyntheticGateway {
    fn acquire(&mut self) -> Result<LiveInput> {
        if self.deny {
            return Err(PipelineError::PermissionDenied(
                "synthetic device refused access".to_string(),
            ));
        }
        let bus = Arc::new(TapBus::new());
        *super::input::lock(&self.last_bus) = Arc::downgrade(&bus);
        self.acquisitions.fetch_add(1, Ordering::SeqCst);

        let stream = SyntheticStream {
            stops: Arc::clone(&self.stops),
        };
        Ok(LiveInput::new(
            "synthetic",
            self.sample_rate,
            bus,
            Box::new(stream),
        ))
    }
}

/// Pushes audio into a synthetic input as if it came from a device.
pub struct SyntheticFeeder {
    bus: Weak<TapBus>,
    sample_rate: u32,
}

impl SyntheticFeeder {
    /// Delivers one block of samples. Ignored once the input is gone.
    pub fn push(&self, samples: &[i16]) {
        if let Some(bus) = self.bus.upgrade() {
            bus.dispatch(samples);
        }
    }

    /// Delivers a sine tone in blocks of 10 ms.
    pub fn push_tone(&self, frequency: f32, amplitude: f32, duration: Duration) {
        let total = (duration.as_secs_f64() * self.sample_rate as f64) as usize;
        let block = (self.sample_rate as usize / 100).max(1);
        let samples: Vec<i16> = (0..total)
            .map(|n| {
                let t = n as f32 / self.sample_rate as f32;
                let value = (2.0 * std::f32::consts::PI * frequency * t).sin() * amplitude;
                (value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
            })
            .collect();
        for chunk in samples.chunks(block) {
            self.push(chunk);
        }
    }

    /// Simulates the device disappearing mid-stream.
    pub fn end(&self, reason: &str) {
        if let Some(bus) = self.bus.upgrade() {
            bus.end(reason);
        }
    }
}
