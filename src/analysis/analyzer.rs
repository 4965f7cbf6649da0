//! Signal analyzer: a read-only tap producing byte-scaled spectrum and waveform snapshots.
//!
//! Sampling is pull-based. Each call reads the most recent `fft_size` samples
//! of the live input, so the output describes the signal right now rather
//! than any buffered history.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::{Arc, Mutex, Weak};

use crate::capture::input::lock;
use crate::capture::{LiveInput, SampleWindow, TapBus, TapId};
use crate::error::{PipelineError, Result};

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;
pub const DEFAULT_FFT_SIZE: usize = 256;

/// Decibel range mapped onto 0..=255 for frequency magnitudes.
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Checks that `fft_size` is a supported power of two.
pub fn validate_fft_size(fft_size: usize) -> Result<usize> {
    if fft_size.is_power_of_two() && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
        Ok(fft_size)
    } else {
        Err(PipelineError::InvalidTransformSize(fft_size))
    }
}

/// One tick's worth of analyzer output. Produced and consumed within a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisFrame {
    /// Per-bin magnitudes, `fft_size / 2` values
    pub frequency: Vec<u8>,
    /// Waveform amplitudes centered on 128, `fft_size` values
    pub time: Vec<u8>,
}

impl AnalysisFrame {
    /// Frame describing silence for the given transform size.
    pub fn silent(fft_size: usize) -> Self {
        Self {
            frequency: vec![0; fft_size / 2],
            time: vec![128; fft_size],
        }
    }

    /// Input level as a percentage, from the peak waveform deviation in dBFS.
    ///
    /// Maps -60..0 dBFS onto 0..100 so quiet speech still moves the meter.
    pub fn level(&self) -> u8 {
        let peak = self
            .time
            .iter()
            .map(|&v| (v as i16 - 128).unsigned_abs())
            .max()
            .unwrap_or(0);
        if peak == 0 {
            return 0;
        }
        let db_fs = 20.0 * (peak as f32 / 128.0).log10();
        ((db_fs + 60.0) / 60.0 * 100.0).clamp(0.0, 100.0) as u8
    }
}

/// Where a render tick pulls its samples from.
pub trait FrameSource {
    fn sample_frequency(&mut self) -> Vec<u8>;
    fn sample_time(&mut self) -> Vec<u8>;
}

/// FFT analyzer attached to a live input through a window tap.
pub struct SignalAnalyzer {
    fft_size: usize,
    smoothing: f32,
    window: Arc<Mutex<SampleWindow>>,
    tap: Option<TapId>,
    bus: Weak<TapBus>,
    fft: Arc<dyn Fft<f32>>,
    blackman: Vec<f32>,
    scratch: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl SignalAnalyzer {
    /// Attaches a read-only tap to `input`.
    ///
    /// `smoothing` in [0, 1) blends each magnitude with the previous call's,
    /// which steadies the bars without retaining any audio.
    pub fn attach(input: &LiveInput, fft_size: usize, smoothing: f32) -> Result<Self> {
        let fft_size = validate_fft_size(fft_size)?;
        let (tap, window) = input.attach_window(fft_size)?;

        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        let blackman = blackman_window(fft_size);

        tracing::debug!(
            "Signal analyzer attached to {} (fft_size={}, smoothing={})",
            input.id(),
            fft_size,
            smoothing
        );

        Ok(Self {
            fft_size,
            smoothing: smoothing.clamp(0.0, 0.99),
            window,
            tap: Some(tap),
            bus: Arc::downgrade(input.bus()),
            fft,
            blackman,
            scratch: vec![0.0; fft_size],
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; fft_size / 2],
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of values returned by [`Self::sample_frequency`].
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn is_connected(&self) -> bool {
        self.tap.is_some()
    }

    fn refresh_scratch(&mut self) {
        lock(&self.window).snapshot(&mut self.scratch);
    }

    /// Current waveform as bytes: 128 is the zero line, 0 and 255 full scale.
    pub fn sample_time(&mut self) -> Vec<u8> {
        self.refresh_scratch();
        self.scratch
            .iter()
            .map(|&s| (128.0 * (1.0 + s)).clamp(0.0, 255.0) as u8)
            .collect()
    }

    /// Current spectrum as bytes, `fft_size / 2` bins from DC upwards.
    pub fn sample_frequency(&mut self) -> Vec<u8> {
        self.refresh_scratch();

        for ((slot, &sample), &w) in self
            .spectrum
            .iter_mut()
            .zip(self.scratch.iter())
            .zip(self.blackman.iter())
        {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.spectrum);

        let scale = 1.0 / self.fft_size as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        let tau = self.smoothing;

        self.smoothed
            .iter_mut()
            .zip(self.spectrum.iter())
            .map(|(previous, bin)| {
                let magnitude = bin.norm() * scale;
                *previous = tau * *previous + (1.0 - tau) * magnitude;
                if *previous <= f32::MIN_POSITIVE {
                    return 0;
                }
                let db = 20.0 * previous.log10();
                (255.0 * (db - MIN_DECIBELS) / range).clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Samples both domains for one tick.
    pub fn sample(&mut self) -> AnalysisFrame {
        AnalysisFrame {
            frequency: self.sample_frequency(),
            time: self.sample_time(),
        }
    }

    /// Detaches the tap. Later samples describe silence. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        let Some(tap) = self.tap.take() else {
            return;
        };
        if let Some(bus) = self.bus.upgrade() {
            bus.detach(tap);
        }
        lock(&self.window).clear();
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
        tracing::debug!("Signal analyzer disconnected");
    }
}

impl FrameSource for SignalAnalyzer {
    fn sample_frequency(&mut self) -> Vec<u8> {
        SignalAnalyzer::sample_frequency(self)
    }

    fn sample_time(&mut self) -> Vec<u8> {
        SignalAnalyzer::sample_time(self)
    }
}

impl Drop for SignalAnalyzer {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Blackman window (alpha = 0.16).
fn blackman_window(size: usize) -> Vec<f32> {
    let alpha = 0.16;
    let a0 = (1.0 - alpha) / 2.0;
    let a1 = 0.5;
    let a2 = alpha / 2.0;
    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            a0 - a1 * (2.0 * std::f32::consts::PI * x).cos()
                + a2 * (4.0 * std::f32::consts::PI * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureGateway, SyntheticGateway};
    use std::time::Duration;

    #[test]
    fn test_output_lengths_for_all_sizes() {
        let mut gateway = SyntheticGateway::new(16000);
        let input = gateway.acquire().unwrap();
        gateway
            .feeder()
            .push_tone(440.0, 0.5, Duration::from_millis(100));

        let mut size = MIN_FFT_SIZE;
        while size <= MAX_FFT_SIZE {
            let mut analyzer = SignalAnalyzer::attach(&input, size, 0.0).unwrap();
            gateway
                .feeder()
                .push_tone(440.0, 0.5, Duration::from_millis(300));
            assert_eq!(analyzer.sample_frequency().len(), size / 2);
            assert_eq!(analyzer.sample_time().len(), size);
            size *= 2;
        }
    }

    #[test]
    fn test_rejects_invalid_sizes() {
        for size in [0, 16, 100, 255, 65536] {
            assert_eq!(
                validate_fft_size(size),
                Err(PipelineError::InvalidTransformSize(size))
            );
        }
        assert_eq!(validate_fft_size(256), Ok(256));
    }

    #[test]
    fn test_silence_is_a_flat_baseline() {
        let mut gateway = SyntheticGateway::new(16000);
        let input = gateway.acquire().unwrap();
        let mut analyzer = SignalAnalyzer::attach(&input, 256, 0.8).unwrap();
        gateway.feeder().push(&[0; 512]);

        assert!(analyzer.sample_frequency().iter().all(|&v| v == 0));
        assert!(analyzer.sample_time().iter().all(|&v| v == 128));
    }

    #[test]
    fn test_tone_peaks_near_its_bin() {
        let mut gateway = SyntheticGateway::new(16000);
        let input = gateway.acquire().unwrap();
        let mut analyzer = SignalAnalyzer::attach(&input, 256, 0.0).unwrap();
        gateway
            .feeder()
            .push_tone(1000.0, 0.05, Duration::from_millis(50));

        let spectrum = analyzer.sample_frequency();
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by_key(|(_, &v)| v)
            .map(|(i, _)| i)
            .unwrap();
        // 16000 Hz / 256 = 62.5 Hz per bin
        assert!((15..=17).contains(&peak), "peak at bin {peak}");
        assert!(spectrum[peak] > 180);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut gateway = SyntheticGateway::new(16000);
        let input = gateway.acquire().unwrap();
        let mut analyzer = SignalAnalyzer::attach(&input, 64, 0.0).unwrap();
        assert_eq!(input.bus().tap_count(), 1);

        analyzer.disconnect();
        analyzer.disconnect();
        assert!(!analyzer.is_connected());
        assert_eq!(input.bus().tap_count(), 0);

        gateway.feeder().push(&[20000; 64]);
        assert!(analyzer.sample_time().iter().all(|&v| v == 128));
    }

    #[test]
    fn test_level_of_silent_and_loud_frames() {
        assert_eq!(AnalysisFrame::silent(64).level(), 0);
        let loud = AnalysisFrame {
            frequency: vec![0; 32],
            time: vec![255; 64],
        };
        assert!(loud.level() > 95);
    }
}
