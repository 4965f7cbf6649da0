//! Capture device gateway: opens the microphone and owns its release.
//!
//! Audio is captured from the configured input device at its native sample
//! rate, mixed down to mono 16-bit PCM and handed to the live input's tap bus.

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::Arc;

use super::input::{LiveInput, TapBus};
use crate::error::{PipelineError, Result};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Acquires and releases live input handles.
///
/// At most one acquisition is made per recording attempt. A failed
/// acquisition holds no resources, and repeated denials are not cached.
pub trait CaptureGateway {
    /// Opens the input device and returns an exclusive handle to its stream.
    fn acquire(&mut self) -> Result<LiveInput>;

    /// Stops every track of `input`. Consuming the handle makes a second
    /// release impossible.
    fn release(&mut self, mut input: LiveInput) {
        input.release();
    }
}

/// Gateway backed by the system audio host.
pub struct CpalGateway {
    /// Device name, numeric index, or "default"
    device_name: String,
    /// Requested rate; the device's native rate wins when they differ
    requested_sample_rate: u32,
}

impl CpalGateway {
    pub fn new(device_name: impl Into<String>, requested_sample_rate: u32) -> Self {
        Self {
            device_name: device_name.into(),
            requested_sample_rate,
        }
    }
}

impl CaptureGateway for CpalGateway {
    fn acquire(&mut self) -> Result<LiveInput> {
        let device = with_quiet_alsa(|| {
            let host = cpal::default_host();
            if self.device_name == "default" {
                host.default_input_device()
                    .ok_or_else(|| anyhow!("No audio input device available"))
            } else {
                find_device_by_name(&host, &self.device_name)
            }
        })
        .map_err(|e| PipelineError::PermissionDenied(e.to_string()))?;

        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Recording device: {}", device_name);

        let device_config = device
            .default_input_config()
            .map_err(|e| PipelineError::PermissionDenied(e.to_string()))?;
        let sample_rate = device_config.sample_rate().0;
        let channels = device_config.channels() as usize;
        let sample_format = device_config.sample_format();

        if sample_rate != self.requested_sample_rate {
            tracing::warn!(
                "Requested sample rate {}Hz but device uses {}Hz. Recording at device rate.",
                self.requested_sample_rate,
                sample_rate
            );
        }
        tracing::debug!(
            "Device configuration: {}Hz, {} channels, {:?}",
            sample_rate,
            channels,
            sample_format
        );

        let bus = Arc::new(TapBus::new());
        let config: cpal::StreamConfig = device_config.into();
        let err_bus = Arc::clone(&bus);
        let on_error = move |err: cpal::StreamError| {
            tracing::error!("Audio stream error: {}", err);
            err_bus.end(&err.to_string());
        };

        let stream = match sample_format {
            cpal::SampleFormat::I16 => {
                let data_bus = Arc::clone(&bus);
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        data_bus.dispatch(&mix_to_mono(data, channels));
                    },
                    on_error,
                    None,
                )
            }
            cpal::SampleFormat::F32 => {
                let data_bus = Arc::clone(&bus);
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let pcm: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                        data_bus.dispatch(&mix_to_mono(&pcm, channels));
                    },
                    on_error,
                    None,
                )
            }
            other => {
                return Err(PipelineError::PermissionDenied(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        }
        .map_err(|e| PipelineError::PermissionDenied(e.to_string()))?;

        stream
            .play()
            .map_err(|e| PipelineError::PermissionDenied(e.to_string()))?;
        tracing::debug!("Audio stream started");

        Ok(LiveInput::new(device_name, sample_rate, bus, Box::new(stream)))
    }
}

/// Converts a float sample in [-1, 1] to 16-bit PCM.
fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Mixes interleaved multi-channel audio down to mono by averaging channels.
pub fn mix_to_mono(data: &[i16], channels: usize) -> Vec<i16> {
    match channels {
        0 | 1 => data.to_vec(),
        _ => data
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect(),
    }
}

/// Input devices that can report a name, paired with that name.
///
/// The position in this list is the device ID shown by `list-devices` and
/// accepted by `audio.device`.
pub(crate) fn input_devices(host: &cpal::Host) -> anyhow::Result<Vec<(String, cpal::Device)>> {
    Ok(host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?
        .filter_map(|device| device.name().ok().map(|name| (name, device)))
        .collect())
}

/// Finds an audio input device by name or numeric index.
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> anyhow::Result<cpal::Device> {
    select_device(input_devices(host)?, device_spec)
}

fn select_device<D>(devices: Vec<(String, D)>, device_spec: &str) -> anyhow::Result<D> {
    if let Ok(index) = device_spec.parse::<usize>() {
        let count = devices.len();
        return devices
            .into_iter()
            .nth(index)
            .map(|(_, device)| device)
            .ok_or_else(|| {
                anyhow!(
                    "Device index {} is out of range (0-{})",
                    index,
                    count.saturating_sub(1)
                )
            });
    }

    devices
        .into_iter()
        .find(|(name, _)| name == device_spec)
        .map(|(_, device)| device)
        .ok_or_else(|| {
            anyhow!(
                "Audio input device '{device_spec}' not found. Use 'rhetor list-devices' to see available devices."
            )
        })
}

/// Runs `f` with stderr redirected to /dev/null so ALSA probing noise does not
/// corrupt the terminal. Falls back to running `f` unchanged if redirection fails.
#[cfg(target_os = "linux")]
pub(crate) fn with_quiet_alsa<F, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    let Ok(dev_null) = OpenOptions::new().write(true).open("/dev/null") else {
        return f();
    };

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return f();
    }

    if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } == -1 {
        unsafe { libc::close(old_stderr) };
        return f();
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn with_quiet_alsa<F, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_to_mono_averages_channels() {
        assert_eq!(mix_to_mono(&[100, 300, -50, 50], 2), vec![200, 0]);
        assert_eq!(mix_to_mono(&[3, 6, 9], 3), vec![6]);
        assert_eq!(mix_to_mono(&[7, 8], 1), vec![7, 8]);
    }

    #[test]
    fn test_device_selection_by_id_and_name() {
        let devices = || {
            vec![
                ("pulse".to_string(), 'a'),
                ("USB Mic".to_string(), 'b'),
                ("default".to_string(), 'c'),
            ]
        };
        assert_eq!(select_device(devices(), "1").unwrap(), 'b');
        assert_eq!(select_device(devices(), "USB Mic").unwrap(), 'b');
        assert_eq!(select_device(devices(), "default").unwrap(), 'c');
        assert!(select_device(devices(), "3")
            .unwrap_err()
            .to_string()
            .contains("out of range (0-2)"));
        assert!(select_device(devices(), "Webcam").is_err());
    }

    #[test]
    fn test_f32_conversion_clamps() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(-1.0), -i16::MAX);
    }
}
