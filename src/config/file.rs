//! Configuration file management for rhetor.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Configuration is stored in the user's config directory and created with
//! defaults on first run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::analyzer::{validate_fft_size, DEFAULT_FFT_SIZE};
use crate::error::PipelineError;
use crate::recording::AudioFormat;
use crate::render::{Paint, Rgb};

/// Drawing style for the live recording display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationStyle {
    /// One bar per frequency band, growing from the bottom
    Bars,
    /// Bars mirrored left/right and up/down from the center
    #[default]
    Mirrored,
    /// Waveform line through the time-domain samples
    Oscilloscope,
    /// Dimmed bars with the waveform on top
    Hybrid,
}

impl std::fmt::Display for VisualizationStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bars => write!(f, "bars"),
            Self::Mirrored => write!(f, "mirrored"),
            Self::Oscilloscope => write!(f, "oscilloscope"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// How the previous frame is removed before drawing the next.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Persistence {
    /// Hard clear to the background
    Clear,
    /// Fade toward the background, leaving a decaying trail
    #[default]
    Trail,
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `rhetor list-devices`
    /// - device name from `rhetor list-devices`
    pub device: String,
    /// Requested sample rate in Hz (the device's native rate is used if it differs)
    pub sample_rate: u32,
    /// Recording encodings in order of preference; the first supported one is used
    #[serde(default = "default_formats")]
    pub formats: Vec<AudioFormat>,
}

fn default_formats() -> Vec<AudioFormat> {
    vec![
        AudioFormat::Webm,
        AudioFormat::Ogg,
        AudioFormat::Mp3,
        AudioFormat::Wav,
    ]
}

/// Live visualization configuration. Fixed for the lifetime of a recording.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisualizationConfig {
    /// Transform size, a power of two between 32 and 32768
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default)]
    pub style: VisualizationStyle,
    /// Bar and line color as "#RRGGBB"
    #[serde(default = "default_color")]
    pub color: String,
    /// Opacity of the bars and line, 0.0-1.0
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub persistence: Persistence,
    /// Fraction faded per frame with the "trail" persistence, 0.0-1.0
    #[serde(default = "default_trail_decay")]
    pub trail_decay: f32,
    /// Spectrum smoothing between frames, 0.0 (none) to 0.99
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    /// Target display refresh rate in frames per second
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
}

fn default_fft_size() -> usize {
    DEFAULT_FFT_SIZE
}

fn default_color() -> String {
    "#EA384C".to_string()
}

fn default_opacity() -> f32 {
    0.8
}

fn default_trail_decay() -> f32 {
    0.2
}

fn default_smoothing() -> f32 {
    0.8
}

fn default_frame_rate() -> u32 {
    60
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            style: VisualizationStyle::default(),
            color: default_color(),
            opacity: default_opacity(),
            persistence: Persistence::default(),
            trail_decay: default_trail_decay(),
            smoothing: default_smoothing(),
            frame_rate: default_frame_rate(),
        }
    }
}

impl VisualizationConfig {
    /// Rejects settings that would make a recording session fail mid-way.
    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_fft_size(self.fft_size)?;
        if Rgb::from_hex(&self.color).is_none() {
            return Err(PipelineError::InvalidVisualization(format!(
                "color '{}' is not #RRGGBB",
                self.color
            )));
        }
        for (name, value) in [
            ("opacity", self.opacity),
            ("trail_decay", self.trail_decay),
            ("smoothing", self.smoothing),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::InvalidVisualization(format!(
                    "{name} must be between 0.0 and 1.0, got {value}"
                )));
            }
        }
        if self.frame_rate == 0 {
            return Err(PipelineError::InvalidVisualization(
                "frame_rate must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Drawing parameters for the visualization strategies.
    pub fn paint(&self) -> Paint {
        let defaults = Paint::default();
        Paint {
            color: Rgb::from_hex(&self.color).unwrap_or(defaults.color),
            opacity: self.opacity,
            persistence: self.persistence,
            trail_decay: self.trail_decay,
        }
    }
}

/// Remote analysis service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Upload endpoint accepting a multipart form with a `file` field
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://frequent-nat-agme-5eaaebcf.koyeb.app/audio".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RhetorConfig {
    pub audio: AudioConfig,
    #[serde(default)]
    pub visualization: VisualizationConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl Default for RhetorConfig {
    fn default() -> Self {
        RhetorConfig {
            audio: AudioConfig {
                device: "default".to_string(),
                sample_rate: 16000,
                formats: default_formats(),
            },
            visualization: VisualizationConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl RhetorConfig {
    /// Loads configuration from the user's config directory, writing the
    /// defaults there first if no file exists yet.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the config file cannot be read
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Created default configuration at {}", config_path.display());
            return Ok(config);
        }
        Self::load_from(&config_path)
    }

    /// Loads configuration from an explicit path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let config_content = fs::read_to_string(path)?;
        Self::from_toml(&config_content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: RhetorConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Saves configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let config_content = toml::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }
}

/// Retrieves the path to the config file.
///
/// # Errors
/// - If the home directory cannot be determined
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    Ok(home.join(".config").join("rhetor").join("rhetor.toml"))
}
