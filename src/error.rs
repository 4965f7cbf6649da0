//! Failure taxonomy for the capture, analysis and playback pipeline.
//!
//! Every variant is recoverable: callers convert it into a notification with
//! [`PipelineError::user_message`] and return to an idle state.

use thiserror::Error;

/// Result alias used across the pipeline modules.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by the recording pipeline and the analysis boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The input device could not be opened.
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("a recording is already in progress")]
    AlreadyRecording,

    /// The device was lost mid-session; partial audio has been discarded.
    #[error("recording interrupted: {0}")]
    RecordingInterrupted(String),

    /// A local file was rejected before any network call.
    #[error("not a supported audio file: {0}")]
    InvalidInputFormat(String),

    #[error("transform size {0} must be a power of two between 32 and 32768")]
    InvalidTransformSize(usize),

    #[error("invalid visualization setting: {0}")]
    InvalidVisualization(String),

    /// A tap was attached to a live input after it had been released.
    #[error("live input has already been released")]
    InputReleased,

    #[error("no recording is loaded for playback")]
    NoArtifact,

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("audio encoding failed: {0}")]
    Encoding(String),

    #[error("analysis service unreachable: {0}")]
    Unreachable(String),

    /// Non-2xx answer from the analysis service, with its body as detail.
    #[error("analysis service rejected the upload (status {status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("malformed analysis response: {0}")]
    MalformedResponse(String),

    #[error("an analysis submission is already in progress")]
    SubmissionInFlight,
}

impl PipelineError {
    /// Short title for the notification shown to the user.
    pub fn title(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "Microphone unavailable",
            Self::AlreadyRecording => "Already recording",
            Self::RecordingInterrupted(_) => "Recording interrupted",
            Self::InvalidInputFormat(_) => "Invalid file type",
            Self::InvalidTransformSize(_) | Self::InvalidVisualization(_) => "Configuration error",
            Self::InputReleased => "Recording ended",
            Self::NoArtifact | Self::Playback(_) => "Playback failed",
            Self::Encoding(_) => "Encoding failed",
            Self::Unreachable(_)
            | Self::Rejected { .. }
            | Self::MalformedResponse(_)
            | Self::SubmissionInFlight => "Analysis failed",
        }
    }

    /// Whether resubmitting the same upload may succeed.
    ///
    /// Holds for connection failures and server faults, not for answers the
    /// service would give again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unreachable(_) => true,
            Self::Rejected { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }

    /// Human-readable description for the notification body.
    ///
    /// Rejections are mapped by HTTP status class so that oversized payloads,
    /// unsupported types and server faults read differently.
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied(detail) => format!(
                "Could not access the microphone ({detail}). Check the input device and try again."
            ),
            Self::RecordingInterrupted(detail) => format!(
                "The input device was lost ({detail}). The partial recording was discarded."
            ),
            Self::InvalidInputFormat(_) => {
                "Please choose an audio file (webm, ogg, mp3, wav, flac or m4a).".to_string()
            }
            Self::Rejected { status: 413, .. } => "File size too large".to_string(),
            Self::Rejected { status: 415, .. } => "Unsupported file type".to_string(),
            Self::Rejected { status, detail } if (500..600).contains(status) => {
                format!("Server error: {detail}")
            }
            Self::Rejected { .. } => "There was an error analyzing your audio file".to_string(),
            Self::Unreachable(detail) => {
                format!("The analysis service could not be reached: {detail}")
            }
            Self::MalformedResponse(_) => "Invalid response format from server".to_string(),
            other => other.to_string(),
        }
    }
}
