//! Audio recording feature for rhetor.
//!
//! Provides the recording session, its owning controller, encoding of the
//! finished audio and the terminal view shown while recording.

pub mod artifact;
pub mod controller;
pub mod ffmpeg;
pub mod session;
pub mod ui;

pub use artifact::{encode_wav, AudioArtifact, AudioFormat};
pub use controller::RecordingController;
pub use ffmpeg::find_ffmpeg;
pub use session::{RecordingSession, SessionState};
pub use ui::{FooterStatus, RecorderTui, RecordingCommand};
