//! Recording session state machine.
//!
//! The session reads the live input through a channel tap: the device callback
//! posts chunk and end-of-stream events, and the session is the only writer of
//! its chunk sequence. On stop the chunks are concatenated and encoded into an
//! [`AudioArtifact`].

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use super::artifact::{encode_wav, AudioArtifact, AudioFormat};
use super::ffmpeg;
use crate::capture::{InputEvent, LiveInput};
use crate::error::{PipelineError, Result};
use crate::render::Liveness;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Finalizing,
    Stopped,
    Failed,
}

/// One recording attempt, from `start` to a finished artifact or a failure.
pub struct RecordingSession {
    state: SessionState,
    format: AudioFormat,
    sample_rate: u32,
    chunks: Vec<Vec<i16>>,
    events: Option<Receiver<InputEvent>>,
    liveness: Liveness,
    started_at: Option<Instant>,
    ffmpeg: Option<PathBuf>,
}

impl RecordingSession {
    /// Creates an idle session that will encode into `format`.
    pub fn new(format: AudioFormat) -> Self {
        Self {
            state: SessionState::Idle,
            format,
            sample_rate: 0,
            chunks: Vec::new(),
            events: None,
            liveness: Liveness::new(),
            started_at: None,
            ffmpeg: None,
        }
    }

    /// Encodes with the ffmpeg binary at `path` instead of the one found on the system.
    pub fn with_ffmpeg(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg = Some(path.into());
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Flag that holds exactly while the session is recording.
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn sample_count(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Time since recording started, zero before.
    pub fn elapsed(&self) -> Duration {
        self.started_at
            .map(|started| started.elapsed())
            .unwrap_or_default()
    }

    /// Begins recording from `input`.
    ///
    /// # Errors
    /// - `AlreadyRecording` unless the session is idle
    /// - `InputReleased` if the input has already been closed
    pub fn start(&mut self, input: &LiveInput) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(PipelineError::AlreadyRecording);
        }
        let (_, events) = input.attach_channel()?;

        self.events = Some(events);
        self.sample_rate = input.sample_rate();
        self.chunks.clear();
        self.started_at = Some(Instant::now());
        self.state = SessionState::Recording;
        self.liveness.set(true);

        tracing::info!(
            "Recording started on {} at {}Hz (format: {})",
            input.device_name(),
            self.sample_rate,
            self.format
        );
        Ok(())
    }

    /// Appends a chunk. Returns `false` when the session is not recording.
    pub fn on_chunk(&mut self, data: Vec<i16>) -> bool {
        if self.state != SessionState::Recording {
            tracing::debug!("Ignoring trailing chunk in state {:?}", self.state);
            return false;
        }
        if !data.is_empty() {
            self.chunks.push(data);
        }
        true
    }

    /// Drains pending events from the input in stream order.
    ///
    /// Returns the number of chunks appended.
    ///
    /// # Errors
    /// - `RecordingInterrupted` if the stream ended while recording
    pub fn pump(&mut self) -> Result<usize> {
        let mut appended = 0;
        loop {
            let event = match self.events.as_ref() {
                Some(events) => events.try_recv(),
                None => return Ok(appended),
            };
            match event {
                Ok(InputEvent::Chunk(data)) => {
                    if self.on_chunk(data) {
                        appended += 1;
                    }
                }
                Ok(InputEvent::Ended(reason)) => return Err(self.fail(&reason)),
                Err(TryRecvError::Empty) => return Ok(appended),
                Err(TryRecvError::Disconnected) => {
                    self.events = None;
                    return Ok(appended);
                }
            }
        }
    }

    /// Marks the session failed and discards the partial recording.
    pub fn fail(&mut self, reason: &str) -> PipelineError {
        tracing::warn!(
            "Recording interrupted after {:.2}s: {}",
            self.elapsed().as_secs_f32(),
            reason
        );
        self.liveness.set(false);
        self.events = None;
        self.chunks.clear();
        self.state = SessionState::Failed;
        PipelineError::RecordingInterrupted(reason.to_string())
    }

    /// Finalizes the recording into an artifact.
    ///
    /// Events already delivered by the input are collected first; anything
    /// arriving afterwards is ignored. Stopping a session that is not
    /// recording is a no-op that yields `None`.
    ///
    /// An empty recording goes through the same encoder as any other. When
    /// the session format cannot be produced the take is kept as WAV and the
    /// artifact reports that format.
    ///
    /// # Errors
    /// - `RecordingInterrupted` if the stream had ended before the stop
    /// - `Encoding` if not even the WAV container could be written
    pub fn stop(&mut self) -> Result<Option<AudioArtifact>> {
        if self.state != SessionState::Recording {
            tracing::debug!("Stop ignored in state {:?}", self.state);
            return Ok(None);
        }
        self.pump()?;

        self.state = SessionState::Finalizing;
        self.liveness.set(false);
        self.events = None;

        let samples: Vec<i16> = std::mem::take(&mut self.chunks).concat();
        let duration = if self.sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(samples.len() as u64 * 1_000_000 / self.sample_rate as u64)
        };

        match self.encode(&samples) {
            Ok((payload, format)) => {
                self.state = SessionState::Stopped;
                tracing::info!(
                    "Recording stopped: {:.2}s ({} samples at {}Hz, {} bytes {})",
                    duration.as_secs_f32(),
                    samples.len(),
                    self.sample_rate,
                    payload.len(),
                    format
                );
                Ok(Some(AudioArtifact::new(payload, format, Some(duration))))
            }
            Err(e) => {
                tracing::error!("Failed to finalize recording: {}", e);
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    /// Encodes the samples, falling back to the WAV already built.
    fn encode(&self, samples: &[i16]) -> Result<(Vec<u8>, AudioFormat)> {
        let wav = encode_wav(samples, self.sample_rate.max(1))?;
        if self.format == AudioFormat::Wav {
            return Ok((wav, AudioFormat::Wav));
        }
        let transcoded = match &self.ffmpeg {
            Some(path) => ffmpeg::transcode_with(path, &wav, self.format),
            None => ffmpeg::transcode(&wav, self.format),
        };
        match transcoded {
            Ok(payload) => Ok((payload, self.format)),
            Err(e) => {
                tracing::warn!("Keeping recording as wav, {} encoding failed: {}", self.format, e);
                Ok((wav, AudioFormat::Wav))
            }
        }
    }
}
