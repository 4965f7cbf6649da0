//! Playback of finished recordings.
//!
//! [`PlaybackController`] owns at most one artifact and reports the end of
//! playback exactly once per play-through. The audio itself is produced by a
//! [`PlaybackBackend`]; [`ProcessPlayer`] hands the artifact to a system
//! audio player.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use crate::error::{PipelineError, Result};
use crate::recording::AudioArtifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No artifact loaded
    Empty,
    Ready,
    Playing,
    Paused,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Ended,
}

/// Produces sound for a loaded artifact.
pub trait PlaybackBackend {
    /// Prepares `artifact`, replacing whatever was loaded before.
    fn load(&mut self, artifact: &AudioArtifact) -> Result<()>;
    /// Starts playback, resuming if paused and restarting if finished.
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    /// Stops playback and releases the loaded artifact's resources.
    fn stop(&mut self);
    /// Whether the current play-through has reached its end.
    fn is_finished(&mut self) -> bool;
}

pub struct PlaybackController<B: PlaybackBackend> {
    backend: B,
    artifact: Option<AudioArtifact>,
    state: PlaybackState,
}

impl<B: PlaybackBackend> PlaybackController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            artifact: None,
            state: PlaybackState::Empty,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn artifact(&self) -> Option<&AudioArtifact> {
        self.artifact.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Loads `artifact`, stopping and releasing the previous one first.
    pub fn load(&mut self, artifact: AudioArtifact) -> Result<()> {
        self.unload();
        self.backend.load(&artifact)?;
        tracing::debug!(
            "Loaded artifact {} for playback ({} bytes, {})",
            artifact.id(),
            artifact.len(),
            artifact.format()
        );
        self.artifact = Some(artifact);
        self.state = PlaybackState::Ready;
        Ok(())
    }

    /// Stops playback and drops the loaded artifact.
    pub fn unload(&mut self) {
        if self.artifact.take().is_some() {
            self.backend.stop();
            tracing::debug!("Playback artifact released");
        }
        self.state = PlaybackState::Empty;
    }

    /// # Errors
    /// - `NoArtifact` if nothing is loaded
    /// - `Playback` if the backend cannot start
    pub fn play(&mut self) -> Result<()> {
        if self.artifact.is_none() {
            tracing::debug!("Play requested with no artifact loaded");
            return Err(PipelineError::NoArtifact);
        }
        if self.state == PlaybackState::Playing {
            return Ok(());
        }
        self.backend.play()?;
        self.state = PlaybackState::Playing;
        tracing::info!("Playback started");
        Ok(())
    }

    /// Pauses playback. No-op unless playing.
    pub fn pause(&mut self) -> Result<()> {
        if self.state != PlaybackState::Playing {
            return Ok(());
        }
        self.backend.pause()?;
        self.state = PlaybackState::Paused;
        tracing::debug!("Playback paused");
        Ok(())
    }

    /// Checks for the end of playback. Yields `Ended` once per play-through.
    pub fn poll(&mut self) -> Option<PlaybackEvent> {
        if self.state == PlaybackState::Playing && self.backend.is_finished() {
            self.state = PlaybackState::Ended;
            tracing::info!("Playback ended");
            return Some(PlaybackEvent::Ended);
        }
        None
    }
}

impl<B: PlaybackBackend> Drop for PlaybackController<B> {
    fn drop(&mut self) {
        self.unload();
    }
}

#[cfg(target_os = "macos")]
const PLAYERS: &[(&str, &[&str])] = &[("afplay", &[])];

#[cfg(not(target_os = "macos"))]
const PLAYERS: &[(&str, &[&str])] = &[
    ("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"]),
    ("mpv", &["--no-video", "--really-quiet"]),
    ("paplay", &[]),
    ("aplay", &["-q"]),
];

/// Plays artifacts through a system audio player process.
///
/// Tries afplay on macOS, and ffplay, mpv, paplay then aplay elsewhere.
#[derive(Default)]
pub struct ProcessPlayer {
    file: Option<PathBuf>,
    child: Option<Child>,
    paused: bool,
}

impl ProcessPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn(&mut self) -> Result<()> {
        let file = self.file.as_ref().ok_or(PipelineError::NoArtifact)?;
        for (player, args) in PLAYERS {
            let spawned = Command::new(player)
                .args(*args)
                .arg(file)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn();
            if let Ok(child) = spawned {
                tracing::debug!("Playing {} with {}", file.display(), player);
                self.child = Some(child);
                self.paused = false;
                return Ok(());
            }
        }
        Err(PipelineError::Playback(
            "No audio player found. Install ffplay, mpv or paplay".to_string(),
        ))
    }

    fn kill_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.paused = false;
    }
}

impl PlaybackBackend for ProcessPlayer {
    fn load(&mut self, artifact: &AudioArtifact) -> Result<()> {
        self.stop();
        let path = std::env::temp_dir().join(format!(
            "rhetor_play_{}.{}",
            artifact.id(),
            artifact.format().extension()
        ));
        std::fs::write(&path, artifact.payload())
            .map_err(|e| PipelineError::Playback(format!("failed to stage audio: {e}")))?;
        self.file = Some(path);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.paused {
            #[cfg(target_os = "linux")]
            if let Some(child) = &self.child {
                // SIGCONT resumes the player stopped by pause
                unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGCONT) };
                self.paused = false;
                return Ok(());
            }
        }
        self.kill_child();
        self.spawn()
    }

    fn pause(&mut self) -> Result<()> {
        #[cfg(target_os = "linux")]
        if let Some(child) = &self.child {
            if unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGSTOP) } == 0 {
                self.paused = true;
                return Ok(());
            }
        }
        // Without job control a paused player restarts from the beginning
        self.kill_child();
        self.paused = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.kill_child();
        if let Some(path) = self.file.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::debug!("Failed to remove playback file: {}", e);
            }
        }
    }

    fn is_finished(&mut self) -> bool {
        if self.paused {
            return false;
        }
        match self.child.as_mut() {
            Some(child) => !matches!(child.try_wait(), Ok(None)),
            None => true,
        }
    }
}

impl Drop for ProcessPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{encode_wav, AudioFormat};
    use std::time::Duration;

    /// Backend that finishes after a fixed number of polls.
    #[derive(Default)]
    struct ScriptedBackend {
        polls_until_end: usize,
        remaining: usize,
        loads: usize,
        stops: usize,
    }

    impl PlaybackBackend for ScriptedBackend {
        fn load(&mut self, _artifact: &AudioArtifact) -> Result<()> {
            self.loads += 1;
            Ok(())
        }

        fn play(&mut self) -> Result<()> {
            if self.remaining == 0 {
                self.remaining = self.polls_until_end;
            }
            Ok(())
        }

        fn pause(&mut self) -> Result<()> {
            Ok(())
        }

        fn stop(&mut self) {
            self.stops += 1;
            self.remaining = 0;
        }

        fn is_finished(&mut self) -> bool {
            self.remaining = self.remaining.saturating_sub(1);
            self.remaining == 0
        }
    }

    fn artifact() -> AudioArtifact {
        AudioArtifact::new(
            encode_wav(&[0; 1600], 16000).unwrap(),
            AudioFormat::Wav,
            Some(Duration::from_millis(100)),
        )
    }

    fn controller(polls: usize) -> PlaybackController<ScriptedBackend> {
        PlaybackController::new(ScriptedBackend {
            polls_until_end: polls,
            ..ScriptedBackend::default()
        })
    }

    #[test]
    fn test_play_without_artifact() {
        let mut playback = controller(1);
        assert_eq!(playback.play(), Err(PipelineError::NoArtifact));
        assert_eq!(playback.state(), PlaybackState::Empty);
    }

    #[test]
    fn test_end_is_reported_once() {
        let mut playback = controller(3);
        playback.load(artifact()).unwrap();
        playback.play().unwrap();

        let events: Vec<_> = (0..10).filter_map(|_| playback.poll()).collect();
        assert_eq!(events, vec![PlaybackEvent::Ended]);
        assert_eq!(playback.state(), PlaybackState::Ended);
    }

    #[test]
    fn test_paused_playback_does_not_end() {
        let mut playback = controller(1);
        playback.load(artifact()).unwrap();
        playback.play().unwrap();
        playback.pause().unwrap();
        assert_eq!(playback.state(), PlaybackState::Paused);
        assert_eq!(playback.poll(), None);

        playback.play().unwrap();
        assert_eq!(playback.poll(), Some(PlaybackEvent::Ended));
    }

    #[test]
    fn test_replacing_artifact_stops_previous() {
        let mut playback = controller(5);
        playback.load(artifact()).unwrap();
        playback.play().unwrap();

        playback.load(artifact()).unwrap();
        assert_eq!(playback.backend().stops, 1);
        assert_eq!(playback.backend().loads, 2);
        assert_eq!(playback.state(), PlaybackState::Ready);
    }

    #[test]
    fn test_replay_after_end() {
        let mut playback = controller(1);
        playback.load(artifact()).unwrap();
        playback.play().unwrap();
        assert_eq!(playback.poll(), Some(PlaybackEvent::Ended));

        playback.play().unwrap();
        assert_eq!(playback.poll(), Some(PlaybackEvent::Ended));
        assert_eq!(playback.poll(), None);
    }
}
