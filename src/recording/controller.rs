//! Owner of everything a live recording holds open.
//!
//! The controller is the single teardown path: `stop`, a failure while
//! pumping, and dropping the controller all cancel the render loop and hand
//! the live input back to the gateway.

use std::time::{Duration, Instant};

use super::artifact::{AudioArtifact, AudioFormat};
use super::session::{RecordingSession, SessionState};
use crate::analysis::SignalAnalyzer;
use crate::capture::{CaptureGateway, LiveInput};
use crate::config::VisualizationConfig;
use crate::error::{PipelineError, Result};
use crate::render::{build, PixelCanvas, RenderScheduler};

pub struct RecordingController<G: CaptureGateway> {
    gateway: G,
    visualization: VisualizationConfig,
    format: AudioFormat,
    input: Option<LiveInput>,
    session: Option<RecordingSession>,
    scheduler: RenderScheduler<PixelCanvas>,
    last_state: SessionState,
}

impl<G: CaptureGateway> RecordingController<G> {
    /// Builds a controller drawing onto `surface` with a fixed visualization.
    ///
    /// # Errors
    /// - `InvalidTransformSize` or `InvalidVisualization` for unusable settings
    pub fn new(
        gateway: G,
        visualization: VisualizationConfig,
        format: AudioFormat,
        surface: PixelCanvas,
    ) -> Result<Self> {
        visualization.validate()?;
        let strategy = build(visualization.style, visualization.paint());
        Ok(Self {
            gateway,
            visualization,
            format,
            input: None,
            session: None,
            scheduler: RenderScheduler::new(strategy, surface),
            last_state: SessionState::Idle,
        })
    }

    /// Current state of the recording; `Idle` before the first start.
    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(RecordingSession::state)
            .unwrap_or(self.last_state)
    }

    pub fn is_recording(&self) -> bool {
        self.state() == SessionState::Recording
    }

    /// Whether a live input is currently held.
    pub fn holds_input(&self) -> bool {
        self.input.is_some()
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn elapsed(&self) -> Duration {
        self.session
            .as_ref()
            .map(RecordingSession::elapsed)
            .unwrap_or_default()
    }

    /// Input level of the latest drawn frame, 0-100.
    pub fn level(&self) -> u8 {
        self.scheduler.level()
    }

    pub fn scheduler(&self) -> &RenderScheduler<PixelCanvas> {
        &self.scheduler
    }

    pub fn canvas(&self) -> &PixelCanvas {
        self.scheduler.surface()
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.scheduler.surface_mut().resize(width, height);
    }

    /// Acquires the input and starts recording and drawing.
    ///
    /// On failure nothing stays open and the controller remains idle.
    ///
    /// # Errors
    /// - `AlreadyRecording` if a recording is in progress
    /// - `PermissionDenied` if the device could not be opened
    pub fn start(&mut self) -> Result<()> {
        if self.is_recording() || self.input.is_some() {
            return Err(PipelineError::AlreadyRecording);
        }

        let input = self.gateway.acquire()?;
        let mut session = RecordingSession::new(self.format);

        let attached = session.start(&input).and_then(|()| {
            SignalAnalyzer::attach(
                &input,
                self.visualization.fft_size,
                self.visualization.smoothing,
            )
        });
        let analyzer = match attached {
            Ok(analyzer) => analyzer,
            Err(e) => {
                tracing::error!("Failed to start recording: {}", e);
                self.gateway.release(input);
                self.last_state = SessionState::Idle;
                return Err(e);
            }
        };

        self.scheduler.start(Box::new(analyzer), session.liveness());
        self.input = Some(input);
        self.session = Some(session);
        Ok(())
    }

    /// Moves delivered audio into the session.
    ///
    /// # Errors
    /// - `RecordingInterrupted` if the device was lost; everything is torn down
    pub fn pump(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if let Err(e) = session.pump() {
            self.teardown();
            return Err(e);
        }
        Ok(())
    }

    /// Runs one render tick. Returns `true` if a frame was drawn.
    pub fn on_frame(&mut self, now: Instant) -> bool {
        self.scheduler.on_frame(now)
    }

    /// Stops recording and returns the finished artifact.
    ///
    /// Stopping when nothing is recording is a no-op that yields `None`.
    pub fn stop(&mut self) -> Result<Option<AudioArtifact>> {
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };
        self.scheduler.cancel();
        self.release_input();

        let result = session.stop();
        self.last_state = session.state();
        result
    }

    /// Cancels drawing, releases the input and abandons any recording.
    pub fn teardown(&mut self) {
        self.scheduler.cancel();
        self.release_input();
        if let Some(session) = self.session.take() {
            session.liveness().set(false);
            self.last_state = match session.state() {
                SessionState::Recording | SessionState::Finalizing => SessionState::Idle,
                other => other,
            };
        }
    }

    fn release_input(&mut self) {
        if let Some(input) = self.input.take() {
            self.gateway.release(input);
        }
    }
}

impl<G: CaptureGateway> Drop for RecordingController<G> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SyntheticGateway;
    use crate::render::Rgb;

    fn controller(gateway: &SyntheticGateway) -> RecordingController<SyntheticGateway> {
        RecordingController::new(
            gateway.clone(),
            VisualizationConfig::default(),
            AudioFormat::Wav,
            PixelCanvas::new(64, 32, Rgb::BLACK),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_transform_size() {
        let config = VisualizationConfig {
            fft_size: 100,
            ..VisualizationConfig::default()
        };
        let result = RecordingController::new(
            SyntheticGateway::new(16000),
            config,
            AudioFormat::Wav,
            PixelCanvas::new(8, 8, Rgb::BLACK),
        );
        assert!(matches!(result, Err(PipelineError::InvalidTransformSize(100))));
    }

    #[test]
    fn test_second_start_is_rejected() {
        let gateway = SyntheticGateway::new(16000);
        let mut controller = controller(&gateway);
        controller.start().unwrap();
        assert_eq!(controller.start(), Err(PipelineError::AlreadyRecording));
        assert_eq!(gateway.acquisitions(), 1);
    }

    #[test]
    fn test_denied_acquisition_leaves_idle() {
        let gateway = SyntheticGateway::denying();
        let mut controller = controller(&gateway);
        assert!(matches!(
            controller.start(),
            Err(PipelineError::PermissionDenied(_))
        ));
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(!controller.holds_input());
        assert!(!controller.scheduler().is_scheduled());
    }

    #[test]
    fn test_drop_releases_input() {
        let gateway = SyntheticGateway::new(16000);
        {
            let mut controller = controller(&gateway);
            controller.start().unwrap();
            assert_eq!(gateway.stops(), 0);
        }
        assert_eq!(gateway.stops(), 1);
    }

    #[test]
    fn test_interruption_tears_down() {
        let gateway = SyntheticGateway::new(16000);
        let mut controller = controller(&gateway);
        controller.start().unwrap();
        gateway.feeder().end("track ended");

        assert!(matches!(
            controller.pump(),
            Err(PipelineError::RecordingInterrupted(_))
        ));
        assert_eq!(controller.state(), SessionState::Failed);
        assert!(!controller.holds_input());
        assert_eq!(gateway.stops(), 1);
        assert!(!controller.on_frame(Instant::now()));
        assert!(matches!(controller.stop(), Ok(None)));
    }
}
