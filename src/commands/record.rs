//! Audio recording with live visualization and remote analysis.
//!
//! Records from the configured input device while drawing the configured
//! visualization, then optionally submits the recording for analysis and
//! plays it back. Supports external triggers via SIGUSR1 signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::analyze::{emit_report, ReportOptions};
use super::play::play_to_end;
use crate::analysis::AnalysisClient;
use crate::capture::CpalGateway;
use crate::config;
use crate::error::PipelineError;
use crate::playback::{PlaybackController, ProcessPlayer};
use crate::recording::{
    ffmpeg, AudioArtifact, AudioFormat, FooterStatus, RecorderTui, RecordingCommand,
    RecordingController,
};
use crate::render::{FramePacer, PixelCanvas, Rgb};
use crate::ui::{notify, ErrorScreen};

const BUSY_TICK: Duration = Duration::from_millis(80);

/// Options for the `record` command.
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    /// Play the recording back once it is finished
    pub play: bool,
    /// Where the analysis report goes
    pub report: ReportOptions,
}

/// How the recording loop ended.
enum Outcome {
    Submit,
    Cancel,
}

/// Handles recording, analysis and optional playback.
///
/// # Errors
/// - If the configuration cannot be loaded or is invalid
/// - If the input device cannot be opened
/// - If the recording is interrupted
/// - If the analysis fails
pub async fn handle_record(options: RecordOptions) -> Result<(), anyhow::Error> {
    tracing::info!("=== rhetor Recorder Started ===");

    let config_data = match config::RhetorConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err}");
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error(
                "Configuration Error",
                &format!("{err}\n\nPlease check your ~/.config/rhetor/rhetor.toml file and try again."),
            )?;
            error_screen.cleanup()?;
            return Err(anyhow::anyhow!("Configuration error: {err}"));
        }
    };
    if let Err(e) = config_data.visualization.validate() {
        notify(&e)?;
        return Err(anyhow::anyhow!("Configuration error: {e}"));
    }

    let format = AudioFormat::negotiate(&config_data.audio.formats, &ffmpeg::encodable_formats());
    tracing::info!(
        "Configuration loaded: device={}, sample_rate={}Hz, style={}, format={}",
        config_data.audio.device,
        config_data.audio.sample_rate,
        config_data.visualization.style,
        format
    );

    let mut tui = RecorderTui::new().map_err(|e| anyhow::anyhow!("Failed to initialize UI: {e}"))?;
    let (width, height) = tui.canvas_size()?;
    let gateway = CpalGateway::new(
        config_data.audio.device.clone(),
        config_data.audio.sample_rate,
    );
    let mut controller = RecordingController::new(
        gateway,
        config_data.visualization.clone(),
        format,
        PixelCanvas::new(width, height, Rgb::BLACK),
    )?;

    if let Err(e) = controller.start() {
        tui.cleanup().ok();
        notify(&e)?;
        return Err(anyhow::anyhow!("{}: {}", e.title(), e.user_message()));
    }

    let trigger = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&trigger))
        .map_err(|e| anyhow::anyhow!("Failed to register signal handler: {e}"))?;

    tracing::debug!("Entering recording loop. Press 'Enter' to analyze or 'Escape'/'q' to cancel.");
    let outcome = match record_loop(
        &mut tui,
        &mut controller,
        &trigger,
        config_data.visualization.frame_rate,
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            controller.teardown();
            tui.cleanup().ok();
            return Err(e);
        }
    };

    if let Outcome::Cancel = outcome {
        controller.teardown();
        tui.cleanup()?;
        tracing::info!("Recording cancelled");
        return Ok(());
    }

    let artifact = match controller.stop() {
        Ok(Some(artifact)) => artifact,
        Ok(None) => {
            tui.cleanup().ok();
            return Ok(());
        }
        Err(e) => {
            tracing::error!("Failed to finish recording: {}", e);
            tui.cleanup().ok();
            notify(&e)?;
            return Err(anyhow::anyhow!("{}: {}", e.title(), e.user_message()));
        }
    };
    tracing::info!(
        "Recording finished: {} bytes of {} ({:.1}s)",
        artifact.len(),
        artifact.format(),
        artifact.duration().unwrap_or_default().as_secs_f32()
    );

    let client = AnalysisClient::new(
        config_data.analysis.endpoint.clone(),
        config_data.analysis.timeout(),
    )?;
    let analyzed = loop {
        match submit_with_progress(&mut tui, &client, &artifact).await {
            Err(e) if e.is_retryable() => {
                tracing::warn!("Analysis failed: {}", e);
                let choice = tui.prompt_retry(&e)?;
                if !should_retry(&e, choice) {
                    break Err(e);
                }
                tracing::info!("Resubmitting recording");
            }
            other => break other,
        }
    };
    tui.cleanup()?;

    let failure = match analyzed {
        Ok(result) => {
            emit_report(&result, &options.report)?;
            None
        }
        Err(e) => {
            notify(&e)?;
            Some(e)
        }
    };

    // Playback runs whether or not the analysis succeeded
    if options.play {
        let mut playback = PlaybackController::new(ProcessPlayer::new());
        play_to_end(&mut playback, artifact).await?;
    }

    if let Some(e) = failure {
        return Err(anyhow::anyhow!("{}: {}", e.title(), e.user_message()));
    }
    tracing::info!("=== rhetor Recorder Exited Successfully ===");
    Ok(())
}

/// Whether a failed submission should be sent again after the user chose `command`.
fn should_retry(error: &PipelineError, command: RecordingCommand) -> bool {
    error.is_retryable() && command == RecordingCommand::Submit
}

/// Pumps audio and draws frames until the user submits or cancels.
///
/// # Errors
/// - If the recording is interrupted or the terminal fails
fn record_loop(
    tui: &mut RecorderTui,
    controller: &mut RecordingController<CpalGateway>,
    trigger: &AtomicBool,
    frame_rate: u32,
) -> Result<Outcome, anyhow::Error> {
    let mut pacer = FramePacer::new(frame_rate);
    let mut size = tui.canvas_size()?;

    loop {
        if trigger.load(Ordering::Relaxed) {
            tracing::info!("Received SIGUSR1: analyzing via external trigger");
            return Ok(Outcome::Submit);
        }

        match tui.handle_input(pacer.until_next_frame())? {
            RecordingCommand::Continue => {}
            RecordingCommand::Submit => return Ok(Outcome::Submit),
            RecordingCommand::Cancel => return Ok(Outcome::Cancel),
        }

        if let Err(e) = controller.pump() {
            tracing::error!("Recording interrupted: {}", e);
            tui.cleanup().ok();
            notify(&e)?;
            return Err(anyhow::anyhow!("{}: {}", e.title(), e.user_message()));
        }

        let current = tui.canvas_size()?;
        if current != size {
            size = current;
            controller.resize(size.0, size.1);
        }

        let now = Instant::now();
        if pacer.frame_due(now) {
            controller.on_frame(now);
            tui.render(
                controller.canvas(),
                FooterStatus {
                    elapsed: controller.elapsed(),
                    level: controller.level(),
                    format: controller.format(),
                },
            )?;
        }
    }
}

/// Submits `artifact` while showing a spinner.
async fn submit_with_progress(
    tui: &mut RecorderTui,
    client: &AnalysisClient,
    artifact: &AudioArtifact,
) -> crate::error::Result<crate::analysis::AnalysisResult> {
    let task_client = client.clone();
    let task_artifact = artifact.clone();
    let handle = tokio::spawn(async move { task_client.submit(&task_artifact).await });

    let mut tick = 0usize;
    while !handle.is_finished() {
        if let Err(e) = tui.render_busy("Analyzing recording", tick) {
            tracing::warn!("Failed to render progress: {}", e);
        }
        tick = tick.wrapping_add(1);
        tokio::time::sleep(BUSY_TICK).await;
    }

    match handle.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Analysis task failed: {}", e);
            Err(PipelineError::Unreachable(format!(
                "analysis task failed: {e}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_only_transient_failures_on_request() {
        let unreachable = PipelineError::Unreachable("request timed out".to_string());
        let server_fault = PipelineError::Rejected {
            status: 503,
            detail: "overloaded".to_string(),
        };
        assert!(should_retry(&unreachable, RecordingCommand::Submit));
        assert!(should_retry(&server_fault, RecordingCommand::Submit));
        assert!(!should_retry(&unreachable, RecordingCommand::Cancel));
        assert!(!should_retry(&server_fault, RecordingCommand::Cancel));
    }

    #[test]
    fn test_no_retry_for_answers_that_would_repeat() {
        let too_large = PipelineError::Rejected {
            status: 413,
            detail: "file too large".to_string(),
        };
        let malformed = PipelineError::MalformedResponse("missing score".to_string());
        assert!(!should_retry(&too_large, RecordingCommand::Submit));
        assert!(!should_retry(&malformed, RecordingCommand::Submit));
    }
}
