//! Play back an audio file or a finished recording with the system audio player.

use std::path::PathBuf;
use std::time::Duration;

use crate::playback::{PlaybackBackend, PlaybackController, PlaybackEvent, ProcessPlayer};
use crate::recording::AudioArtifact;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Plays an audio file until it ends.
///
/// # Errors
/// - If the file is not a recognizable audio file
/// - If no audio player is available
pub async fn handle_play(file: PathBuf) -> Result<(), anyhow::Error> {
    tracing::info!("=== rhetor Play Command ===");

    let artifact = AudioArtifact::from_file(&file)
        .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;

    let mut playback = PlaybackController::new(ProcessPlayer::new());
    play_to_end(&mut playback, artifact).await
}

/// Loads `artifact`, plays it and waits for the end-of-playback notification.
pub(crate) async fn play_to_end<B: PlaybackBackend>(
    playback: &mut PlaybackController<B>,
    artifact: AudioArtifact,
) -> Result<(), anyhow::Error> {
    let name = artifact.upload_name();
    playback.load(artifact)?;
    playback.play().map_err(|e| {
        tracing::error!("Playback failed: {e}");
        anyhow::anyhow!("{}", e.user_message())
    })?;
    eprintln!("Playing {name} ...");

    loop {
        if let Some(PlaybackEvent::Ended) = playback.poll() {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    tracing::info!("Playback finished for {}", name);
    playback.unload();
    Ok(())
}
