//! Analyze a pre-recorded audio file without recording.
//!
//! Reads the file, rejects anything that is not audio before any network
//! call, and submits it through the same client as the `record` command.

use std::path::PathBuf;

use crate::analysis::{AnalysisClient, AnalysisResult};
use crate::config;
use crate::recording::AudioArtifact;
use crate::ui::format_report;

/// Where and how an analysis result is written.
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Print the result as JSON instead of formatted text
    pub json: bool,
    /// Write to this file instead of stdout
    pub output: Option<PathBuf>,
}

/// Handles analysis of a pre-recorded audio file.
///
/// # Errors
/// - If the file is not a recognizable audio file
/// - If the configuration cannot be loaded
/// - If the submission fails
pub async fn handle_analyze(file: PathBuf, options: ReportOptions) -> Result<(), anyhow::Error> {
    tracing::info!("=== rhetor Analyze Command ===");

    let artifact = AudioArtifact::from_file(&file).map_err(|e| {
        tracing::error!("Rejected {}: {e}", file.display());
        anyhow::anyhow!("{}", e.user_message())
    })?;

    let config_data = config::RhetorConfig::load().map_err(|err| {
        tracing::error!("Failed to load configuration: {err}");
        anyhow::anyhow!("Configuration error: {err}")
    })?;

    let client = AnalysisClient::new(
        config_data.analysis.endpoint.clone(),
        config_data.analysis.timeout(),
    )?;

    eprintln!("Analyzing {} ...", file.display());
    let result = client.submit(&artifact).await.map_err(|e| {
        tracing::error!("Analysis failed: {e}");
        anyhow::anyhow!("{}: {}", e.title(), e.user_message())
    })?;

    emit_report(&result, &options)
}

/// Writes `result` to stdout or to the configured output file.
pub(crate) fn emit_report(
    result: &AnalysisResult,
    options: &ReportOptions,
) -> Result<(), anyhow::Error> {
    let rendered = if options.json {
        serde_json::to_string_pretty(result)? + "\n"
    } else {
        format_report(result)
    };

    match &options.output {
        Some(path) => {
            std::fs::write(path, &rendered).map_err(|e| {
                anyhow::anyhow!("Failed to write to file '{}': {e}", path.display())
            })?;
            tracing::debug!("Analysis written to file: {}", path.display());
        }
        None => {
            print!("{rendered}");
            tracing::debug!("Analysis printed to stdout");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_json_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let result = AnalysisResult {
            score: 90,
            narrative: "Confident.".to_string(),
            tips: vec!["Keep it up".to_string()],
            sections: Vec::new(),
            filename: None,
        };
        emit_report(
            &result,
            &ReportOptions {
                json: true,
                output: Some(path.clone()),
            },
        )
        .unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["score"], 90);
        assert_eq!(written["tips"][0], "Keep it up");
    }

    #[tokio::test]
    async fn test_non_audio_file_is_rejected_locally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slides.pdf");
        std::fs::write(&path, b"%PDF-1.7 not audio").unwrap();

        let err = handle_analyze(path, ReportOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Please choose an audio file"));
    }
}
