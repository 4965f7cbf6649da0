//! Configuration file editor command.
//!
//! Opens the rhetor configuration file in the user's preferred editor.

use std::process::Command;

use crate::config::{get_config_path, RhetorConfig};

/// Opens the rhetor configuration file in the user's preferred editor.
///
/// Writes the default configuration first if none exists. Tries editors in
/// this order: $EDITOR, nano, vi. The edited file is parsed afterwards so
/// mistakes are reported immediately.
///
/// # Errors
/// - If no editor can be found or executed
/// - If the edited file is not a valid configuration
pub fn handle_config() -> anyhow::Result<()> {
    let config_path = get_config_path()?;
    if !config_path.exists() {
        RhetorConfig::default().save_to(&config_path)?;
    }

    tracing::info!("Opening config file: {}", config_path.display());

    let editor = find_editor()?;
    tracing::debug!("Using editor: {}", editor);

    let status = Command::new(&editor)
        .arg(&config_path)
        .status()
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to open editor '{editor}': {e}. Make sure the editor is installed and accessible."
            )
        })?;

    if !status.success() {
        return Err(anyhow::anyhow!(
            "Editor exited with error code: {}",
            status.code().unwrap_or(-1)
        ));
    }

    let edited = RhetorConfig::load_from(&config_path)
        .map_err(|e| anyhow::anyhow!("The configuration file is not valid: {e}"))?;
    edited
        .visualization
        .validate()
        .map_err(|e| anyhow::anyhow!("The configuration file is not valid: {e}"))?;

    tracing::info!("Config file edited successfully");
    Ok(())
}

/// Finds the best available editor to use.
fn find_editor() -> anyhow::Result<String> {
    if let Ok(editor) = std::env::var("EDITOR") {
        if !editor.is_empty() {
            return Ok(editor);
        }
    }

    for editor in ["nano", "vi"] {
        if crate::recording::ffmpeg::find_in_path(editor).is_ok() {
            return Ok(editor.to_string());
        }
    }

    Err(anyhow::anyhow!(
        "No editor found. Please set the $EDITOR environment variable."
    ))
}
