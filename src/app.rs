//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands::{self, RecordOptions, ReportOptions};
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

/// A terminal speech coach with real-time spectrum visualization
#[derive(Parser)]
#[command(name = "rhetor")]
#[command(version)]
#[command(about = "Record speech, watch it live, and get feedback on how you speak")]
#[command(long_about = "Record speech with a real-time spectrum or waveform visualization and\nsubmit it to a speech analysis service for a score and coaching tips.\n\nDEFAULT COMMAND:\n    If no command is specified, 'record' is used by default.\n    Record options (-p, -j, -o) can be used without explicitly saying 'record'.\n\nEXAMPLES:\n    # Record, analyze and print the report\n    $ rhetor\n\n    # Record, analyze, then play the recording back\n    $ rhetor -p\n\n    # Write the analysis as JSON to a file\n    $ rhetor record --json -o report.json\n\n    # Analyze an existing recording\n    $ rhetor analyze talk.mp3\n\n    # Edit configuration file\n    $ rhetor config")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/rhetor/rhetor.toml\n    Logs:               ~/.local/state/rhetor/rhetor.log.*"
)]
struct Cli {
    /// Play the recording back after analysis (record default command)
    #[arg(short, long, global = true)]
    play: bool,

    /// Print the analysis as JSON (record default command)
    #[arg(short, long, global = true)]
    json: bool,

    /// Write the analysis to a file instead of stdout (record default command)
    #[arg(short, long, value_name = "FILE", global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record audio with real-time visualization (default)
    ///
    /// Press Enter to stop and analyze, Escape/q to cancel.
    /// Sending SIGUSR1 to the process also stops and analyzes.
    #[command(visible_alias = "r")]
    Record,

    /// Analyze a pre-recorded audio file
    ///
    /// Examples:
    ///   rhetor analyze talk.mp3
    ///   rhetor analyze pitch.wav --json -o report.json
    #[command(visible_alias = "a")]
    Analyze {
        /// Path to the audio file to analyze
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Play an audio file with the system audio player
    Play {
        /// Path to the audio file to play
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in rhetor.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   rhetor completions bash > rhetor.bash
    ///   rhetor completions zsh > _rhetor
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: General error
/// - 2: Usage error (invalid arguments)
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails (e.g., recording, analysis, playback)
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Handle commands that don't need logging
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "rhetor", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => {
            return match commands::handle_list_devices() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        Some(Commands::Logs) => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    logging::init_logging()?;

    let report = ReportOptions {
        json: cli.json,
        output: cli.output,
    };

    match cli.command {
        None | Some(Commands::Record) => {
            commands::handle_record(RecordOptions {
                play: cli.play,
                report,
            })
            .await?;
        }
        Some(Commands::Analyze { file }) => {
            commands::handle_analyze(file, report).await?;
        }
        Some(Commands::Play { file }) => {
            commands::handle_play(file).await?;
        }
        Some(Commands::Config) => {
            commands::handle_config()?;
        }
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_record_is_default_and_takes_global_options() {
        let cli = Cli::try_parse_from(["rhetor", "-p", "--json"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.play && cli.json);

        let cli = Cli::try_parse_from(["rhetor", "analyze", "talk.wav", "-o", "out.txt"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Analyze { .. })));
        assert_eq!(cli.output, Some(PathBuf::from("out.txt")));
    }
}
