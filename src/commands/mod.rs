//! Application command handlers for rhetor.
//!
//! Each submodule handles one command.
//!
//! # Commands
//! - `record`: Recording with live visualization, analysis and optional playback
//! - `analyze`: Analysis of a pre-recorded audio file
//! - `play`: Playback of an audio file
//! - `config`: Open configuration file in user's preferred editor
//! - `list_devices`: List available audio input devices
//! - `logs`: Display recent log entries

pub mod analyze;
pub mod config;
pub mod list_devices;
pub mod logs;
pub mod play;
pub mod record;

pub use analyze::{handle_analyze, ReportOptions};
pub use config::handle_config;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use play::handle_play;
pub use record::{handle_record, RecordOptions};
