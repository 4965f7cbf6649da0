//! Speech coaching recorder.
//!
//! Captures microphone audio, draws a live spectrum or waveform while
//! recording, and submits the finished recording to a remote speech
//! analysis service.

pub mod analysis;
pub mod app;
pub mod capture;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod playback;
pub mod recording;
pub mod render;
pub mod ui;
