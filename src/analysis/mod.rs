//! Signal analysis of the live input and submission of finished recordings.
//!
//! The analyzer runs locally on every render tick; the client is the boundary
//! to the remote speech analysis service.

pub mod analyzer;
pub mod client;

pub use analyzer::{validate_fft_size, AnalysisFrame, FrameSource, SignalAnalyzer};
pub use client::{parse_analysis, AnalysisClient, AnalysisResult, AnalysisSection};
