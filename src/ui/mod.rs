//! Shared terminal screens and result formatting.

pub mod error;
pub mod report;

pub use error::{notify, ErrorScreen};
pub use report::format_report;
