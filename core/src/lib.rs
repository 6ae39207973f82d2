//! Clairscan Core - Shared Types and Abstractions
//!
//! This crate provides the error taxonomy and run configuration shared by
//! the scanner pipeline and the CLI.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{ManifestSchema, ScanConfig};
pub use error::{ChainSubmissionError, Result, ScanError};

/// Clairscan version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
