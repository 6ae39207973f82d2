//! Clairscan - container image vulnerability scan pipeline.
//!
//! Drives one image through the full scan:
//!
//! ```text
//! ┌──────────┐   manifest / blobs   ┌───────────────┐
//! │ Registry │ ───────────────────▶ │ StagingArea   │
//! └──────────┘                      │ StagingServer │◀─┐ GET /<digest>/layer.tar
//!                                   └───────────────┘  │
//!                                                      │
//! ┌──────────────┐  POST /v1/layers (chain)  ┌─────────┴───┐
//! │ ImageScanner │ ────────────────────────▶ │ Scan engine │
//! │ (orchestr.)  │ ◀──────────────────────── │   (Clair)   │
//! └──────────────┘  GET top layer + vulns    └─────────────┘
//! ```
//!
//! Layers are submitted bottom-up, each declaring its predecessor as parent,
//! so the engine accumulates a full filesystem view; only the top layer is
//! queried for the aggregate result.

pub mod clair;
pub mod registry;
pub mod scan;
pub mod staging;

// Re-export commonly used types
pub use clair::{normalize, ClairClient, Feature, SeverityTally, Vulnerability};
pub use registry::{ImageReference, Layer, RegistryClient};
pub use scan::{ImageScanner, ScanPhase, ScanReport};
pub use staging::{StagingArea, StagingServer, LAYER_FILE_NAME};
