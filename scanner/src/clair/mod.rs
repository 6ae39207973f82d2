//! Scan engine (Clair) protocol support.
//!
//! Submits layers in bottom-up chain order, fetches the aggregate result of
//! the top layer, and normalizes the engine's per-feature vulnerability
//! tree into a unique-by-ID report.

pub mod api;
mod client;
mod report;

pub use api::{Feature, LayerDescriptor, LayerEnvelope, RawVulnerability};
pub use client::ClairClient;
pub use report::{normalize, sorted_ids, Advisory, CvssInfo, SeverityTally, Vulnerability};
