//! Docker registry protocol support.
//!
//! Resolves an image reference to a manifest digest, extracts the ordered
//! layer list from a schema v1 or v2 manifest, and downloads layer blobs
//! with bounded retry.

mod client;
mod manifest;
mod reference;
mod tls;

pub use client::RegistryClient;
pub use manifest::{Layer, ManifestV1, ManifestV2};
pub use reference::ImageReference;
pub use tls::is_certificate_error;
