//! Docker manifest models (schema v1 and v2) and layer-list extraction.
//!
//! Both schemas yield the same result shape: an ordered, deduplicated list
//! of layers, base layer first. Schema v1 lists `fsLayers` newest-first, so
//! its order is inverted here; schema v2 is already bottom-up.

use std::collections::HashSet;

use clairscan_core::error::{Result, ScanError};
use serde::Deserialize;

/// Accept header value for a schema v1 manifest.
pub const MANIFEST_V1_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v1+json";

/// Accept header value for a schema v2 manifest.
pub const MANIFEST_V2_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// One image layer, ordered bottom-up.
///
/// `index` 0 is the base layer; the ordering is load-bearing because chain
/// submission declares layer N as the parent of layer N+1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    /// Content digest (e.g. "sha256:abc...")
    pub digest: String,
    /// Bottom-up ordinal position (0 = base)
    pub index: usize,
}

/// Schema v1 manifest (the parts this pipeline consumes).
#[derive(Debug, Deserialize)]
pub struct ManifestV1 {
    #[serde(rename = "fsLayers", default)]
    pub fs_layers: Vec<FsLayer>,
}

/// Schema v1 layer entry.
#[derive(Debug, Deserialize)]
pub struct FsLayer {
    #[serde(rename = "blobSum")]
    pub blob_sum: String,
}

impl ManifestV1 {
    /// Extract the bottom-up layer list.
    ///
    /// `fsLayers` is ordered newest-first, so the collected order is
    /// inverted. A repeated digest is a malformed manifest and fails the
    /// whole extraction.
    pub fn layers(&self) -> Result<Vec<Layer>> {
        let digests: Vec<&str> = self
            .fs_layers
            .iter()
            .rev()
            .map(|layer| layer.blob_sum.as_str())
            .collect();
        ordered_unique_layers(digests, "v1")
    }
}

/// Schema v2 manifest (the parts this pipeline consumes).
#[derive(Debug, Deserialize)]
pub struct ManifestV2 {
    #[serde(default)]
    pub layers: Vec<BlobDescriptor>,
}

/// Schema v2 layer descriptor.
#[derive(Debug, Deserialize)]
pub struct BlobDescriptor {
    pub digest: String,
}

impl ManifestV2 {
    /// Extract the bottom-up layer list. Schema v2 already lists layers
    /// base-first; only uniqueness is enforced.
    pub fn layers(&self) -> Result<Vec<Layer>> {
        let digests: Vec<&str> = self
            .layers
            .iter()
            .map(|layer| layer.digest.as_str())
            .collect();
        ordered_unique_layers(digests, "v2")
    }
}

/// Build the final layer list, rejecting duplicates with no partial result.
fn ordered_unique_layers(digests: Vec<&str>, schema: &str) -> Result<Vec<Layer>> {
    let mut seen = HashSet::new();
    let mut layers = Vec::with_capacity(digests.len());
    for (index, digest) in digests.into_iter().enumerate() {
        if !seen.insert(digest) {
            return Err(ScanError::DuplicateLayer {
                schema: schema.to_string(),
                digest: digest.to_string(),
            });
        }
        layers.push(Layer {
            digest: digest.to_string(),
            index,
        });
    }
    Ok(layers)
}
