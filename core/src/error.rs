use std::time::Duration;

use thiserror::Error;

/// Clairscan error types
#[derive(Error, Debug)]
pub enum ScanError {
    /// Registry rejected the supplied credentials
    #[error("Registry authentication failed: {registry} - {message}")]
    Auth { registry: String, message: String },

    /// Missing tag, digest or blob
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed registry or scan engine response
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Network-level failure (retried for blob downloads, fatal elsewhere)
    #[error("Transport error: {context}: {message}")]
    Transport { context: String, message: String },

    /// Manifest integrity violation: the same digest appeared twice
    #[error("Duplicate layer digest in {schema} manifest: {digest}")]
    DuplicateLayer { schema: String, digest: String },

    /// One layer's chain submission failed (non-fatal to the run)
    #[error(transparent)]
    ChainSubmission(#[from] ChainSubmissionError),

    /// The aggregate result for the top layer could not be fetched
    #[error("Result fetch failed for layer {digest}: {message}")]
    ResultFetch { digest: String, message: String },

    /// Malformed vulnerability metadata (fatal to the normalization pass)
    #[error("Metadata decode failed for vulnerability {id}: {message}")]
    MetadataDecode { id: String, message: String },

    /// Layer staging bridge error (filesystem or HTTP listener)
    #[error("Staging error: {0}")]
    Staging(String),

    /// Overall run deadline exceeded
    #[error("Scan timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Per-layer submission failures.
///
/// The orchestrator logs these and continues the chain with the intended
/// parent digest; only the final aggregate result is consumed.
#[derive(Error, Debug)]
pub enum ChainSubmissionError {
    /// The declared parent was never successfully submitted, either an ordering
    /// bug or a consequence of an earlier submission failure
    #[error("Scan engine does not know parent layer {parent} of {digest}")]
    ParentUnknown { digest: String, parent: String },

    /// The engine cannot analyze this layer's contents at all
    #[error("Scan engine cannot analyze layer {digest}: {message}")]
    UnsupportedLayer { digest: String, message: String },

    /// Any other engine rejection
    #[error("Scan engine rejected layer {digest}: HTTP {status} - {message}")]
    Rejected {
        digest: String,
        status: u16,
        message: String,
    },

    /// The submission request never reached the engine
    #[error("Submission of layer {digest} failed: {message}")]
    Transport { digest: String, message: String },
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Serialization(err.to_string())
    }
}

/// Result type alias for Clairscan operations
pub type Result<T> = std::result::Result<T, ScanError>;
