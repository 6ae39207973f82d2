//! Layer staging bridge.
//!
//! The scan engine pulls layer content by URL rather than accepting pushed
//! bytes, so downloaded blobs are materialized under a digest-named
//! directory and served over plain HTTP for the lifetime of one run.

mod area;
mod server;

pub use area::{StagingArea, LAYER_FILE_NAME};
pub use server::StagingServer;
