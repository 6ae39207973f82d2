//! Orchestrator: drives exactly one image through the scan pipeline.
//!
//! The pipeline is strictly sequential by design: the chain protocol only
//! makes sense if each submission observably follows its parent's, and
//! every staged URL must be fetchable the moment it is referenced. Only the
//! staging server's request loop runs concurrently, as a background task.

use clairscan_core::config::ScanConfig;
use clairscan_core::error::{Result, ScanError};
use serde::Serialize;
use tracing::{info, warn};

use crate::clair::{normalize, sorted_ids, ClairClient, SeverityTally, Vulnerability};
use crate::registry::{ImageReference, RegistryClient};
use crate::staging::{StagingArea, StagingServer};

/// Scan progression for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    NotStarted,
    LayersSubmitting,
    LayersSubmitted,
    ResultFetching,
    Done,
    Failed,
}

/// Aggregate result of one scan run.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Image the report was produced for
    pub image: String,
    /// Resolved manifest digest
    pub manifest_digest: String,
    /// Namespace the engine classified the image under
    pub namespace: String,
    /// Normalized, unique-by-ID vulnerability list
    pub vulnerabilities: Vec<Vulnerability>,
    /// Severity label → count, plus total
    pub tally: SeverityTally,
}

impl ScanReport {
    /// Name-sorted unique vulnerability IDs, for diffing against another
    /// scanner's output.
    pub fn sorted_ids(&self) -> Vec<String> {
        sorted_ids(&self.vulnerabilities)
    }
}

/// Single-image, single-run scan pipeline.
#[derive(Debug)]
pub struct ImageScanner {
    config: ScanConfig,
    registry: RegistryClient,
    clair: ClairClient,
    area: StagingArea,
    server: StagingServer,
    phase: ScanPhase,
}

impl ImageScanner {
    /// Build the pipeline from a validated configuration.
    pub fn new(config: ScanConfig) -> Result<Self> {
        config.validate().map_err(ScanError::Config)?;

        let reference = ImageReference::new(
            config.registry_url.clone(),
            config.repository.clone(),
            config.image.clone(),
            config.tag.clone(),
        );
        let registry = RegistryClient::new(
            reference,
            config.username.clone(),
            config.password.clone(),
            config.allow_insecure,
        )?;
        let clair = ClairClient::new(config.clair_addr.clone(), config.clair_port)?;
        let external_ip = config
            .external_ip
            .clone()
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let server = StagingServer::new(external_ip, config.staging_port);

        Ok(Self {
            config,
            registry,
            clair,
            area: StagingArea::in_temp_dir(),
            server,
            phase: ScanPhase::NotStarted,
        })
    }

    /// Use a specific staging root instead of the system temp dir.
    pub fn with_staging_area(mut self, area: StagingArea) -> Self {
        self.area = area;
        self
    }

    /// Current scan phase.
    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Run the whole pipeline under the configured deadline.
    ///
    /// The staging server is shut down (bounded) regardless of outcome, and
    /// `phase()` reflects the outcome afterwards (`Done` or `Failed`).
    pub async fn run(&mut self) -> Result<ScanReport> {
        let deadline = self.config.timeout();
        let result = match tokio::time::timeout(deadline, self.run_pipeline()).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::Timeout(deadline)),
        };
        self.server.shutdown().await;
        if result.is_err() {
            self.phase = ScanPhase::Failed;
        }
        result
    }

    async fn run_pipeline(&mut self) -> Result<ScanReport> {
        // Bridge must be reachable before any submission references its URLs;
        // start() returning is the readiness signal.
        self.server.start(&self.area).await?;

        let digest = self.registry.resolve_digest().await?;
        let layers = self
            .registry
            .list_layers(self.config.manifest_schema, &digest)
            .await?;
        if layers.is_empty() {
            return Err(ScanError::Protocol(format!(
                "manifest {digest} contains no layers"
            )));
        }

        // Download and stage every layer before the first submission: the
        // protocol requires a URL to be immediately fetchable when referenced.
        for layer in &layers {
            let blob = self.registry.download_blob(&layer.digest).await?;
            self.area.save_file(&layer.digest, blob).await?;
        }
        info!(count = layers.len(), "All layers downloaded and staged");

        self.phase = ScanPhase::LayersSubmitting;
        let mut parent = String::new();
        for layer in &layers {
            let url = self.server.layer_url(&layer.digest);
            if let Err(err) = self
                .clair
                .schedule_layer_scan(&url, &layer.digest, &parent)
                .await
            {
                // Non-fatal: only the top layer's aggregate result is consumed
                warn!(
                    digest = %layer.digest,
                    index = layer.index,
                    error = %err,
                    "Layer submission failed; continuing chain"
                );
            }
            // The next layer declares the intended parent even when this
            // submission failed
            parent = layer.digest.clone();
        }
        self.phase = ScanPhase::LayersSubmitted;

        let top = layers
            .last()
            .ok_or_else(|| ScanError::Protocol("manifest contains no layers".to_string()))?;
        self.phase = ScanPhase::ResultFetching;
        let (namespace, features) = self.clair.fetch_layer_result(&top.digest).await?;

        let vulnerabilities = normalize(&features)?;
        let tally = SeverityTally::from_records(&vulnerabilities);

        if self.config.cleanup {
            for layer in &layers {
                if let Err(err) = self.area.delete_file(&layer.digest).await {
                    warn!(digest = %layer.digest, error = %err, "Failed to remove staged layer");
                }
            }
        }

        self.phase = ScanPhase::Done;
        Ok(ScanReport {
            image: self.registry.reference().to_string(),
            manifest_digest: digest,
            namespace,
            vulnerabilities,
            tally,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ScanConfig::default(); // no image name
        let err = ImageScanner::new(config).unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
    }

    #[test]
    fn test_new_starts_in_not_started_phase() {
        let config = ScanConfig {
            image: "busybox".to_string(),
            ..Default::default()
        };
        let scanner = ImageScanner::new(config).unwrap();
        assert_eq!(scanner.phase(), ScanPhase::NotStarted);
    }
}
