//! Scan engine protocol client.

use clairscan_core::error::{ChainSubmissionError, Result, ScanError};
use reqwest::StatusCode;
use tracing::{debug, info};

use super::api::{Feature, LayerDescriptor, LayerEnvelope, LAYER_FORMAT};

/// Engine message marking a submission whose declared parent was never
/// successfully submitted.
const PARENT_UNKNOWN_MARKER: &str = "parent layer is unknown";

/// Client for one scan engine instance.
#[derive(Debug)]
pub struct ClairClient {
    http: reqwest::Client,
    addr: String,
    port: u16,
}

impl ClairClient {
    /// Create a client for the engine at `addr:port` (plain HTTP).
    pub fn new(addr: impl Into<String>, port: u16) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ScanError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            addr: addr.into(),
            port,
        })
    }

    /// Submit one layer for analysis.
    ///
    /// `parent` is the digest of the previously submitted layer, empty for
    /// the base layer. Only HTTP 201 is success; every other status is
    /// decoded into a structured submission error, which the orchestrator
    /// absorbs without aborting the chain.
    pub async fn schedule_layer_scan(
        &self,
        url: &str,
        digest: &str,
        parent: &str,
    ) -> std::result::Result<(), ChainSubmissionError> {
        let payload = LayerEnvelope {
            layer: Some(LayerDescriptor {
                name: digest.to_string(),
                path: url.to_string(),
                parent_name: parent.to_string(),
                format: LAYER_FORMAT.to_string(),
                ..Default::default()
            }),
            error: None,
        };

        let response = self
            .http
            .post(self.layers_url())
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChainSubmissionError::Transport {
                digest: digest.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::CREATED {
            debug!(digest = %digest, parent = %parent, "Layer submitted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<LayerEnvelope>(&body)
            .ok()
            .and_then(|envelope| envelope.error)
            .map(|error| error.message)
            .unwrap_or_else(|| body.trim().to_string());

        match status {
            StatusCode::BAD_REQUEST if message.contains(PARENT_UNKNOWN_MARKER) => {
                Err(ChainSubmissionError::ParentUnknown {
                    digest: digest.to_string(),
                    parent: parent.to_string(),
                })
            }
            // Engine-side: "worker: OS and/or package manager are not supported"
            StatusCode::UNPROCESSABLE_ENTITY => Err(ChainSubmissionError::UnsupportedLayer {
                digest: digest.to_string(),
                message,
            }),
            _ => Err(ChainSubmissionError::Rejected {
                digest: digest.to_string(),
                status: status.as_u16(),
                message,
            }),
        }
    }

    /// Fetch the engine's view of one layer, vulnerabilities included.
    ///
    /// Queried only for the top of the chain: by protocol contract that
    /// result already accumulates every ancestor's vulnerabilities. Any
    /// failure here is fatal to the run.
    pub async fn fetch_layer_result(&self, digest: &str) -> Result<(String, Vec<Feature>)> {
        let url = self.layer_result_url(digest);
        let response =
            self.http
                .get(&url)
                .send()
                .await
                .map_err(|e| ScanError::ResultFetch {
                    digest: digest.to_string(),
                    message: e.to_string(),
                })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::ResultFetch {
                digest: digest.to_string(),
                message: format!("expected HTTP 200, got {status}: {body}"),
            });
        }

        let envelope: LayerEnvelope =
            response.json().await.map_err(|e| ScanError::ResultFetch {
                digest: digest.to_string(),
                message: format!("failed to decode response: {e}"),
            })?;

        if let Some(error) = envelope.error {
            return Err(ScanError::ResultFetch {
                digest: digest.to_string(),
                message: format!("engine reported: {}", error.message),
            });
        }
        let layer = envelope.layer.ok_or_else(|| ScanError::ResultFetch {
            digest: digest.to_string(),
            message: "response carried no layer".to_string(),
        })?;

        info!(
            digest = %digest,
            namespace = %layer.namespace_name,
            features = layer.features.len(),
            "Fetched aggregate scan result"
        );
        Ok((layer.namespace_name, layer.features))
    }

    fn layers_url(&self) -> String {
        format!("http://{}:{}/v1/layers", self.addr, self.port)
    }

    fn layer_result_url(&self, digest: &str) -> String {
        format!(
            "http://{}:{}/v1/layers/{}?vulnerabilities",
            self.addr, self.port, digest
        )
    }
}
