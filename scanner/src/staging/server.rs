//! HTTP serving loop for staged layers.
//!
//! One listener per run, a single route. `start()` only returns once the
//! listener is bound, so the orchestrator can treat its return as the
//! readiness signal instead of sleeping.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::StreamBody;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use clairscan_core::error::{Result, ScanError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

use super::area::{StagingArea, LAYER_FILE_NAME};

/// Graceful shutdown bound; afterwards the serving task is aborted.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Staging bridge HTTP server.
///
/// Serves `GET /{digest}/layer.tar` from a [`StagingArea`]; no other routes.
#[derive(Debug)]
pub struct StagingServer {
    external_ip: String,
    requested_port: u16,
    bound_port: Option<u16>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StagingServer {
    /// Create a server that will listen on `port` (0 = ephemeral) and
    /// advertise `external_ip` in layer URLs.
    pub fn new(external_ip: impl Into<String>, port: u16) -> Self {
        Self {
            external_ip: external_ip.into(),
            requested_port: port,
            bound_port: None,
            shutdown_tx: None,
            handle: None,
        }
    }

    /// Bind the listener and start serving `area` in a background task.
    ///
    /// The listener is bound synchronously; when this returns `Ok`, every
    /// staged layer URL is already fetchable.
    pub async fn start(&mut self, area: &StagingArea) -> Result<()> {
        area.ensure_root().await?;

        let listener = std::net::TcpListener::bind(("0.0.0.0", self.requested_port))
            .map_err(|e| ScanError::Staging(format!("Failed to bind staging listener: {e}")))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| ScanError::Staging(format!("Failed to configure listener: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| ScanError::Staging(format!("Failed to read listener address: {e}")))?
            .port();

        let root = Arc::new(area.root().to_path_buf());
        let app = Router::new()
            .route("/:digest/:file", get(serve_layer))
            .with_state(root);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::Server::from_tcp(listener)
            .map_err(|e| ScanError::Staging(format!("Failed to start staging server: {e}")))?
            .serve(app.into_make_service())
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });

        let handle = tokio::spawn(async move {
            if let Err(err) = server.await {
                error!(error = %err, "Staging server failed");
            }
        });

        self.bound_port = Some(port);
        self.shutdown_tx = Some(shutdown_tx);
        self.handle = Some(handle);
        info!(port, "Staging server listening");
        Ok(())
    }

    /// Port the listener is actually bound to.
    pub fn port(&self) -> u16 {
        self.bound_port.unwrap_or(self.requested_port)
    }

    /// Deterministic URL the scan engine fetches a staged layer from.
    pub fn layer_url(&self, digest: &str) -> String {
        format!(
            "http://{}:{}/{}/{}",
            self.external_ip,
            self.port(),
            digest,
            LAYER_FILE_NAME
        )
    }

    /// Stop accepting connections and wait for in-flight transfers, bounded
    /// by [`SHUTDOWN_TIMEOUT`]. A timeout forces shutdown; it is not fatal.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut handle) = self.handle.take() {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut handle)
                .await
                .is_err()
            {
                warn!("Staging server did not drain in time; forcing shutdown");
                handle.abort();
            }
        }
    }
}

async fn serve_layer(
    State(root): State<Arc<PathBuf>>,
    Path((digest, file)): Path<(String, String)>,
) -> Response {
    // Only the fixed filename under a plain digest directory is servable
    if file != LAYER_FILE_NAME || digest.contains('/') || digest.contains("..") {
        return StatusCode::NOT_FOUND.into_response();
    }
    match tokio::fs::File::open(root.join(&digest).join(&file)).await {
        Ok(file) => {
            let body = StreamBody::new(ReaderStream::new(file));
            ([(header::CONTENT_TYPE, "application/x-tar")], body).into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
