//! Registry protocol client.
//!
//! Speaks the Docker registry v2 HTTP API directly: manifest digest
//! resolution via the `Docker-Content-Digest` header, manifest fetch by
//! digest (schema v1 or v2), and blob download with bounded retry.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clairscan_core::config::ManifestSchema;
use clairscan_core::error::{Result, ScanError};
use futures::TryStreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Method, Response, StatusCode};
use tokio::io::AsyncRead;
use tokio::sync::RwLock;
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

use super::manifest::{Layer, ManifestV1, ManifestV2};
use super::manifest::{MANIFEST_V1_MEDIA_TYPE, MANIFEST_V2_MEDIA_TYPE};
use super::reference::ImageReference;
use super::tls;

/// Digest header attached to manifest responses.
const DIGEST_HEADER: &str = "Docker-Content-Digest";

/// Blob download retry bound.
const BLOB_RETRY_COUNT: usize = 5;

/// Fixed delay between blob download attempts.
const BLOB_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Client for one image's registry.
///
/// Connections start with strict TLS verification. If the first request
/// fails on a certificate-trust problem and `allow_insecure` is set, the
/// client is swapped for a non-verifying one and the request retried once;
/// all later requests reuse the relaxed client.
#[derive(Debug)]
pub struct RegistryClient {
    reference: ImageReference,
    username: Option<String>,
    password: Option<String>,
    allow_insecure: bool,
    http: RwLock<reqwest::Client>,
    relaxed: AtomicBool,
    retry_count: usize,
    retry_interval: Duration,
}

impl RegistryClient {
    /// Create a client with strict TLS verification.
    pub fn new(
        reference: ImageReference,
        username: Option<String>,
        password: Option<String>,
        allow_insecure: bool,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ScanError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            reference,
            username,
            password,
            allow_insecure,
            http: RwLock::new(http),
            relaxed: AtomicBool::new(false),
            retry_count: BLOB_RETRY_COUNT,
            retry_interval: BLOB_RETRY_INTERVAL,
        })
    }

    /// Override the blob retry policy (shorter intervals for tests).
    pub fn with_retry_policy(mut self, count: usize, interval: Duration) -> Self {
        self.retry_count = count.max(1);
        self.retry_interval = interval;
        self
    }

    /// Image reference this client was built for.
    pub fn reference(&self) -> &ImageReference {
        &self.reference
    }

    /// Resolve the manifest digest for the reference's tag.
    pub async fn resolve_digest(&self) -> Result<String> {
        let url = self.manifest_url(&self.reference.tag);
        let what = format!(
            "tag '{}' of {}",
            self.reference.tag,
            self.reference.name()
        );

        let response = self
            .send(Method::HEAD, &url, Some(MANIFEST_V2_MEDIA_TYPE))
            .await
            .map_err(|e| self.transport("digest resolution", e))?;
        self.check_status(response.status(), &what)?;
        if let Some(digest) = digest_header(&response) {
            debug!(digest = %digest, image = %self.reference, "Resolved manifest digest");
            return Ok(digest);
        }

        // Some registries only attach the digest header on GET
        let response = self
            .send(Method::GET, &url, Some(MANIFEST_V2_MEDIA_TYPE))
            .await
            .map_err(|e| self.transport("digest resolution", e))?;
        self.check_status(response.status(), &what)?;
        digest_header(&response).ok_or_else(|| {
            ScanError::Protocol(format!(
                "registry response for {what} carried no {DIGEST_HEADER} header"
            ))
        })
    }

    /// Fetch the manifest by digest and extract the bottom-up layer list.
    pub async fn list_layers(&self, schema: ManifestSchema, digest: &str) -> Result<Vec<Layer>> {
        let accept = match schema {
            ManifestSchema::V1 => MANIFEST_V1_MEDIA_TYPE,
            ManifestSchema::V2 => MANIFEST_V2_MEDIA_TYPE,
        };
        let url = self.manifest_url(digest);
        let what = format!("manifest {} of {}", digest, self.reference.name());

        let response = self
            .send(Method::GET, &url, Some(accept))
            .await
            .map_err(|e| self.transport("manifest fetch", e))?;
        self.check_status(response.status(), &what)?;
        let body = response
            .text()
            .await
            .map_err(|e| ScanError::Protocol(format!("failed to read {what}: {e}")))?;

        let layers = match schema {
            ManifestSchema::V1 => serde_json::from_str::<ManifestV1>(&body)
                .map_err(|e| ScanError::Protocol(format!("malformed v1 manifest: {e}")))?
                .layers()?,
            ManifestSchema::V2 => serde_json::from_str::<ManifestV2>(&body)
                .map_err(|e| ScanError::Protocol(format!("malformed v2 manifest: {e}")))?
                .layers()?,
        };
        info!(
            image = %self.reference,
            schema = %schema,
            count = layers.len(),
            "Listed image layers"
        );
        Ok(layers)
    }

    /// Download one layer blob as a byte stream.
    ///
    /// Transport errors and 5xx responses are retried up to the bound with a
    /// fixed inter-attempt delay; 4xx responses are fatal immediately.
    /// Exhausting the retries surfaces the last transport error.
    pub async fn download_blob(&self, digest: &str) -> Result<impl AsyncRead + Send + Unpin> {
        let url = self.blob_url(digest);
        let what = format!("blob {} of {}", digest, self.reference.name());
        let mut last_error = None;

        for attempt in 1..=self.retry_count {
            match self.send(Method::GET, &url, None).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        debug!(digest = %digest, attempt, "Blob download started");
                        let stream = response
                            .bytes_stream()
                            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
                        return Ok(StreamReader::new(stream));
                    }
                    if status.is_client_error() {
                        return Err(self.error_for_status(status, &what));
                    }
                    last_error = Some(ScanError::Transport {
                        context: what.clone(),
                        message: format!("HTTP {status}"),
                    });
                }
                Err(err) => {
                    last_error = Some(self.transport(&what, err));
                }
            }
            if attempt < self.retry_count {
                warn!(digest = %digest, attempt, "Blob download failed; retrying");
                tokio::time::sleep(self.retry_interval).await;
            }
        }

        Err(last_error.unwrap_or_else(|| ScanError::Transport {
            context: what,
            message: "retries exhausted".to_string(),
        }))
    }

    /// Issue one request, downgrading TLS verification at most once when the
    /// failure is a certificate-trust problem and the caller opted in.
    async fn send(
        &self,
        method: Method,
        url: &str,
        accept: Option<&str>,
    ) -> std::result::Result<Response, reqwest::Error> {
        match self.send_once(method.clone(), url, accept).await {
            Err(err)
                if self.allow_insecure
                    && !self.relaxed.load(Ordering::SeqCst)
                    && tls::is_certificate_error(&err) =>
            {
                warn!(
                    url = %url,
                    "Certificate verification failed and insecure mode is on; retrying without TLS verification"
                );
                self.relax().await?;
                self.send_once(method, url, accept).await
            }
            other => other,
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        accept: Option<&str>,
    ) -> std::result::Result<Response, reqwest::Error> {
        let client = self.http.read().await.clone();
        let mut request = client.request(method, url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }
        request.send().await
    }

    /// Swap in a client that skips certificate verification.
    async fn relax(&self) -> std::result::Result<(), reqwest::Error> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        *self.http.write().await = client;
        self.relaxed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn check_status(&self, status: StatusCode, what: &str) -> Result<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(self.error_for_status(status, what))
        }
    }

    fn error_for_status(&self, status: StatusCode, what: &str) -> ScanError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ScanError::Auth {
                registry: self.reference.registry_url.clone(),
                message: format!("HTTP {status} while fetching {what}"),
            },
            StatusCode::NOT_FOUND => ScanError::NotFound(what.to_string()),
            _ => ScanError::Protocol(format!("unexpected HTTP {status} while fetching {what}")),
        }
    }

    fn transport(&self, context: &str, err: reqwest::Error) -> ScanError {
        ScanError::Transport {
            context: context.to_string(),
            message: err.to_string(),
        }
    }

    fn manifest_url(&self, tag_or_digest: &str) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            self.reference.registry_url,
            self.reference.name(),
            tag_or_digest
        )
    }

    fn blob_url(&self, digest: &str) -> String {
        format!(
            "{}/v2/{}/blobs/{}",
            self.reference.registry_url,
            self.reference.name(),
            digest
        )
    }
}

fn digest_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get(DIGEST_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
