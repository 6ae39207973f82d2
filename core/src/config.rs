use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default registry when none is specified.
const DEFAULT_REGISTRY_URL: &str = "https://registry-1.docker.io";

/// Default tag when none is specified.
const DEFAULT_TAG: &str = "latest";

/// Default scan engine API port.
const DEFAULT_CLAIR_PORT: u16 = 6060;

/// Default staging bridge port.
const DEFAULT_STAGING_PORT: u16 = 5566;

/// Default overall run deadline in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Scan run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Scan engine address (hostname or IP, no scheme)
    pub clair_addr: String,

    /// Scan engine API port
    pub clair_port: u16,

    /// Registry base URL, including scheme (e.g. "https://registry-1.docker.io")
    pub registry_url: String,

    /// Registry username (anonymous when absent)
    pub username: Option<String>,

    /// Registry password
    pub password: Option<String>,

    /// Repository (e.g. "library")
    pub repository: String,

    /// Image name (e.g. "busybox")
    pub image: String,

    /// Tag name (e.g. "latest")
    pub tag: String,

    /// Manifest schema version to request from the registry
    pub manifest_schema: ManifestSchema,

    /// Staging bridge listen port (0 = ephemeral)
    pub staging_port: u16,

    /// Externally reachable IP the scan engine uses to fetch staged layers
    /// (autodetected by the CLI when absent)
    pub external_ip: Option<String>,

    /// Retry certificate-trust failures without TLS verification
    pub allow_insecure: bool,

    /// Delete staged layer files after the run
    pub cleanup: bool,

    /// Overall run deadline in seconds
    pub timeout: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            clair_addr: "localhost".to_string(),
            clair_port: DEFAULT_CLAIR_PORT,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            username: None,
            password: None,
            repository: "library".to_string(),
            image: String::new(),
            tag: DEFAULT_TAG.to_string(),
            manifest_schema: ManifestSchema::default(),
            staging_port: DEFAULT_STAGING_PORT,
            external_ip: None,
            allow_insecure: false,
            cleanup: false,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ScanConfig {
    /// Overall run deadline
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Validate the configuration before a run
    pub fn validate(&self) -> Result<(), String> {
        if self.clair_addr.is_empty() {
            return Err("scan engine address must not be empty".to_string());
        }
        if self.image.is_empty() {
            return Err("image name must not be empty".to_string());
        }
        if self.tag.is_empty() {
            return Err("tag must not be empty".to_string());
        }
        if !self.registry_url.starts_with("http://") && !self.registry_url.starts_with("https://")
        {
            return Err(format!(
                "registry URL must include a scheme: {}",
                self.registry_url
            ));
        }
        if self.timeout == 0 {
            return Err("timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Docker manifest schema version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestSchema {
    V1,
    #[default]
    V2,
}

impl fmt::Display for ManifestSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestSchema::V1 => write!(f, "v1"),
            ManifestSchema::V2 => write!(f, "v2"),
        }
    }
}

impl FromStr for ManifestSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1" | "1" => Ok(ManifestSchema::V1),
            "v2" | "2" => Ok(ManifestSchema::V2),
            other => Err(format!("unknown manifest schema: {other}")),
        }
    }
}
