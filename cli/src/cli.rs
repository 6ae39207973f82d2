//! Command-line argument definitions.

use std::path::PathBuf;

use clairscan_core::config::{ManifestSchema, ScanConfig};
use clap::Parser;

/// Scan a container image for known vulnerabilities with a Clair engine.
#[derive(Parser, Debug)]
#[command(name = "clairscan", version, about)]
pub struct Cli {
    /// Scan engine address (hostname or IP)
    #[arg(long = "clair-ip")]
    pub clair_ip: String,

    /// Scan engine API port
    #[arg(long = "clair-port", default_value_t = 6060)]
    pub clair_port: u16,

    /// Registry user name
    #[arg(long)]
    pub user: Option<String>,

    /// Registry password
    #[arg(long)]
    pub password: Option<String>,

    /// Registry URL, including scheme
    #[arg(long, default_value = "https://registry-1.docker.io")]
    pub url: String,

    /// Repository, like "library"
    #[arg(long, default_value = "library")]
    pub repo: String,

    /// Image name, like "busybox"
    #[arg(long)]
    pub image: String,

    /// Tag name, like "latest"
    #[arg(long, default_value = "latest")]
    pub tag: String,

    /// Manifest schema version to request (v1 or v2)
    #[arg(long, default_value = "v2", value_parser = parse_manifest_schema)]
    pub manifest_schema: ManifestSchema,

    /// Staging bridge port (0 = ephemeral)
    #[arg(long, default_value_t = 5566)]
    pub staging_port: u16,

    /// Externally reachable IP for staged layer URLs (default: autodetected)
    #[arg(long)]
    pub external_ip: Option<String>,

    /// Retry certificate-trust failures without TLS verification
    #[arg(long)]
    pub insecure: bool,

    /// Delete staged layer files after the run
    #[arg(long)]
    pub cleanup: bool,

    /// Overall deadline in seconds
    #[arg(long, default_value_t = 600)]
    pub timeout: u64,

    /// Where to write the normalized JSON report
    #[arg(long, default_value = "scan_result.json")]
    pub result_file: PathBuf,

    /// Where to write the sorted vulnerability ID list
    #[arg(long, default_value = "scan_vulns.txt")]
    pub vulns_file: PathBuf,
}

fn parse_manifest_schema(s: &str) -> Result<ManifestSchema, String> {
    s.parse()
}

impl Cli {
    /// Build the run configuration, with the externally reachable IP
    /// already resolved.
    pub fn to_config(&self, external_ip: String) -> ScanConfig {
        ScanConfig {
            clair_addr: self.clair_ip.clone(),
            clair_port: self.clair_port,
            registry_url: self.url.clone(),
            username: self.user.clone(),
            password: self.password.clone(),
            repository: self.repo.clone(),
            image: self.image.clone(),
            tag: self.tag.clone(),
            manifest_schema: self.manifest_schema,
            staging_port: self.staging_port,
            external_ip: Some(external_ip),
            allow_insecure: self.insecure,
            cleanup: self.cleanup,
            timeout: self.timeout,
        }
    }
}
