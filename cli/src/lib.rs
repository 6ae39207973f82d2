//! Clairscan CLI: argument parsing, process wiring, output files.

pub mod cli;
pub mod netutil;
pub mod output;

use clairscan::ImageScanner;
use clairscan_core::error::Result;
use tracing::info;

pub use cli::Cli;

/// Run one scan from parsed arguments.
pub async fn run(cli: Cli) -> Result<()> {
    let external_ip = match &cli.external_ip {
        Some(ip) => ip.clone(),
        None => netutil::local_ip()?,
    };
    info!(external_ip = %external_ip, "Staging layers behind local file server");

    let config = cli.to_config(external_ip);
    let mut scanner = ImageScanner::new(config)?;
    let report = scanner.run().await?;

    output::log_tally(&report);
    output::write_report(&report, &cli.result_file, &cli.vulns_file).await?;
    Ok(())
}
