//! Run outputs: severity tally logging and report files.

use std::path::Path;

use clairscan::ScanReport;
use clairscan_core::error::Result;
use tracing::info;

/// Log the per-severity counts and the total.
pub fn log_tally(report: &ScanReport) {
    for (severity, count) in report.tally.counts() {
        info!(severity = %severity, count, "Severity tally");
    }
    info!(total = report.tally.total(), "Total vulnerabilities");
}

/// Write the normalized vulnerability list as JSON and the sorted unique
/// ID list as plain text (one ID per line, for diffing against another
/// scanner's output).
pub async fn write_report(
    report: &ScanReport,
    result_file: &Path,
    vulns_file: &Path,
) -> Result<()> {
    let json = serde_json::to_vec_pretty(&report.vulnerabilities)
        .map_err(clairscan_core::error::ScanError::from)?;
    tokio::fs::write(result_file, json).await?;

    let mut ids = String::new();
    for id in report.sorted_ids() {
        ids.push_str(&id);
        ids.push('\n');
    }
    tokio::fs::write(vulns_file, ids).await?;

    info!(
        result = %result_file.display(),
        vulns = %vulns_file.display(),
        "Wrote scan outputs"
    );
    Ok(())
}
