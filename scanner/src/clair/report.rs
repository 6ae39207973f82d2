//! Result normalization: flattens the engine's per-feature vulnerability
//! tree into a unique-by-ID list and tallies severities.

use std::collections::{BTreeMap, BTreeSet};

use clairscan_core::error::{Result, ScanError};
use serde::Serialize;
use serde_json::Number;

use super::api::{Feature, VulnerabilityMetadata};

/// Canonical vulnerability record, one per unique ID.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Vulnerability {
    pub feature_name: String,
    pub feature_version: String,
    pub id: String,
    pub namespace: String,
    pub description: String,
    pub links: Vec<String>,
    pub severity: String,
    pub fixed_by: String,
    pub cvss: CvssInfo,
    pub advisories: Vec<Advisory>,
}

/// CVSS scoring, both format versions, scores rendered as strings
/// (empty when the engine reported none).
#[derive(Debug, Clone, Default, Serialize)]
pub struct CvssInfo {
    pub cvss_v2_vector: String,
    pub cvss_v2_score: String,
    pub cvss_v3_vector: String,
    pub cvss_v3_score: String,
    pub cvss_v3_exploitability_score: String,
    pub cvss_v3_impact_score: String,
}

/// Localized advisory entry attached to a vulnerability.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Advisory {
    pub number: String,
    pub title: String,
    pub severity: String,
    pub ref_link: String,
    pub description: String,
}

/// Flatten the feature tree into normalized records.
///
/// Records are keyed by vulnerability ID; when two features report the same
/// ID, the last one observed wins (no field merging, kept for
/// compatibility with the scan engine's existing consumers). A metadata
/// blob that fails to decode is fatal to the whole pass: partial
/// vulnerability data is worse than no report. Output is sorted by ID.
pub fn normalize(features: &[Feature]) -> Result<Vec<Vulnerability>> {
    let mut by_id: BTreeMap<String, Vulnerability> = BTreeMap::new();

    for feature in features {
        for raw in &feature.vulnerabilities {
            let metadata = match &raw.metadata {
                Some(blob) => serde_json::from_str::<VulnerabilityMetadata>(blob.get()).map_err(
                    |e| ScanError::MetadataDecode {
                        id: raw.name.clone(),
                        message: e.to_string(),
                    },
                )?,
                None => VulnerabilityMetadata::default(),
            };

            let record = Vulnerability {
                feature_name: feature.name.clone(),
                feature_version: feature.version.clone(),
                id: raw.name.clone(),
                namespace: raw.namespace_name.clone(),
                description: raw.description.clone(),
                links: if raw.link.is_empty() {
                    Vec::new()
                } else {
                    vec![raw.link.clone()]
                },
                severity: raw.severity.clone(),
                fixed_by: raw.fixed_by.clone(),
                cvss: CvssInfo {
                    cvss_v2_vector: metadata.nvd.cvss_v2.vectors,
                    cvss_v2_score: score_string(metadata.nvd.cvss_v2.score),
                    cvss_v3_vector: metadata.nvd.cvss_v3.vectors,
                    cvss_v3_score: score_string(metadata.nvd.cvss_v3.score),
                    cvss_v3_exploitability_score: score_string(
                        metadata.nvd.cvss_v3.exploitability_score,
                    ),
                    cvss_v3_impact_score: score_string(metadata.nvd.cvss_v3.impact_score),
                },
                advisories: metadata
                    .cnvd
                    .into_iter()
                    .map(|entry| Advisory {
                        number: entry.number,
                        title: entry.title,
                        severity: entry.severity,
                        ref_link: entry.reference_link,
                        description: entry.description,
                    })
                    .collect(),
            };

            by_id.insert(record.id.clone(), record);
        }
    }

    Ok(by_id.into_values().collect())
}

/// Name-sorted unique ID list, for diffing against another scanner's output.
pub fn sorted_ids(records: &[Vulnerability]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn score_string(score: Option<Number>) -> String {
    score.map(|n| n.to_string()).unwrap_or_default()
}

/// Severity label → count mapping, built once per run, never decremented.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeverityTally {
    counts: BTreeMap<String, usize>,
    total: usize,
}

impl SeverityTally {
    /// Count each record's severity label.
    pub fn from_records(records: &[Vulnerability]) -> Self {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in records {
            *counts.entry(record.severity.clone()).or_insert(0) += 1;
        }
        Self {
            counts,
            total: records.len(),
        }
    }

    /// Count for one severity label.
    pub fn count(&self, severity: &str) -> usize {
        self.counts.get(severity).copied().unwrap_or(0)
    }

    /// Per-severity counts.
    pub fn counts(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }

    /// Total number of normalized records.
    pub fn total(&self) -> usize {
        self.total
    }
}
