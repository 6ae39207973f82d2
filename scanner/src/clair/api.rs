//! Scan engine wire model.
//!
//! Field names are the engine's (PascalCase envelope, camelCase advisory
//! entries) and must be matched byte-exact on the wire.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Number;

/// Layer format declared on every submission.
pub const LAYER_FORMAT: &str = "Docker";

/// Request and response envelope for the layer endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerEnvelope {
    #[serde(rename = "Layer", skip_serializing_if = "Option::is_none")]
    pub layer: Option<LayerDescriptor>,
    #[serde(rename = "Error", skip_serializing_if = "Option::is_none")]
    pub error: Option<EngineError>,
}

/// Structured error payload the engine may embed in an envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineError {
    #[serde(rename = "Message")]
    pub message: String,
}

/// A layer as the engine sees it: submission fields (name, fetchable path,
/// parent, format) plus the analyzed features on responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerDescriptor {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Path", skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Empty only for the base layer
    #[serde(rename = "ParentName")]
    pub parent_name: String,
    #[serde(rename = "Format", skip_serializing_if = "String::is_empty")]
    pub format: String,
    #[serde(rename = "NamespaceName", skip_serializing_if = "String::is_empty")]
    pub namespace_name: String,
    #[serde(rename = "Features", skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<Feature>,
}

/// An installed package carrying zero or more vulnerabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "NamespaceName")]
    pub namespace_name: String,
    #[serde(rename = "VersionFormat")]
    pub version_format: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "AddedBy")]
    pub added_by: String,
    #[serde(rename = "Vulnerabilities")]
    pub vulnerabilities: Vec<RawVulnerability>,
}

/// A vulnerability as reported by the engine, metadata still opaque.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawVulnerability {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "NamespaceName")]
    pub namespace_name: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Link")]
    pub link: String,
    #[serde(rename = "Severity")]
    pub severity: String,
    #[serde(rename = "FixedBy")]
    pub fixed_by: String,
    /// Opaque blob; may carry CVSS scoring and/or advisory entries
    #[serde(rename = "Metadata", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Box<RawValue>>,
}

/// Decoded metadata blob. Both blocks are independent and optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VulnerabilityMetadata {
    #[serde(rename = "NVD")]
    pub nvd: NvdMetadata,
    #[serde(rename = "CNVD")]
    pub cnvd: Vec<AdvisoryMetadata>,
}

/// Numeric-vector scoring block, two format versions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NvdMetadata {
    #[serde(rename = "CVSSv2")]
    pub cvss_v2: CvssV2Metadata,
    #[serde(rename = "CVSSv3")]
    pub cvss_v3: CvssV3Metadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CvssV2Metadata {
    #[serde(rename = "PublishedDateTime")]
    pub published: String,
    #[serde(rename = "Vectors")]
    pub vectors: String,
    #[serde(rename = "Score")]
    pub score: Option<Number>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CvssV3Metadata {
    #[serde(rename = "Vectors")]
    pub vectors: String,
    #[serde(rename = "Score")]
    pub score: Option<Number>,
    #[serde(rename = "ExploitabilityScore")]
    pub exploitability_score: Option<Number>,
    #[serde(rename = "ImpactScore")]
    pub impact_score: Option<Number>,
}

/// Localized advisory entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdvisoryMetadata {
    #[serde(rename = "cnvdNumber")]
    pub number: String,
    #[serde(rename = "title")]
    pub title: String,
    #[serde(rename = "severity")]
    pub severity: String,
    #[serde(rename = "referenceLink")]
    pub reference_link: String,
    // the engine emits this key misspelled; match it as-is
    #[serde(rename = "desription")]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_payload_shape() {
        let envelope = LayerEnvelope {
            layer: Some(LayerDescriptor {
                name: "sha256:abc".to_string(),
                path: "http://10.0.0.1:5566/sha256:abc/layer.tar".to_string(),
                parent_name: String::new(),
                format: LAYER_FORMAT.to_string(),
                ..Default::default()
            }),
            error: None,
        };
        let value = serde_json::to_value(&envelope).unwrap();
        let layer = &value["Layer"];
        assert_eq!(layer["Name"], "sha256:abc");
        assert_eq!(layer["Format"], "Docker");
        // base layer still declares an (empty) parent on the wire
        assert_eq!(layer["ParentName"], "");
        assert!(value.get("Error").is_none());
    }

    #[test]
    fn test_metadata_decodes_both_blocks() {
        let blob = r#"{
            "NVD": {
                "CVSSv2": {"PublishedDateTime": "2020-03-23T16:15Z", "Vectors": "AV:N/AC:M/Au:N/C:C/I:C/A:C", "Score": 9.3},
                "CVSSv3": {"Vectors": "CVSS:3.0/AV:N/AC:L/PR:N/UI:R/S:U/C:H/I:H/A:H", "Score": 8.8, "ExploitabilityScore": 2.8, "ImpactScore": 5.9}
            },
            "CNVD": [{
                "cnvdNumber": "CNVD-2020-19198",
                "title": "example advisory",
                "severity": "high",
                "referenceLink": "https://example.com/advisory",
                "desription": "free-text description"
            }]
        }"#;
        let metadata: VulnerabilityMetadata = serde_json::from_str(blob).unwrap();
        assert_eq!(metadata.nvd.cvss_v2.vectors, "AV:N/AC:M/Au:N/C:C/I:C/A:C");
        assert_eq!(metadata.nvd.cvss_v3.score.unwrap().to_string(), "8.8");
        assert_eq!(metadata.cnvd.len(), 1);
        assert_eq!(metadata.cnvd[0].number, "CNVD-2020-19198");
        assert_eq!(metadata.cnvd[0].description, "free-text description");
    }

    #[test]
    fn test_metadata_blocks_are_independent() {
        let only_nvd: VulnerabilityMetadata =
            serde_json::from_str(r#"{"NVD": {"CVSSv2": {"Score": 7.5}}}"#).unwrap();
        assert_eq!(only_nvd.nvd.cvss_v2.score.unwrap().to_string(), "7.5");
        assert!(only_nvd.cnvd.is_empty());

        let only_cnvd: VulnerabilityMetadata =
            serde_json::from_str(r#"{"CNVD": [{"cnvdNumber": "CNVD-1"}]}"#).unwrap();
        assert!(only_cnvd.nvd.cvss_v2.score.is_none());
        assert_eq!(only_cnvd.cnvd[0].number, "CNVD-1");

        let empty: VulnerabilityMetadata = serde_json::from_str("{}").unwrap();
        assert!(empty.nvd.cvss_v3.vectors.is_empty());
    }

    #[test]
    fn test_result_envelope_with_error() {
        let body = r#"{"Error": {"Message": "the resource cannot be found"}}"#;
        let envelope: LayerEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.layer.is_none());
        assert_eq!(
            envelope.error.unwrap().message,
            "the resource cannot be found"
        );
    }
}
