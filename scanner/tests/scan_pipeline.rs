//! End-to-end pipeline tests against mock registry and scan engine servers.
//!
//! Covers the chain protocol: bottom-up submission order, parent chaining
//! across submission failures, and the top-layer-only aggregate fetch.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tempfile::TempDir;

use clairscan::clair::api::{EngineError, Feature, LayerDescriptor, LayerEnvelope};
use clairscan::{ImageScanner, ScanPhase, StagingArea};
use clairscan_core::config::ScanConfig;
use clairscan_core::error::ScanError;

const FEATURES_JSON: &str = r#"[
    {
        "Name": "openssl",
        "Version": "1.1.1",
        "Vulnerabilities": [{
            "Name": "CVE-X",
            "NamespaceName": "debian:11",
            "Severity": "High",
            "Link": "https://cve.example/CVE-X",
            "Metadata": {"NVD": {"CVSSv2": {"Vectors": "AV:N/AC:L", "Score": 7.5}}}
        }]
    },
    {
        "Name": "libc",
        "Version": "2.31",
        "Vulnerabilities": [{
            "Name": "CVE-X",
            "NamespaceName": "debian:11",
            "Severity": "High",
            "Link": "https://cve.example/CVE-X"
        }]
    }
]"#;

/// Recording mock of the scan engine.
#[derive(Default)]
struct Engine {
    /// (layer name, declared parent) per accepted submission
    submissions: Mutex<Vec<(String, String)>>,
    /// Staged-layer URLs the submissions referenced
    paths: Mutex<Vec<String>>,
    /// Layer names queried for results
    queries: Mutex<Vec<String>>,
    /// Reject this layer's submission with HTTP 500
    fail_digest: Option<String>,
    /// Respond to result queries with an embedded engine error
    fail_result: bool,
}

async fn post_layer(
    State(engine): State<Arc<Engine>>,
    Json(envelope): Json<LayerEnvelope>,
) -> impl IntoResponse {
    let layer = envelope.layer.expect("submission must carry a layer");
    if engine.fail_digest.as_deref() == Some(layer.name.as_str()) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    engine
        .submissions
        .lock()
        .unwrap()
        .push((layer.name, layer.parent_name));
    engine.paths.lock().unwrap().push(layer.path);
    StatusCode::CREATED.into_response()
}

async fn get_layer(
    State(engine): State<Arc<Engine>>,
    Path(digest): Path<String>,
) -> Json<LayerEnvelope> {
    engine.queries.lock().unwrap().push(digest.clone());
    if engine.fail_result {
        return Json(LayerEnvelope {
            layer: None,
            error: Some(EngineError {
                message: "the layer doesn't exist".to_string(),
            }),
        });
    }
    let features: Vec<Feature> = serde_json::from_str(FEATURES_JSON).unwrap();
    Json(LayerEnvelope {
        layer: Some(LayerDescriptor {
            name: digest,
            namespace_name: "debian:11".to_string(),
            features,
            ..Default::default()
        }),
        error: None,
    })
}

fn spawn_engine(engine: Arc<Engine>) -> SocketAddr {
    let app = Router::new()
        .route("/v1/layers", post(post_layer))
        .route("/v1/layers/:digest", get(get_layer))
        .with_state(engine);
    spawn_server(app)
}

fn spawn_registry(manifest: &'static str) -> SocketAddr {
    let app = Router::new()
        .route(
            "/v2/library/app/manifests/:reference",
            get(move || async move {
                ([("docker-content-digest", "sha256:mdigest")], manifest)
            }),
        )
        .route(
            "/v2/library/app/blobs/:digest",
            get(|Path(digest): Path<String>| async move { format!("blob-{digest}") }),
        );
    spawn_server(app)
}

fn spawn_server(app: Router) -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service())
            .await
            .unwrap();
    });
    addr
}

fn config(registry: SocketAddr, clair: SocketAddr) -> ScanConfig {
    ScanConfig {
        clair_addr: "127.0.0.1".to_string(),
        clair_port: clair.port(),
        registry_url: format!("http://{registry}"),
        repository: "library".to_string(),
        image: "app".to_string(),
        tag: "latest".to_string(),
        external_ip: Some("127.0.0.1".to_string()),
        staging_port: 0,
        timeout: 30,
        ..Default::default()
    }
}

const THREE_LAYER_MANIFEST: &str = r#"{
    "schemaVersion": 2,
    "layers": [
        {"digest": "sha256:l1"},
        {"digest": "sha256:l2"},
        {"digest": "sha256:l3"}
    ]
}"#;

#[tokio::test]
async fn test_full_pipeline_chain_order_and_aggregate() {
    let registry = spawn_registry(THREE_LAYER_MANIFEST);
    let engine = Arc::new(Engine::default());
    let clair = spawn_engine(engine.clone());

    let staging = TempDir::new().unwrap();
    let mut scanner = ImageScanner::new(config(registry, clair))
        .unwrap()
        .with_staging_area(StagingArea::new(staging.path()));
    let report = scanner.run().await.unwrap();
    assert_eq!(scanner.phase(), ScanPhase::Done);

    // Bottom-up submission order, each layer declaring its predecessor
    let submissions = engine.submissions.lock().unwrap().clone();
    assert_eq!(
        submissions,
        vec![
            ("sha256:l1".to_string(), String::new()),
            ("sha256:l2".to_string(), "sha256:l1".to_string()),
            ("sha256:l3".to_string(), "sha256:l2".to_string()),
        ]
    );

    // Only the top layer is queried for the aggregate result
    assert_eq!(*engine.queries.lock().unwrap(), vec!["sha256:l3"]);

    // Every referenced URL points at the staging bridge
    for (i, path) in engine.paths.lock().unwrap().iter().enumerate() {
        assert!(
            path.starts_with("http://127.0.0.1:") && path.ends_with(&format!("/sha256:l{}/layer.tar", i + 1)),
            "unexpected staged URL: {path}"
        );
    }

    // Every layer was staged before submission
    for digest in ["sha256:l1", "sha256:l2", "sha256:l3"] {
        let staged = staging.path().join(digest).join("layer.tar");
        assert_eq!(
            std::fs::read_to_string(&staged).unwrap(),
            format!("blob-{digest}")
        );
    }

    // Shared CVE collapses to one record
    assert_eq!(report.manifest_digest, "sha256:mdigest");
    assert_eq!(report.namespace, "debian:11");
    assert_eq!(report.vulnerabilities.len(), 1);
    assert_eq!(report.vulnerabilities[0].id, "CVE-X");
    assert_eq!(report.tally.count("High"), 1);
    assert_eq!(report.tally.total(), 1);
    assert_eq!(report.sorted_ids(), vec!["CVE-X"]);
}

#[tokio::test]
async fn test_mid_chain_submission_failure_does_not_abort() {
    let registry = spawn_registry(THREE_LAYER_MANIFEST);
    let engine = Arc::new(Engine {
        fail_digest: Some("sha256:l2".to_string()),
        ..Default::default()
    });
    let clair = spawn_engine(engine.clone());

    let staging = TempDir::new().unwrap();
    let mut scanner = ImageScanner::new(config(registry, clair))
        .unwrap()
        .with_staging_area(StagingArea::new(staging.path()));
    let report = scanner.run().await.unwrap();

    // l2 was rejected, but l3 still declared the intended parent l2
    let submissions = engine.submissions.lock().unwrap().clone();
    assert_eq!(
        submissions,
        vec![
            ("sha256:l1".to_string(), String::new()),
            ("sha256:l3".to_string(), "sha256:l2".to_string()),
        ]
    );
    assert_eq!(*engine.queries.lock().unwrap(), vec!["sha256:l3"]);
    assert_eq!(report.tally.total(), 1);
}

#[tokio::test]
async fn test_duplicate_manifest_digest_aborts_before_submission() {
    let registry =
        spawn_registry(r#"{"layers": [{"digest": "sha256:a"}, {"digest": "sha256:a"}]}"#);
    let engine = Arc::new(Engine::default());
    let clair = spawn_engine(engine.clone());

    let staging = TempDir::new().unwrap();
    let mut scanner = ImageScanner::new(config(registry, clair))
        .unwrap()
        .with_staging_area(StagingArea::new(staging.path()));
    let err = scanner.run().await.unwrap_err();

    assert!(matches!(err, ScanError::DuplicateLayer { .. }));
    assert_eq!(scanner.phase(), ScanPhase::Failed);
    assert!(engine.submissions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_result_fetch_is_fatal() {
    let registry = spawn_registry(THREE_LAYER_MANIFEST);
    let engine = Arc::new(Engine {
        fail_result: true,
        ..Default::default()
    });
    let clair = spawn_engine(engine.clone());

    let staging = TempDir::new().unwrap();
    let mut scanner = ImageScanner::new(config(registry, clair))
        .unwrap()
        .with_staging_area(StagingArea::new(staging.path()));
    let err = scanner.run().await.unwrap_err();

    assert!(matches!(err, ScanError::ResultFetch { .. }));
    assert_eq!(scanner.phase(), ScanPhase::Failed);
}

#[tokio::test]
async fn test_run_deadline_aborts_pipeline() {
    let app = Router::new().route(
        "/v2/library/app/manifests/:reference",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            ([("docker-content-digest", "sha256:mdigest")], "{}")
        }),
    );
    let registry = spawn_server(app);
    let engine = Arc::new(Engine::default());
    let clair = spawn_engine(engine.clone());

    let staging = TempDir::new().unwrap();
    let mut cfg = config(registry, clair);
    cfg.timeout = 1;
    let mut scanner = ImageScanner::new(cfg)
        .unwrap()
        .with_staging_area(StagingArea::new(staging.path()));
    let err = scanner.run().await.unwrap_err();

    assert!(matches!(err, ScanError::Timeout(_)));
    assert_eq!(scanner.phase(), ScanPhase::Failed);
}

#[tokio::test]
async fn test_cleanup_removes_staged_files_but_keeps_directories() {
    let registry = spawn_registry(THREE_LAYER_MANIFEST);
    let engine = Arc::new(Engine::default());
    let clair = spawn_engine(engine.clone());

    let staging = TempDir::new().unwrap();
    let mut cfg = config(registry, clair);
    cfg.cleanup = true;
    let mut scanner = ImageScanner::new(cfg)
        .unwrap()
        .with_staging_area(StagingArea::new(staging.path()));
    scanner.run().await.unwrap();

    for digest in ["sha256:l1", "sha256:l2", "sha256:l3"] {
        assert!(!staging.path().join(digest).join("layer.tar").exists());
        assert!(staging.path().join(digest).is_dir());
    }
}
