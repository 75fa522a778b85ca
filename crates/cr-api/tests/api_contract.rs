//! HTTP contract tests against an engine loaded from artifact files.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use cr_api::{ApiServer, AppState};
use cr_core::{ArtifactPaths, DecisionPolicy, EngineSettings, ScoringEngine};
use cr_observability::DecisionAuditor;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct Deployment {
    _dir: TempDir,
    runtime_prior: PathBuf,
    app: Router,
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn deploy() -> Deployment {
    let dir = TempDir::new().unwrap();
    let model = write(
        &dir,
        "model.json",
        r#"{"version": "lr-contract", "feature_names": ["income", "tenure"],
            "intercept": -3.0, "coefficients": [0.8, -0.4]}"#,
    );
    let schema = write(
        &dir,
        "feature_schema.json",
        r#"{"names": ["income", "tenure", "app_id"], "id_col": "app_id", "version": "s-1"}"#,
    );
    let train = write(&dir, "metrics.json", r#"{"default_rate_train": 0.08}"#);
    let runtime_prior = write(&dir, "runtime_prior.json", r#"{"target_prevalence": 0.08}"#);

    let paths = ArtifactPaths {
        model,
        schema,
        train_prior: Some(train),
        runtime_prior: Some(runtime_prior.clone()),
    };
    let engine =
        ScoringEngine::load(&paths, EngineSettings::default(), DecisionPolicy::default()).unwrap();
    let state = AppState::new(Arc::new(engine)).with_auditor(DecisionAuditor::disabled());

    Deployment {
        _dir: dir,
        runtime_prior,
        app: ApiServer::with_state(state).router(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn score_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/score")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_score_at_training_means() {
    let deployment = deploy();

    let (status, json) = send(
        &deployment.app,
        score_request(json!({ "features": { "income": 0, "tenure": 0, "app_id": 991 } })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let raw = 1.0 / (1.0 + 3f64.exp());
    assert!((json["pd_raw"].as_f64().unwrap() - raw).abs() < 1e-12);
    // Equal train and runtime priors leave the PD untouched.
    assert_eq!(json["pd_adjusted"], json["pd_raw"]);
    assert_eq!(json["score"], 600);
    assert_eq!(json["decision"], "reject");
    assert_eq!(json["audit"]["model_version"], "lr-contract");
    assert_eq!(json["audit"]["schema_version"], "s-1");
    assert!(json["attributions"]
        .as_array()
        .unwrap()
        .iter()
        .all(|a| a["feature"] != "app_id"));
}

#[tokio::test]
async fn test_runtime_prior_change_applies_without_restart() {
    let deployment = deploy();
    let body = json!({ "features": { "income": 1.5, "tenure": 4 } });

    let (_, before) = send(&deployment.app, score_request(body.clone())).await;
    std::fs::write(&deployment.runtime_prior, r#"{"target_prevalence": 0.02}"#).unwrap();
    let (_, after) = send(&deployment.app, score_request(body)).await;

    assert_eq!(before["pd_raw"], after["pd_raw"]);
    assert!(after["pd_adjusted"].as_f64().unwrap() < after["pd_raw"].as_f64().unwrap());
    assert_eq!(after["prior_shift"]["applied"], true);
    assert_eq!(after["prior_shift"]["pi_target"], 0.02);
    assert!(after["score"].as_i64().unwrap() > before["score"].as_i64().unwrap());

    let (status, report) = send(&deployment.app, get("/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["runtime_prior"], 0.02);
    assert_eq!(report["train_prior"], 0.08);
}

#[tokio::test]
async fn test_status_reports_removed_identifier() {
    let deployment = deploy();

    let (_, report) = send(&deployment.app, get("/status")).await;

    assert_eq!(report["status"], "healthy");
    assert_eq!(report["features"], json!(["income", "tenure"]));
    assert_eq!(report["removed_features"], json!(["app_id"]));
    assert_eq!(report["schema_relation"], "equal");
}

#[tokio::test]
async fn test_unreadable_runtime_prior_falls_back_to_raw_pd() {
    let deployment = deploy();
    std::fs::write(&deployment.runtime_prior, "{ broken").unwrap();

    let (status, json) = send(
        &deployment.app,
        score_request(json!({ "features": { "income": 2.0 } })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pd_adjusted"], json["pd_raw"]);
    assert_eq!(json["prior_shift"]["skipped"], "no_target_prior");
    assert_eq!(json["missing_features"], json!(["tenure"]));
}

#[tokio::test]
async fn test_health_endpoints() {
    let deployment = deploy();

    let (status, health) = send(&deployment.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["feature_count"], 2);

    let (status, _) = send(&deployment.app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
}
