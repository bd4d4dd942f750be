//! Integration tests for the dashboard API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use dashboard::{create_router, AppState};
use std::path::Path;
use std::sync::Arc;
use telemetry_lib::{
    health::{Component, HealthRegistry},
    CsvStore, RuleDetector, TelemetryRecord,
};
use tempfile::TempDir;
use tower::ServiceExt;

fn record(minutes_ago: i64, location: &str, metrics: (f64, f64, f64, f64)) -> TelemetryRecord {
    let (signal, latency, throughput, loss) = metrics;
    TelemetryRecord::new(Utc::now() - Duration::minutes(minutes_ago), location, "5G_FWA")
        .with_metrics(signal, latency, throughput, loss)
        .with_device_count(42)
}

const NORMAL: (f64, f64, f64, f64) = (-70.0, 30.0, 200.0, 0.5);
const TWO_RULES: (f64, f64, f64, f64) = (-90.0, 150.0, 200.0, 0.5);
const CRITICAL: (f64, f64, f64, f64) = (-70.0, 30.0, 5.0, 0.5);

async fn setup_app(data_path: &Path) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    for component in Component::ALL {
        health_registry.register(component).await;
    }
    health_registry.set_ready(true).await;

    let state = Arc::new(AppState::new(
        Arc::new(CsvStore::new(data_path)),
        RuleDetector::default(),
        Duration::minutes(120),
        health_registry,
    ));
    (create_router(state.clone()), state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_anomalies_newest_first_within_window() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("telemetry.csv");
    CsvStore::new(&path)
        .write_all(&[
            record(90, "Loc_1", TWO_RULES),
            record(10, "Loc_2", CRITICAL),
            record(5, "Loc_3", NORMAL),
            record(600, "Loc_4", TWO_RULES),
        ])
        .unwrap();

    let (app, _state) = setup_app(&path).await;
    let (status, body) = get(app, "/anomalies").await;

    assert_eq!(status, StatusCode::OK);
    let anomalies: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(anomalies.len(), 2);
    assert_eq!(anomalies[0]["location_id"], "Loc_2");
    assert_eq!(anomalies[0]["anomaly_reason"], "Critical Low Throughput");
    assert_eq!(anomalies[1]["location_id"], "Loc_1");
    assert_eq!(anomalies[1]["anomaly_reason"], "Low Signal, High Latency");
    assert_eq!(anomalies[1]["network_type"], "5G_FWA");
}

#[tokio::test]
async fn test_anomalies_empty_list_when_nothing_recent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("telemetry.csv");
    CsvStore::new(&path)
        .write_all(&[record(5, "Loc_1", NORMAL), record(500, "Loc_2", CRITICAL)])
        .unwrap();

    let (app, _state) = setup_app(&path).await;
    let (status, body) = get(app, "/anomalies").await;

    assert_eq!(status, StatusCode::OK);
    let anomalies: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert!(anomalies.is_empty());
}

#[tokio::test]
async fn test_anomalies_reflect_appended_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("telemetry.csv");
    let store = CsvStore::new(&path);
    store.write_all(&[record(5, "Loc_1", NORMAL)]).unwrap();

    let (app, _state) = setup_app(&path).await;
    let (_, body) = get(app.clone(), "/anomalies").await;
    let before: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert!(before.is_empty());

    use telemetry_lib::BatchSource;
    store.append(&record(1, "Loc_1", CRITICAL)).unwrap();

    let (_, body) = get(app, "/anomalies").await;
    let after: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(after.len(), 1);
}

#[tokio::test]
async fn test_missing_source_returns_503_and_marks_unhealthy() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.csv");

    let (app, _state) = setup_app(&path).await;
    let (status, body) = get(app.clone(), "/anomalies").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["status"], 503);

    let (status, body) = get(app.clone(), "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
    assert_eq!(health["components"]["data_source"]["status"], "unhealthy");
    assert_eq!(health["components"]["data_source"]["consecutive_failures"], 1);

    let (status, _) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_invalid_record_returns_422() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("telemetry.csv");
    let now = Utc::now().format("%Y-%m-%d %H:%M:%S");
    std::fs::write(
        &path,
        format!(
            "timestamp,location_id,device_count,signal_strength_dbm,latency_ms,throughput_mbps,packet_loss_percent,network_type,anomaly_flag\n\
             {now},Loc_1,10,-70.0,30.0,200.0,0.5,LTE,0\n\
             {now},Loc_2,10,,30.0,200.0,0.5,LTE,0\n"
        ),
    )
    .unwrap();

    let (app, _state) = setup_app(&path).await;
    let (status, body) = get(app.clone(), "/anomalies").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let message = error["error"].as_str().unwrap();
    assert!(message.contains("signal_strength_dbm"), "{}", message);

    // A rejected batch degrades the detector but the service stays up
    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_health_recovers_after_successful_pass() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("telemetry.csv");

    let (app, _state) = setup_app(&path).await;
    let (status, _) = get(app.clone(), "/anomalies").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    CsvStore::new(&path)
        .write_all(&[record(5, "Loc_1", NORMAL)])
        .unwrap();
    let (status, _) = get(app.clone(), "/anomalies").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let dir = TempDir::new().unwrap();
    let health_registry = HealthRegistry::new();
    let state = Arc::new(AppState::new(
        Arc::new(CsvStore::new(dir.path().join("telemetry.csv"))),
        RuleDetector::default(),
        Duration::minutes(120),
        health_registry,
    ));

    let (status, body) = get(create_router(state), "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_index_serves_dashboard_page() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_app(&dir.path().join("telemetry.csv")).await;

    let (status, body) = get(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("/anomalies"));
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("telemetry.csv");
    CsvStore::new(&path)
        .write_all(&[record(5, "Loc_1", CRITICAL)])
        .unwrap();

    let (app, _state) = setup_app(&path).await;
    let _ = get(app.clone(), "/anomalies").await;
    let (status, body) = get(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("netpulse_records_classified"));
    assert!(text.contains("netpulse_recent_anomalies"));
}

#[test]
fn test_current_anomalies_uses_given_clock() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("telemetry.csv");
    CsvStore::new(&path)
        .write_all(&[record(300, "Loc_1", TWO_RULES)])
        .unwrap();

    let state = AppState::new(
        Arc::new(CsvStore::new(&path)),
        RuleDetector::default(),
        Duration::minutes(120),
        HealthRegistry::new(),
    );

    assert!(state.current_anomalies(Utc::now()).unwrap().is_empty());
    let earlier = Utc::now() - Duration::minutes(240);
    assert_eq!(state.current_anomalies(earlier).unwrap().len(), 1);
}
