//! HTTP API for the anomaly dashboard, health checks and Prometheus metrics

use crate::error::ApiError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use std::time::Instant;
use telemetry_lib::{
    anomaly::{recent_anomalies, DashboardAnomaly, RuleDetector},
    health::HealthRegistry,
    observability::{DetectorMetrics, StructuredLogger},
    BatchSource, DetectorError,
};
use tracing::info;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Detector label used in metrics and logs
const RULES_DETECTOR: &str = "rules";

/// Shared application state
pub struct AppState {
    pub source: Arc<dyn BatchSource>,
    pub detector: RuleDetector,
    pub window: Duration,
    pub health_registry: HealthRegistry,
    pub metrics: DetectorMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        source: Arc<dyn BatchSource>,
        detector: RuleDetector,
        window: Duration,
        health_registry: HealthRegistry,
    ) -> Self {
        Self {
            source,
            detector,
            window,
            health_registry,
            metrics: DetectorMetrics::new(),
            logger: StructuredLogger::new("netpulse-dashboard"),
        }
    }

    /// Reload the batch, classify it and keep anomalies inside the window
    pub fn current_anomalies(&self, now: DateTime<Utc>) -> Result<Vec<DashboardAnomaly>, DetectorError> {
        let start = Instant::now();

        let result = self.source.load().and_then(|batch| {
            let annotated = self.detector.classify(&batch)?;
            Ok((batch.len(), annotated))
        });

        let (records, annotated) = match result {
            Ok(ok) => ok,
            Err(err) => {
                self.metrics.inc_errors(err.kind());
                if let DetectorError::SourceUnavailable(msg) = &err {
                    self.logger.log_source_unavailable(&self.source.describe(), msg);
                }
                return Err(err);
            }
        };

        let flagged = annotated.iter().filter(|a| a.predicted_anomaly).count();
        let recent = recent_anomalies(&annotated, now, self.window);
        let elapsed = start.elapsed();

        self.metrics
            .observe_pass(RULES_DETECTOR, elapsed.as_secs_f64(), records, flagged);
        self.metrics.set_recent_anomalies(recent.len());
        self.logger.log_classification(
            RULES_DETECTOR,
            records,
            flagged,
            recent.len(),
            elapsed.as_millis(),
        );

        Ok(recent.iter().map(DashboardAnomaly::from).collect())
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Recent rule-based anomalies, newest first
async fn anomalies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DashboardAnomaly>>, ApiError> {
    let worker = state.clone();
    let result = tokio::task::spawn_blocking(move || worker.current_anomalies(Utc::now()))
        .await
        .map_err(|e| ApiError::Internal(format!("classification task failed: {}", e)))?;

    state
        .health_registry
        .record_pass(result.as_ref().map(|_| ()))
        .await;

    Ok(Json(result?))
}

fn probe_status(ok: bool) -> StatusCode {
    if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Liveness: 503 only while a component is unhealthy, degraded still serves
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    (probe_status(health.status.is_operational()), Json(health))
}

/// Readiness: 503 until startup finished or while the data source is down
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    (probe_status(readiness.ready), Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ApiError::Internal(format!("failed to encode metrics: {}", e)))?;

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    ))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/anomalies", get(anomalies))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting dashboard server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
