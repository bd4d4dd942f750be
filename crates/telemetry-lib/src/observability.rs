//! Observability infrastructure for NetPulse
//!
//! Provides:
//! - Prometheus metrics (classification latency, batch size, anomalies, source errors)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, register_int_gauge_vec,
    HistogramVec, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for classification passes (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DetectorMetricsInner> = OnceLock::new();

struct DetectorMetricsInner {
    classification_latency_seconds: HistogramVec,
    records_classified: IntGaugeVec,
    anomalies_flagged: IntGaugeVec,
    recent_anomalies: IntGauge,
    classification_errors: IntCounterVec,
}

impl DetectorMetricsInner {
    fn new() -> Self {
        Self {
            classification_latency_seconds: register_histogram_vec!(
                "netpulse_classification_latency_seconds",
                "Time spent classifying a full telemetry batch",
                &["detector"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register classification_latency_seconds"),

            records_classified: register_int_gauge_vec!(
                "netpulse_records_classified",
                "Number of records in the last classified batch",
                &["detector"]
            )
            .expect("Failed to register records_classified"),

            anomalies_flagged: register_int_gauge_vec!(
                "netpulse_anomalies_flagged",
                "Number of records flagged anomalous in the last batch",
                &["detector"]
            )
            .expect("Failed to register anomalies_flagged"),

            recent_anomalies: register_int_gauge!(
                "netpulse_recent_anomalies",
                "Number of anomalies inside the dashboard window"
            )
            .expect("Failed to register recent_anomalies"),

            classification_errors: register_int_counter_vec!(
                "netpulse_classification_errors_total",
                "Classification passes that failed, by error kind",
                &["kind"]
            )
            .expect("Failed to register classification_errors"),
        }
    }
}

/// Detector metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct DetectorMetrics {
    _private: (),
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DetectorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record the outcome of a successful classification pass
    pub fn observe_pass(&self, detector: &str, duration_secs: f64, records: usize, flagged: usize) {
        let inner = self.inner();
        inner
            .classification_latency_seconds
            .with_label_values(&[detector])
            .observe(duration_secs);
        inner
            .records_classified
            .with_label_values(&[detector])
            .set(records as i64);
        inner
            .anomalies_flagged
            .with_label_values(&[detector])
            .set(flagged as i64);
    }

    pub fn set_recent_anomalies(&self, count: usize) {
        self.inner().recent_anomalies.set(count as i64);
    }

    pub fn inc_errors(&self, kind: &str) {
        self.inner()
            .classification_errors
            .with_label_values(&[kind])
            .inc();
    }
}

/// Structured logger for dashboard and tooling events
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, data_path: &str) {
        info!(
            event = "dashboard_started",
            service = %self.service,
            version = %version,
            data_path = %data_path,
            "NetPulse dashboard started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "dashboard_shutdown",
            service = %self.service,
            reason = %reason,
            "NetPulse dashboard shutting down"
        );
    }

    /// Log a completed classification pass
    pub fn log_classification(
        &self,
        detector: &str,
        records: usize,
        flagged: usize,
        recent: usize,
        elapsed_ms: u128,
    ) {
        info!(
            event = "batch_classified",
            service = %self.service,
            detector = %detector,
            records = records,
            flagged = flagged,
            recent = recent,
            elapsed_ms = elapsed_ms as u64,
            "Classified telemetry batch"
        );
    }

    pub fn log_source_unavailable(&self, path: &str, error: &str) {
        warn!(
            event = "source_unavailable",
            service = %self.service,
            path = %path,
            error = %error,
            "Telemetry batch could not be loaded"
        );
    }

    pub fn log_generated(&self, path: &str, records: usize, locations: usize) {
        info!(
            event = "batch_generated",
            service = %self.service,
            path = %path,
            records = records,
            locations = locations,
            "Generated synthetic telemetry batch"
        );
    }

    pub fn log_injection(&self, location_id: &str, timestamp: &str) {
        info!(
            event = "anomaly_injected",
            service = %self.service,
            location_id = %location_id,
            timestamp = %timestamp,
            "Injected anomalous record"
        );
    }

    pub fn log_model_trained(&self, records: usize, flagged: usize, contamination: f64, seed: u64) {
        info!(
            event = "model_trained",
            service = %self.service,
            records = records,
            flagged = flagged,
            contamination = contamination,
            seed = seed,
            "Isolation forest fitted"
        );
    }

    pub fn log_imputation(&self, feature: &str, count: usize) {
        warn!(
            event = "values_imputed",
            service = %self.service,
            feature = %feature,
            count = count,
            "Missing values replaced by batch mean"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_metrics_creation() {
        let metrics = DetectorMetrics::new();

        metrics.observe_pass("rules", 0.002, 100, 4);
        metrics.set_recent_anomalies(2);
        metrics.inc_errors("source_unavailable");

        // A second handle shares the registration
        DetectorMetrics::new().observe_pass("isolation_forest", 0.01, 10, 1);
    }

    #[test]
    fn test_registered_families_are_dashboard_metrics() {
        DetectorMetrics::new().inc_errors("empty_batch");

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .filter(|name| name.starts_with("netpulse_"))
            .collect();
        for expected in [
            "netpulse_classification_errors_total",
            "netpulse_recent_anomalies",
        ] {
            assert!(names.iter().any(|n| n == expected), "{:?}", names);
        }
        assert!(names.iter().all(|n| !n.contains("imputed")), "{:?}", names);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-dashboard");
        assert_eq!(logger.service, "test-dashboard");
    }
}
