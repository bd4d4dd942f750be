//! Anomaly classification for network telemetry batches
//!
//! This module provides:
//! - Rule-based detection (two-of-four threshold corroboration)
//! - Statistical detection with an isolation forest
//! - Recency filtering of annotated batches for the dashboard
//!
//! The two detectors are independent strategies over the same input and
//! never call each other.

mod isolation_forest;
mod recency;
mod rules;
mod statistical;

pub use isolation_forest::{average_path_length, IsolationForest, IsolationNode, IsolationTree};
pub use recency::{recent_anomalies, DashboardAnomaly, DEFAULT_WINDOW_MINUTES};
pub use rules::{classify_rules, Rule, RuleDetector, RuleThresholds, CRITICAL_LOW_THROUGHPUT};
pub use statistical::{
    classify_statistical, imputation_counts, StatisticalModel, DEFAULT_CONTAMINATION, DEFAULT_SEED,
};
