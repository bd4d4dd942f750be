//! Telemetry library for network performance anomaly detection
//!
//! This crate provides the core functionality for:
//! - Telemetry record schema and CSV persistence
//! - Rule-based and isolation-forest anomaly classification
//! - Recent-anomaly queries for the dashboard
//! - Synthetic data generation and anomaly injection
//! - Health checks and observability

pub mod anomaly;
pub mod artifact;
pub mod error;
pub mod generator;
pub mod health;
pub mod models;
pub mod observability;
pub mod store;

pub use anomaly::{
    classify_rules, classify_statistical, recent_anomalies, DashboardAnomaly, Rule,
    RuleDetector, RuleThresholds, StatisticalModel,
};
pub use error::{DetectorError, Result};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{DetectorMetrics, StructuredLogger};
pub use store::{BatchSource, CsvStore};
