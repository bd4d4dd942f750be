//! NetPulse dashboard service
//!
//! Serves the recent rule-based anomalies of a CSV telemetry batch over
//! HTTP, together with health probes and Prometheus metrics.

pub mod api;
pub mod config;
pub mod error;

pub use api::{create_router, serve, AppState};
pub use config::DashboardConfig;
pub use error::ApiError;
