//! Recent anomaly query backing the dashboard

use crate::models::AnnotatedRecord;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Trailing window shown on the dashboard
pub const DEFAULT_WINDOW_MINUTES: i64 = 120;

/// Anomalous records newer than `now - window`, newest first
///
/// The sort is stable, so records sharing a timestamp keep their batch
/// order. An empty result is a valid answer. A window reaching past the
/// earliest representable time has no lower bound.
pub fn recent_anomalies(
    annotated: &[AnnotatedRecord],
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<AnnotatedRecord> {
    let cutoff = now.checked_sub_signed(window);
    let mut recent: Vec<AnnotatedRecord> = annotated
        .iter()
        .filter(|a| a.predicted_anomaly && cutoff.map_or(true, |c| a.timestamp() > c))
        .cloned()
        .collect();
    recent.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    recent
}

/// Dashboard projection of an anomalous record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardAnomaly {
    pub timestamp: DateTime<Utc>,
    pub location_id: String,
    pub network_type: String,
    pub signal_strength_dbm: Option<f64>,
    pub latency_ms: Option<f64>,
    pub throughput_mbps: Option<f64>,
    pub packet_loss_percent: Option<f64>,
    pub anomaly_reason: String,
}

impl From<&AnnotatedRecord> for DashboardAnomaly {
    fn from(annotated: &AnnotatedRecord) -> Self {
        let r = &annotated.record;
        Self {
            timestamp: r.timestamp,
            location_id: r.location_id.clone(),
            network_type: r.network_type.clone(),
            signal_strength_dbm: r.signal_strength_dbm,
            latency_ms: r.latency_ms,
            throughput_mbps: r.throughput_mbps,
            packet_loss_percent: r.packet_loss_percent,
            anomaly_reason: annotated.anomaly_reason.clone(),
        }
    }
}
