//! Synthetic telemetry generation and anomaly injection
//!
//! Produces batches with plausible baseline link quality and a small
//! share of single-metric degradations labelled with `anomaly_flag`.

use crate::error::{DetectorError, Result};
use crate::models::{NetworkType, TelemetryRecord};
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

/// Default share of generated records carrying an anomaly
pub const DEFAULT_ANOMALY_RATE: f64 = 0.05;

/// How far around `now` injected anomalies are placed, in minutes
const INJECTION_JITTER_MINUTES: i64 = 5;

/// Configuration for batch generation
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub num_records: usize,
    pub num_locations: usize,
    pub anomaly_rate: f64,
    /// Trailing period the timestamps are spread over
    pub span: Duration,
    pub location_prefix: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_records: 1000,
            num_locations: 10,
            anomaly_rate: DEFAULT_ANOMALY_RATE,
            span: Duration::days(7),
            location_prefix: "Loc".to_string(),
        }
    }
}

/// Kind of degradation applied to a generated record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyKind {
    SignalDrop,
    LatencySpike,
    ThroughputDip,
    PacketLossSurge,
}

impl AnomalyKind {
    pub const ALL: [AnomalyKind; 4] = [
        AnomalyKind::SignalDrop,
        AnomalyKind::LatencySpike,
        AnomalyKind::ThroughputDip,
        AnomalyKind::PacketLossSurge,
    ];
}

/// Location identifiers `"{prefix}_1"` .. `"{prefix}_n"`
pub fn location_ids(config: &GeneratorConfig) -> Vec<String> {
    (1..=config.num_locations)
        .map(|i| format!("{}_{}", config.location_prefix, i))
        .collect()
}

/// Generate a batch of records spread over `config.span` before `now`
pub fn generate_batch<R: Rng + ?Sized>(
    config: &GeneratorConfig,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<TelemetryRecord> {
    let locations = location_ids(config);
    let start = now - config.span;
    let span_minutes = config.span.num_minutes().max(0);

    (0..config.num_records)
        .map(|_| {
            let timestamp = start + Duration::minutes(rng.gen_range(0..=span_minutes));
            let location = locations
                .choose(rng)
                .cloned()
                .unwrap_or_else(|| format!("{}_1", config.location_prefix));
            let network = NetworkType::ALL[rng.gen_range(0..NetworkType::ALL.len())];

            let mut signal = rng.gen_range(-80.0..-60.0);
            let mut latency = rng.gen_range(10.0..50.0);
            let mut throughput = rng.gen_range(50.0..500.0);
            let mut packet_loss = rng.gen_range(0.1..1.0);
            let device_count = rng.gen_range(10..=100);

            let anomalous = rng.gen_bool(config.anomaly_rate.clamp(0.0, 1.0));
            if anomalous {
                match AnomalyKind::ALL[rng.gen_range(0..AnomalyKind::ALL.len())] {
                    AnomalyKind::SignalDrop => signal = rng.gen_range(-100.0..-85.0),
                    AnomalyKind::LatencySpike => latency = rng.gen_range(100.0..500.0),
                    AnomalyKind::ThroughputDip => throughput = rng.gen_range(5.0..40.0),
                    AnomalyKind::PacketLossSurge => packet_loss = rng.gen_range(5.0..20.0),
                }
            }

            TelemetryRecord::new(timestamp, location, network.as_str())
                .with_metrics(signal, latency, throughput, packet_loss)
                .with_device_count(device_count)
                .with_anomaly_flag(anomalous)
        })
        .collect()
}

/// Build a clearly anomalous record close to `now` at a known location
///
/// Every link metric is degraded at once, so the rule detector always
/// flags it.
pub fn injected_anomaly<R: Rng + ?Sized>(
    locations: &[String],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<TelemetryRecord> {
    let location = locations.choose(rng).cloned().ok_or_else(|| {
        DetectorError::SourceUnavailable("no known locations to inject into".to_string())
    })?;
    let offset = rng.gen_range(-INJECTION_JITTER_MINUTES..=INJECTION_JITTER_MINUTES);
    let network = NetworkType::FIVE_G[rng.gen_range(0..NetworkType::FIVE_G.len())];

    Ok(TelemetryRecord::new(now + Duration::minutes(offset), location, network.as_str())
        .with_metrics(
            rng.gen_range(-100.0..-90.0),
            rng.gen_range(200.0..500.0),
            rng.gen_range(1.0..10.0),
            rng.gen_range(10.0..30.0),
        )
        .with_device_count(rng.gen_range(50..=150))
        .with_anomaly_flag(true))
}

/// Distinct location ids of a batch in first-seen order
pub fn known_locations(batch: &[TelemetryRecord]) -> Vec<String> {
    let mut seen = Vec::new();
    for record in batch {
        if !seen.contains(&record.location_id) {
            seen.push(record.location_id.clone());
        }
    }
    seen
}
