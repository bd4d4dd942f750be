//! Rule-based anomaly detection
//!
//! Evaluates four fixed threshold rules per record and requires two of
//! them to fire before declaring an anomaly. A single breach is only
//! reported when throughput has collapsed below the critical level.

use crate::error::{DetectorError, Result};
use crate::models::{AnnotatedRecord, TelemetryRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason reported for a single breach with collapsed throughput
pub const CRITICAL_LOW_THROUGHPUT: &str = "Critical Low Throughput";

/// Default signal threshold in dBm (fires below)
const DEFAULT_LOW_SIGNAL_DBM: f64 = -85.0;

/// Default latency threshold in ms (fires above)
const DEFAULT_HIGH_LATENCY_MS: f64 = 100.0;

/// Default throughput threshold in Mbps (fires below)
const DEFAULT_LOW_THROUGHPUT_MBPS: f64 = 40.0;

/// Default packet loss threshold in percent (fires above)
const DEFAULT_HIGH_PACKET_LOSS_PERCENT: f64 = 3.0;

/// Throughput below which a single breach is still an anomaly
const DEFAULT_CRITICAL_THROUGHPUT_MBPS: f64 = 10.0;

/// Number of rules that must fire together
const DEFAULT_MIN_CORROBORATING_RULES: usize = 2;

/// Threshold rules, in evaluation and report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rule {
    #[serde(rename = "Low Signal")]
    LowSignal,
    #[serde(rename = "High Latency")]
    HighLatency,
    #[serde(rename = "Low Throughput")]
    LowThroughput,
    #[serde(rename = "High Packet Loss")]
    HighPacketLoss,
}

impl Rule {
    pub const ALL: [Rule; 4] = [
        Rule::LowSignal,
        Rule::HighLatency,
        Rule::LowThroughput,
        Rule::HighPacketLoss,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Rule::LowSignal => "Low Signal",
            Rule::HighLatency => "High Latency",
            Rule::LowThroughput => "Low Throughput",
            Rule::HighPacketLoss => "High Packet Loss",
        }
    }

    /// Column the rule reads
    pub fn field(&self) -> &'static str {
        match self {
            Rule::LowSignal => "signal_strength_dbm",
            Rule::HighLatency => "latency_ms",
            Rule::LowThroughput => "throughput_mbps",
            Rule::HighPacketLoss => "packet_loss_percent",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tunable thresholds for the rule detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    pub low_signal_dbm: f64,
    pub high_latency_ms: f64,
    pub low_throughput_mbps: f64,
    pub high_packet_loss_percent: f64,
    pub critical_throughput_mbps: f64,
    pub min_corroborating_rules: usize,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            low_signal_dbm: DEFAULT_LOW_SIGNAL_DBM,
            high_latency_ms: DEFAULT_HIGH_LATENCY_MS,
            low_throughput_mbps: DEFAULT_LOW_THROUGHPUT_MBPS,
            high_packet_loss_percent: DEFAULT_HIGH_PACKET_LOSS_PERCENT,
            critical_throughput_mbps: DEFAULT_CRITICAL_THROUGHPUT_MBPS,
            min_corroborating_rules: DEFAULT_MIN_CORROBORATING_RULES,
        }
    }
}

/// Validated link measurements of one record
#[derive(Debug, Clone, Copy)]
struct LinkMetrics {
    signal_strength_dbm: f64,
    latency_ms: f64,
    throughput_mbps: f64,
    packet_loss_percent: f64,
}

impl LinkMetrics {
    fn from_record(index: usize, record: &TelemetryRecord) -> Result<Self> {
        let require = |value: Option<f64>, field: &'static str| {
            value
                .filter(|v| v.is_finite())
                .ok_or(DetectorError::InvalidRecord { index, field })
        };

        Ok(Self {
            signal_strength_dbm: require(record.signal_strength_dbm, Rule::LowSignal.field())?,
            latency_ms: require(record.latency_ms, Rule::HighLatency.field())?,
            throughput_mbps: require(record.throughput_mbps, Rule::LowThroughput.field())?,
            packet_loss_percent: require(record.packet_loss_percent, Rule::HighPacketLoss.field())?,
        })
    }
}

/// Stateless threshold detector
#[derive(Debug, Clone, Default)]
pub struct RuleDetector {
    thresholds: RuleThresholds,
}

impl RuleDetector {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    /// Annotate every record of the batch
    ///
    /// Fails on the first record with a missing or non-finite measurement;
    /// no partial result is returned.
    pub fn classify(&self, batch: &[TelemetryRecord]) -> Result<Vec<AnnotatedRecord>> {
        batch
            .iter()
            .enumerate()
            .map(|(index, record)| self.classify_record(index, record))
            .collect()
    }

    fn classify_record(&self, index: usize, record: &TelemetryRecord) -> Result<AnnotatedRecord> {
        let metrics = LinkMetrics::from_record(index, record)?;
        let triggered = self.triggered_rules(&metrics);

        let anomaly_reason = if triggered.len() >= self.thresholds.min_corroborating_rules {
            triggered
                .iter()
                .map(Rule::name)
                .collect::<Vec<_>>()
                .join(", ")
        } else if triggered.len() == 1
            && metrics.throughput_mbps < self.thresholds.critical_throughput_mbps
        {
            CRITICAL_LOW_THROUGHPUT.to_string()
        } else {
            String::new()
        };

        Ok(AnnotatedRecord {
            record: record.clone(),
            predicted_anomaly: !anomaly_reason.is_empty(),
            triggered_rules: triggered,
            anomaly_reason,
            anomaly_score: None,
            imputed_features: Vec::new(),
        })
    }

    fn triggered_rules(&self, m: &LinkMetrics) -> Vec<Rule> {
        let t = &self.thresholds;
        Rule::ALL
            .into_iter()
            .filter(|rule| match rule {
                Rule::LowSignal => m.signal_strength_dbm < t.low_signal_dbm,
                Rule::HighLatency => m.latency_ms > t.high_latency_ms,
                Rule::LowThroughput => m.throughput_mbps < t.low_throughput_mbps,
                Rule::HighPacketLoss => m.packet_loss_percent > t.high_packet_loss_percent,
            })
            .collect()
    }
}

/// Classify a batch with the default thresholds
pub fn classify_rules(batch: &[TelemetryRecord]) -> Result<Vec<AnnotatedRecord>> {
    RuleDetector::default().classify(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn record(signal: f64, latency: f64, throughput: f64, loss: f64) -> TelemetryRecord {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        TelemetryRecord::new(ts, "Loc_1", "5G_FWA")
            .with_metrics(signal, latency, throughput, loss)
            .with_device_count(40)
    }

    fn classify_one(r: TelemetryRecord) -> AnnotatedRecord {
        classify_rules(&[r]).unwrap().remove(0)
    }

    #[test]
    fn test_single_low_signal_is_ignored() {
        let out = classify_one(record(-90.0, 20.0, 200.0, 0.5));
        assert_eq!(out.triggered_rules, vec![Rule::LowSignal]);
        assert!(!out.predicted_anomaly);
        assert_eq!(out.anomaly_reason, "");
    }

    #[test]
    fn test_two_rules_corroborate() {
        let out = classify_one(record(-90.0, 150.0, 200.0, 0.5));
        assert!(out.predicted_anomaly);
        assert_eq!(out.anomaly_reason, "Low Signal, High Latency");
    }

    #[test]
    fn test_critical_low_throughput_overrides_reason() {
        let out = classify_one(record(-70.0, 20.0, 5.0, 0.5));
        assert_eq!(out.triggered_rules, vec![Rule::LowThroughput]);
        assert!(out.predicted_anomaly);
        assert_eq!(out.anomaly_reason, CRITICAL_LOW_THROUGHPUT);
    }

    #[test]
    fn test_all_rules_in_fixed_order() {
        let out = classify_one(record(-95.0, 300.0, 3.0, 12.0));
        assert!(out.predicted_anomaly);
        assert_eq!(
            out.anomaly_reason,
            "Low Signal, High Latency, Low Throughput, High Packet Loss"
        );
    }

    #[test]
    fn test_thresholds_are_strict() {
        // Exactly on every threshold: nothing fires
        let out = classify_one(record(-85.0, 100.0, 40.0, 3.0));
        assert!(out.triggered_rules.is_empty());
        assert!(!out.predicted_anomaly);
    }

    #[test]
    fn test_missing_measurement_fails_whole_batch() {
        let mut bad = record(-70.0, 20.0, 200.0, 0.5);
        bad.latency_ms = None;
        let batch = vec![record(-95.0, 300.0, 3.0, 12.0), bad];

        match classify_rules(&batch) {
            Err(DetectorError::InvalidRecord { index, field }) => {
                assert_eq!(index, 1);
                assert_eq!(field, "latency_ms");
            }
            other => panic!("expected InvalidRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_measurement_is_invalid() {
        let bad = record(-70.0, 20.0, f64::NAN, 0.5);
        assert!(matches!(
            classify_rules(&[bad]),
            Err(DetectorError::InvalidRecord { field: "throughput_mbps", .. })
        ));
    }

    #[test]
    fn test_configured_thresholds() {
        let detector = RuleDetector::new(RuleThresholds {
            low_signal_dbm: -60.0,
            min_corroborating_rules: 1,
            ..Default::default()
        });
        let out = detector.classify(&[record(-70.0, 20.0, 200.0, 0.5)]).unwrap();
        assert!(out[0].predicted_anomaly);
        assert_eq!(out[0].anomaly_reason, "Low Signal");
    }

    #[test]
    fn test_empty_batch_is_empty_result() {
        assert!(classify_rules(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_input_is_preserved() {
        let r = record(-90.0, 150.0, 200.0, 0.5).with_anomaly_flag(true);
        let out = classify_one(r.clone());
        assert_eq!(out.record, r);
    }

    proptest! {
        #[test]
        fn prop_verdict_follows_corroboration_policy(
            signal in -110.0f64..-40.0,
            latency in 0.0f64..600.0,
            throughput in 0.0f64..600.0,
            loss in 0.0f64..30.0,
        ) {
            let out = classify_one(record(signal, latency, throughput, loss));

            let mut expected = Vec::new();
            if signal < -85.0 { expected.push("Low Signal"); }
            if latency > 100.0 { expected.push("High Latency"); }
            if throughput < 40.0 { expected.push("Low Throughput"); }
            if loss > 3.0 { expected.push("High Packet Loss"); }

            let names: Vec<_> = out.triggered_rules.iter().map(Rule::name).collect();
            prop_assert_eq!(&names, &expected);

            if expected.len() >= 2 {
                prop_assert!(out.predicted_anomaly);
                prop_assert_eq!(out.anomaly_reason, expected.join(", "));
            } else if expected.len() == 1 && throughput < 10.0 {
                prop_assert!(out.predicted_anomaly);
                prop_assert_eq!(out.anomaly_reason, CRITICAL_LOW_THROUGHPUT);
            } else {
                prop_assert!(!out.predicted_anomaly);
                prop_assert_eq!(out.anomaly_reason, "");
            }
        }
    }
}
