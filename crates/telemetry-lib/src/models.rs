//! Core data models for network telemetry

use crate::anomaly::Rule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One network performance observation
///
/// Field order is the persisted column order and must not change.
/// Measurements are optional so that a malformed cell survives ingestion
/// and can be rejected (rule path) or imputed (statistical path) later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Utc>,
    pub location_id: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub device_count: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub signal_strength_dbm: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub latency_ms: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub throughput_mbps: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub packet_loss_percent: Option<f64>,
    pub network_type: String,
    #[serde(with = "flag_format", default)]
    pub anomaly_flag: Option<bool>,
}

impl TelemetryRecord {
    /// Create a record with no measurements yet
    pub fn new(
        timestamp: DateTime<Utc>,
        location_id: impl Into<String>,
        network_type: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            location_id: location_id.into(),
            device_count: None,
            signal_strength_dbm: None,
            latency_ms: None,
            throughput_mbps: None,
            packet_loss_percent: None,
            network_type: network_type.into(),
            anomaly_flag: None,
        }
    }

    /// Set the four link quality measurements
    pub fn with_metrics(
        mut self,
        signal_strength_dbm: f64,
        latency_ms: f64,
        throughput_mbps: f64,
        packet_loss_percent: f64,
    ) -> Self {
        self.signal_strength_dbm = Some(signal_strength_dbm);
        self.latency_ms = Some(latency_ms);
        self.throughput_mbps = Some(throughput_mbps);
        self.packet_loss_percent = Some(packet_loss_percent);
        self
    }

    pub fn with_device_count(mut self, device_count: u32) -> Self {
        self.device_count = Some(device_count);
        self
    }

    pub fn with_anomaly_flag(mut self, flag: bool) -> Self {
        self.anomaly_flag = Some(flag);
        self
    }

    /// Value of a model feature, `None` if missing or non-finite
    pub fn feature(&self, feature: Feature) -> Option<f64> {
        let value = match feature {
            Feature::SignalStrength => self.signal_strength_dbm,
            Feature::Latency => self.latency_ms,
            Feature::Throughput => self.throughput_mbps,
            Feature::PacketLoss => self.packet_loss_percent,
            Feature::DeviceCount => self.device_count.map(f64::from),
        };
        value.filter(|v| v.is_finite())
    }
}

/// Numeric features fed to the statistical detector, in schema order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    #[serde(rename = "signal_strength_dbm")]
    SignalStrength,
    #[serde(rename = "latency_ms")]
    Latency,
    #[serde(rename = "throughput_mbps")]
    Throughput,
    #[serde(rename = "packet_loss_percent")]
    PacketLoss,
    DeviceCount,
}

/// Number of model features
pub const NUM_FEATURES: usize = 5;

impl Feature {
    pub const ALL: [Feature; NUM_FEATURES] = [
        Feature::SignalStrength,
        Feature::Latency,
        Feature::Throughput,
        Feature::PacketLoss,
        Feature::DeviceCount,
    ];

    /// Column name of the feature
    pub fn name(&self) -> &'static str {
        match self {
            Feature::SignalStrength => "signal_strength_dbm",
            Feature::Latency => "latency_ms",
            Feature::Throughput => "throughput_mbps",
            Feature::PacketLoss => "packet_loss_percent",
            Feature::DeviceCount => "device_count",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered feature schema a statistical model is fitted on
pub fn feature_schema() -> Vec<String> {
    Feature::ALL.iter().map(|f| f.name().to_string()).collect()
}

/// Access technologies produced by the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkType {
    #[serde(rename = "5G_FWA")]
    FiveGFwa,
    #[serde(rename = "5G_Mobile")]
    FiveGMobile,
    #[serde(rename = "LTE")]
    Lte,
}

impl NetworkType {
    pub const ALL: [NetworkType; 3] = [
        NetworkType::FiveGFwa,
        NetworkType::FiveGMobile,
        NetworkType::Lte,
    ];

    pub const FIVE_G: [NetworkType; 2] = [NetworkType::FiveGFwa, NetworkType::FiveGMobile];

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::FiveGFwa => "5G_FWA",
            NetworkType::FiveGMobile => "5G_Mobile",
            NetworkType::Lte => "LTE",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A telemetry record together with a detector's verdict
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedRecord {
    #[serde(flatten)]
    pub record: TelemetryRecord,
    pub predicted_anomaly: bool,
    /// Rules that fired, in evaluation order (rule path only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub triggered_rules: Vec<Rule>,
    pub anomaly_reason: String,
    /// Decision value, lower is more anomalous (statistical path only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly_score: Option<f64>,
    /// Features whose value was replaced by the batch mean
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imputed_features: Vec<Feature>,
}

impl AnnotatedRecord {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.record.timestamp
    }
}

/// Timestamps are stored as naive UTC `YYYY-MM-DD HH:MM:SS.ffffff`.
/// RFC 3339 is accepted on read.
pub mod timestamp_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

    const READ_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ];

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&timestamp.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp `{}`", raw)))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        READ_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}

/// Ground-truth flag stored as `0`/`1`; `true`/`false` accepted on read.
/// Unrecognized values read as `None`.
pub mod flag_format {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagRepr {
        Bool(bool),
        Int(i64),
        Float(f64),
        Text(String),
    }

    pub fn serialize<S>(flag: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match flag {
            Some(flag) => serializer.serialize_u8(u8::from(*flag)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = Option::<FlagRepr>::deserialize(deserializer)?;
        Ok(repr.and_then(|repr| match repr {
            FlagRepr::Bool(b) => Some(b),
            FlagRepr::Int(i) => Some(i != 0),
            FlagRepr::Float(f) => Some(f != 0.0),
            FlagRepr::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => Some(true),
                "0" | "false" => Some(false),
                _ => None,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_feature_ignores_non_finite_values() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = TelemetryRecord::new(ts, "Loc_1", "LTE")
            .with_metrics(f64::NAN, 20.0, f64::INFINITY, 0.5)
            .with_device_count(12);

        assert_eq!(record.feature(Feature::SignalStrength), None);
        assert_eq!(record.feature(Feature::Latency), Some(20.0));
        assert_eq!(record.feature(Feature::Throughput), None);
        assert_eq!(record.feature(Feature::DeviceCount), Some(12.0));
    }

    #[test]
    fn test_feature_schema_order() {
        assert_eq!(
            feature_schema(),
            vec![
                "signal_strength_dbm",
                "latency_ms",
                "throughput_mbps",
                "packet_loss_percent",
                "device_count"
            ]
        );
    }

    #[test]
    fn test_timestamp_parse_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 15).unwrap();
        assert_eq!(
            timestamp_format::parse("2024-05-01 12:30:15"),
            Some(expected)
        );
        assert_eq!(
            timestamp_format::parse("2024-05-01T12:30:15Z"),
            Some(expected)
        );
        assert!(timestamp_format::parse("2024-05-01 12:30:15.250000").is_some());
        assert!(timestamp_format::parse("yesterday").is_none());
    }

    #[test]
    fn test_network_type_names() {
        let names: Vec<_> = NetworkType::ALL.iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["5G_FWA", "5G_Mobile", "LTE"]);
    }
}
