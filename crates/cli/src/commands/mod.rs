//! CLI command implementations

pub mod data;
pub mod detect;
pub mod model;

use anyhow::{Context, Result};
use std::path::Path;
use telemetry_lib::{AnnotatedRecord, BatchSource, CsvStore, TelemetryRecord};
use tracing::debug;

/// Read the whole batch from a CSV data file
pub(crate) fn load_batch(path: &Path) -> Result<Vec<TelemetryRecord>> {
    let batch = CsvStore::new(path)
        .load()
        .with_context(|| format!("Failed to load telemetry from {}", path.display()))?;
    debug!(path = %path.display(), records = batch.len(), "Loaded telemetry batch");
    Ok(batch)
}

/// Share of labelled records whose prediction matches `anomaly_flag`
///
/// `None` when no record carries a label.
pub(crate) fn label_agreement(annotated: &[AnnotatedRecord]) -> Option<f64> {
    let labelled: Vec<_> = annotated
        .iter()
        .filter_map(|a| a.record.anomaly_flag.map(|flag| flag == a.predicted_anomaly))
        .collect();
    if labelled.is_empty() {
        return None;
    }
    let agreeing = labelled.iter().filter(|ok| **ok).count();
    Some(agreeing as f64 / labelled.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn annotated(flag: Option<bool>, predicted: bool) -> AnnotatedRecord {
        let mut record = TelemetryRecord::new(Utc::now(), "Loc_1", "LTE");
        record.anomaly_flag = flag;
        AnnotatedRecord {
            record,
            predicted_anomaly: predicted,
            triggered_rules: Vec::new(),
            anomaly_reason: String::new(),
            anomaly_score: None,
            imputed_features: Vec::new(),
        }
    }

    #[test]
    fn test_label_agreement_ignores_unlabelled() {
        let batch = vec![
            annotated(Some(true), true),
            annotated(Some(false), true),
            annotated(None, false),
            annotated(Some(false), false),
            annotated(Some(true), false),
        ];
        assert_eq!(label_agreement(&batch), Some(0.5));
    }

    #[test]
    fn test_label_agreement_without_labels() {
        assert_eq!(label_agreement(&[annotated(None, true)]), None);
    }
}
