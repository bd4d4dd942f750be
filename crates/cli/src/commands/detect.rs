//! Rule-based classification and recent anomaly queries

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::path::Path;
use telemetry_lib::{recent_anomalies, AnnotatedRecord, DashboardAnomaly, RuleDetector, RuleThresholds};

use super::{label_agreement, load_batch};
use crate::client::ApiClient;
use crate::output::{format_percent, print_info, print_rows, AnomalyRow, OutputFormat};

fn classify(path: &Path, thresholds: RuleThresholds) -> Result<Vec<AnnotatedRecord>> {
    let batch = load_batch(path)?;
    RuleDetector::new(thresholds)
        .classify(&batch)
        .with_context(|| format!("Failed to classify {}", path.display()))
}

/// Classify the whole batch and print the flagged records
pub fn rules(path: &Path, thresholds: RuleThresholds, all: bool, format: OutputFormat) -> Result<()> {
    let annotated = classify(path, thresholds)?;
    let flagged = annotated.iter().filter(|a| a.predicted_anomaly).count();

    let shown: Vec<AnnotatedRecord> = annotated
        .iter()
        .filter(|a| all || a.predicted_anomaly)
        .cloned()
        .collect();
    let rows: Vec<AnomalyRow> = shown.iter().map(AnomalyRow::from).collect();
    print_rows(&shown, rows, format, "No anomalies found");

    if let OutputFormat::Table = format {
        print_info(&format!(
            "{} of {} records flagged by the threshold rules",
            flagged,
            annotated.len()
        ));
        if let Some(agreement) = label_agreement(&annotated) {
            print_info(&format!("Agreement with anomaly_flag: {}", format_percent(agreement)));
        }
    }

    Ok(())
}

/// Rule-based anomalies inside the trailing window, newest first
pub fn recent(path: &Path, thresholds: RuleThresholds, window: i64, format: OutputFormat) -> Result<()> {
    if window <= 0 {
        anyhow::bail!("window must be a positive number of minutes, got {}", window);
    }
    let span = Duration::try_minutes(window)
        .with_context(|| format!("window of {} minutes is out of range", window))?;

    let annotated = classify(path, thresholds)?;
    let recent: Vec<DashboardAnomaly> =
        recent_anomalies(&annotated, Utc::now(), span)
            .iter()
            .map(DashboardAnomaly::from)
            .collect();

    print_anomalies(&recent, format, window);
    Ok(())
}

/// Recent anomalies as reported by a running dashboard
pub async fn remote(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let anomalies = client
        .anomalies()
        .await
        .context("Failed to fetch anomalies from dashboard")?;
    let rows: Vec<AnomalyRow> = anomalies.iter().map(AnomalyRow::from).collect();
    print_rows(&anomalies, rows, format, "No recent anomalies");
    Ok(())
}

fn print_anomalies(anomalies: &[DashboardAnomaly], format: OutputFormat, window: i64) {
    let rows: Vec<AnomalyRow> = anomalies.iter().map(AnomalyRow::from).collect();
    print_rows(
        anomalies,
        rows,
        format,
        &format!("No anomalies in the last {} minutes", window),
    );
    if let OutputFormat::Table = format {
        if !anomalies.is_empty() {
            println!("\nTotal: {} anomalies", anomalies.len());
        }
    }
}
