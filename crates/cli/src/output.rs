//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use telemetry_lib::anomaly::CRITICAL_LOW_THROUGHPUT;
use telemetry_lib::{AnnotatedRecord, DashboardAnomaly, Feature};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Row for anomaly tables
#[derive(Tabled)]
pub struct AnomalyRow {
    #[tabled(rename = "Timestamp")]
    pub timestamp: String,
    #[tabled(rename = "Location")]
    pub location: String,
    #[tabled(rename = "Network")]
    pub network: String,
    #[tabled(rename = "Signal (dBm)")]
    pub signal: String,
    #[tabled(rename = "Latency (ms)")]
    pub latency: String,
    #[tabled(rename = "Throughput (Mbps)")]
    pub throughput: String,
    #[tabled(rename = "Loss (%)")]
    pub packet_loss: String,
    #[tabled(rename = "Reason")]
    pub reason: String,
}

impl From<&DashboardAnomaly> for AnomalyRow {
    fn from(a: &DashboardAnomaly) -> Self {
        Self {
            timestamp: a.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            location: a.location_id.clone(),
            network: a.network_type.clone(),
            signal: format_metric(a.signal_strength_dbm, 1),
            latency: format_metric(a.latency_ms, 1),
            throughput: format_metric(a.throughput_mbps, 1),
            packet_loss: format_metric(a.packet_loss_percent, 2),
            reason: color_reason(&a.anomaly_reason),
        }
    }
}

impl From<&AnnotatedRecord> for AnomalyRow {
    fn from(a: &AnnotatedRecord) -> Self {
        Self::from(&DashboardAnomaly::from(a))
    }
}

/// Row for statistical detector output
#[derive(Tabled)]
pub struct ScoreRow {
    #[tabled(rename = "Timestamp")]
    pub timestamp: String,
    #[tabled(rename = "Location")]
    pub location: String,
    #[tabled(rename = "Signal (dBm)")]
    pub signal: String,
    #[tabled(rename = "Latency (ms)")]
    pub latency: String,
    #[tabled(rename = "Throughput (Mbps)")]
    pub throughput: String,
    #[tabled(rename = "Loss (%)")]
    pub packet_loss: String,
    #[tabled(rename = "Score")]
    pub score: String,
    #[tabled(rename = "Imputed")]
    pub imputed: String,
}

impl From<&AnnotatedRecord> for ScoreRow {
    fn from(a: &AnnotatedRecord) -> Self {
        let r = &a.record;
        Self {
            timestamp: r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            location: r.location_id.clone(),
            signal: format_metric(r.signal_strength_dbm, 1),
            latency: format_metric(r.latency_ms, 1),
            throughput: format_metric(r.throughput_mbps, 1),
            packet_loss: format_metric(r.packet_loss_percent, 2),
            score: color_score(a.anomaly_score),
            imputed: format_imputed(&a.imputed_features),
        }
    }
}

/// Print rows as a table, or the serializable items as JSON
pub fn print_rows<T: Serialize, R: Tabled>(items: &[T], rows: Vec<R>, format: OutputFormat, empty: &str) {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                print_warning(empty);
                return;
            }
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => match serde_json::to_string_pretty(items) {
            Ok(json) => println!("{}", json),
            Err(e) => print_error(&format!("Failed to serialize output: {}", e)),
        },
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format an optional measurement, `-` when missing
pub fn format_metric(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "-".to_string(),
    }
}

pub fn format_imputed(features: &[Feature]) -> String {
    if features.is_empty() {
        return String::new();
    }
    features
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format a ratio as percentage
pub fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Critical reasons in red, corroborated ones in yellow
pub fn color_reason(reason: &str) -> String {
    if reason == CRITICAL_LOW_THROUGHPUT {
        reason.red().bold().to_string()
    } else {
        reason.yellow().to_string()
    }
}

/// Negative decision values are outliers
pub fn color_score(score: Option<f64>) -> String {
    match score {
        Some(s) if s < 0.0 => format!("{:.4}", s).red().to_string(),
        Some(s) => format!("{:.4}", s).green().to_string(),
        None => "-".to_string(),
    }
}
