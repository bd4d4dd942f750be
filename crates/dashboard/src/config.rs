//! Dashboard configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use telemetry_lib::anomaly::{RuleThresholds, DEFAULT_WINDOW_MINUTES};

/// Dashboard configuration
///
/// Read from an optional `netpulse.toml` and from `DASHBOARD__*`
/// environment variables, e.g. `DASHBOARD__PORT=8080` or
/// `DASHBOARD__THRESHOLDS__HIGH_LATENCY_MS=150`.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// CSV file holding the telemetry batch
    #[serde(default = "default_data_path")]
    pub data_path: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Trailing window of the anomalies route, in minutes
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,

    /// Generate an initial batch when the data file is missing
    #[serde(default = "default_generate_if_missing")]
    pub generate_if_missing: bool,

    #[serde(default = "default_initial_records")]
    pub initial_records: usize,

    #[serde(default = "default_initial_locations")]
    pub initial_locations: usize,

    /// Rule detector thresholds
    #[serde(default)]
    pub thresholds: RuleThresholds,
}

fn default_data_path() -> String {
    "network_performance_data.csv".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_window_minutes() -> i64 {
    DEFAULT_WINDOW_MINUTES
}

fn default_generate_if_missing() -> bool {
    true
}

fn default_initial_records() -> usize {
    5000
}

fn default_initial_locations() -> usize {
    20
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            port: default_port(),
            window_minutes: default_window_minutes(),
            generate_if_missing: default_generate_if_missing(),
            initial_records: default_initial_records(),
            initial_locations: default_initial_locations(),
            thresholds: RuleThresholds::default(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from config file and environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("netpulse").required(false))
            .add_source(
                config::Environment::with_prefix("DASHBOARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read dashboard configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Invalid dashboard configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.window_minutes <= 0 {
            anyhow::bail!("window_minutes must be positive, got {}", self.window_minutes);
        }
        self.window()?;
        Ok(())
    }

    pub fn window(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_minutes(self.window_minutes)
            .with_context(|| format!("window_minutes {} is out of range", self.window_minutes))
    }
}
