//! NetPulse CLI
//!
//! A command-line tool for generating telemetry, injecting anomalies,
//! running the detectors over a CSV batch and querying a running dashboard.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{data, detect, model};
use std::path::PathBuf;
use telemetry_lib::anomaly::{
    RuleThresholds, DEFAULT_CONTAMINATION, DEFAULT_SEED, DEFAULT_WINDOW_MINUTES,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// NetPulse network anomaly CLI
#[derive(Parser)]
#[command(name = "netpulse")]
#[command(author, version, about = "CLI for NetPulse network anomaly detection", long_about = None)]
pub struct Cli {
    /// Telemetry CSV file (can also be set via NETPULSE_DATA env var)
    #[arg(long, env = "NETPULSE_DATA", default_value = "network_performance_data.csv")]
    pub data: PathBuf,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a synthetic telemetry batch and write it to the data file
    Generate {
        /// Number of records
        #[arg(long, default_value_t = 1000)]
        records: usize,

        /// Number of distinct locations
        #[arg(long, default_value_t = 10)]
        locations: usize,

        /// Share of records carrying an anomaly
        #[arg(long, default_value_t = 0.05)]
        anomaly_rate: f64,

        /// Seed for reproducible batches
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Append one clearly anomalous record close to now
    Inject {
        /// Seed for a reproducible record
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Classify the batch with the threshold rules
    Rules {
        /// Show every record, not only anomalies
        #[arg(long)]
        all: bool,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },

    /// Fit the isolation forest on the batch and save the model
    Train {
        /// Expected share of outliers, in (0, 0.5]
        #[arg(long, default_value_t = DEFAULT_CONTAMINATION)]
        contamination: f64,

        /// Random seed
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Model artifact path
        #[arg(long, short, default_value = "netpulse-model.json")]
        model: PathBuf,
    },

    /// Score the batch with a saved model
    Score {
        /// Model artifact path
        #[arg(long, short, default_value = "netpulse-model.json")]
        model: PathBuf,

        /// Show every record, not only outliers
        #[arg(long)]
        all: bool,
    },

    /// Show recent rule-based anomalies from the data file
    Recent {
        /// Trailing window in minutes
        #[arg(long, default_value_t = DEFAULT_WINDOW_MINUTES)]
        window: i64,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },

    /// Fetch recent anomalies from a running dashboard
    Remote {
        /// Dashboard URL (can also be set via NETPULSE_API_URL env var)
        #[arg(long, env = "NETPULSE_API_URL", default_value = "http://localhost:5000")]
        api_url: String,
    },
}

/// Rule threshold overrides
#[derive(Args, Debug, Clone)]
pub struct ThresholdArgs {
    /// Low Signal fires below this strength (dBm)
    #[arg(long)]
    pub low_signal: Option<f64>,

    /// High Latency fires above this latency (ms)
    #[arg(long)]
    pub high_latency: Option<f64>,

    /// Low Throughput fires below this throughput (Mbps)
    #[arg(long)]
    pub low_throughput: Option<f64>,

    /// High Packet Loss fires above this loss (%)
    #[arg(long)]
    pub high_packet_loss: Option<f64>,

    /// A single rule is critical when throughput is below this (Mbps)
    #[arg(long)]
    pub critical_throughput: Option<f64>,
}

impl ThresholdArgs {
    pub fn resolve(&self) -> RuleThresholds {
        let defaults = RuleThresholds::default();
        RuleThresholds {
            low_signal_dbm: self.low_signal.unwrap_or(defaults.low_signal_dbm),
            high_latency_ms: self.high_latency.unwrap_or(defaults.high_latency_ms),
            low_throughput_mbps: self.low_throughput.unwrap_or(defaults.low_throughput_mbps),
            high_packet_loss_percent: self
                .high_packet_loss
                .unwrap_or(defaults.high_packet_loss_percent),
            critical_throughput_mbps: self
                .critical_throughput
                .unwrap_or(defaults.critical_throughput_mbps),
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Generate {
            records,
            locations,
            anomaly_rate,
            seed,
        } => {
            data::generate(&cli.data, records, locations, anomaly_rate, seed, cli.format)?;
        }
        Commands::Inject { seed } => {
            data::inject(&cli.data, seed, cli.format)?;
        }
        Commands::Rules { all, thresholds } => {
            detect::rules(&cli.data, thresholds.resolve(), all, cli.format)?;
        }
        Commands::Train {
            contamination,
            seed,
            model: model_path,
        } => {
            model::train(&cli.data, contamination, seed, &model_path, cli.format)?;
        }
        Commands::Score {
            model: model_path,
            all,
        } => {
            model::score(&cli.data, &model_path, all, cli.format)?;
        }
        Commands::Recent { window, thresholds } => {
            detect::recent(&cli.data, thresholds.resolve(), window, cli.format)?;
        }
        Commands::Remote { api_url } => {
            let client = client::ApiClient::new(&api_url)?;
            detect::remote(&client, cli.format).await?;
        }
    }

    Ok(())
}
