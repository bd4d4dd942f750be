//! NetPulse dashboard - serves recent network anomalies over HTTP

use anyhow::{Context, Result};
use chrono::Utc;
use dashboard::{api, DashboardConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use telemetry_lib::{
    generator::{generate_batch, GeneratorConfig},
    health::{Component, HealthRegistry},
    observability::StructuredLogger,
    CsvStore, RuleDetector,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DASHBOARD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting netpulse-dashboard");

    let config = DashboardConfig::load()?;
    info!(
        data_path = %config.data_path,
        port = config.port,
        window_minutes = config.window_minutes,
        "Dashboard configured"
    );

    let logger = StructuredLogger::new("netpulse-dashboard");
    logger.log_startup(DASHBOARD_VERSION, &config.data_path);

    let store = CsvStore::new(&config.data_path);
    if !store.exists() && config.generate_if_missing {
        let generator = GeneratorConfig {
            num_records: config.initial_records,
            num_locations: config.initial_locations,
            ..Default::default()
        };
        let mut rng = StdRng::from_entropy();
        let batch = generate_batch(&generator, Utc::now(), &mut rng);
        store
            .write_all(&batch)
            .with_context(|| format!("Failed to write initial batch to {}", config.data_path))?;
        logger.log_generated(&config.data_path, batch.len(), generator.num_locations);
    }

    let health_registry = HealthRegistry::new();
    for component in Component::ALL {
        health_registry.register(component).await;
    }

    let app_state = Arc::new(api::AppState::new(
        Arc::new(store),
        RuleDetector::new(config.thresholds.clone()),
        config.window()?,
        health_registry.clone(),
    ));

    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.port, app_state));

    tokio::select! {
        result = api_handle => {
            result.context("Dashboard server task panicked")??;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
