//! Data file commands: synthetic generation and anomaly injection

use anyhow::{Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::path::Path;
use telemetry_lib::generator::{generate_batch, injected_anomaly, known_locations, GeneratorConfig};
use telemetry_lib::{BatchSource, CsvStore, StructuredLogger};

use super::load_batch;
use crate::output::{format_metric, print_info, print_success, OutputFormat};

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Generate a synthetic batch and overwrite the data file with it
pub fn generate(
    path: &Path,
    records: usize,
    locations: usize,
    anomaly_rate: f64,
    seed: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    if !(0.0..=1.0).contains(&anomaly_rate) {
        anyhow::bail!("anomaly rate must be within [0, 1], got {}", anomaly_rate);
    }
    if locations == 0 {
        anyhow::bail!("at least one location is required");
    }

    let config = GeneratorConfig {
        num_records: records,
        num_locations: locations,
        anomaly_rate,
        ..Default::default()
    };
    let batch = generate_batch(&config, Utc::now(), &mut rng_for(seed));

    CsvStore::new(path)
        .write_all(&batch)
        .with_context(|| format!("Failed to write telemetry to {}", path.display()))?;

    let logger = StructuredLogger::new("netpulse-cli");
    logger.log_generated(&path.display().to_string(), batch.len(), locations);

    let labelled = batch
        .iter()
        .filter(|r| r.anomaly_flag == Some(true))
        .count();

    match format {
        OutputFormat::Json => {
            let summary = json!({
                "path": path.display().to_string(),
                "records": batch.len(),
                "locations": locations,
                "labelled_anomalies": labelled,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Table => {
            print_success(&format!(
                "Wrote {} records for {} locations to {}",
                batch.len(),
                locations,
                path.display()
            ));
            print_info(&format!("{} records carry an injected degradation", labelled));
        }
    }

    Ok(())
}

/// Append one anomalous record at a location already present in the batch
pub fn inject(path: &Path, seed: Option<u64>, format: OutputFormat) -> Result<()> {
    let batch = load_batch(path)?;
    let locations = known_locations(&batch);

    let record = injected_anomaly(&locations, Utc::now(), &mut rng_for(seed))
        .context("Cannot inject an anomaly into an empty batch")?;

    CsvStore::new(path)
        .append(&record)
        .with_context(|| format!("Failed to append to {}", path.display()))?;

    let logger = StructuredLogger::new("netpulse-cli");
    logger.log_injection(&record.location_id, &record.timestamp.to_rfc3339());

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Table => {
            print_success(&format!(
                "Injected anomaly at {} ({}) for {}",
                record.location_id,
                record.network_type,
                record.timestamp.format("%Y-%m-%d %H:%M:%S")
            ));
            print_info(&format!(
                "signal {} dBm, latency {} ms, throughput {} Mbps, loss {}%",
                format_metric(record.signal_strength_dbm, 1),
                format_metric(record.latency_ms, 1),
                format_metric(record.throughput_mbps, 1),
                format_metric(record.packet_loss_percent, 2)
            ));
        }
    }

    Ok(())
}
