//! Isolation forest training and scoring

use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use telemetry_lib::anomaly::imputation_counts;
use telemetry_lib::artifact::{load_model, save_model};
use telemetry_lib::{
    classify_statistical, feature_schema, AnnotatedRecord, StructuredLogger,
};

use super::{label_agreement, load_batch};
use crate::output::{format_percent, print_info, print_rows, print_success, print_warning, OutputFormat, ScoreRow};

fn report_imputation(logger: &StructuredLogger, annotated: &[AnnotatedRecord], format: OutputFormat) {
    for (feature, count) in imputation_counts(annotated) {
        logger.log_imputation(feature.name(), count);
        if let OutputFormat::Table = format {
            print_warning(&format!("{} missing {} values replaced by the batch mean", count, feature));
        }
    }
}

/// Fit a model over the data file and save it
pub fn train(path: &Path, contamination: f64, seed: u64, model_path: &Path, format: OutputFormat) -> Result<()> {
    let batch = load_batch(path)?;
    let (annotated, model) = classify_statistical(&batch, contamination, seed)
        .context("Failed to fit isolation forest")?;
    save_model(&model, model_path)
        .with_context(|| format!("Failed to save model to {}", model_path.display()))?;

    let flagged = annotated.iter().filter(|a| a.predicted_anomaly).count();
    let logger = StructuredLogger::new("netpulse-cli");
    logger.log_model_trained(annotated.len(), flagged, contamination, seed);
    report_imputation(&logger, &annotated, format);

    match format {
        OutputFormat::Json => {
            let imputed: serde_json::Map<String, serde_json::Value> = imputation_counts(&annotated)
                .into_iter()
                .map(|(feature, count)| (feature.name().to_string(), json!(count)))
                .collect();
            let summary = json!({
                "model": model_path.display().to_string(),
                "records": annotated.len(),
                "flagged": flagged,
                "contamination": contamination,
                "seed": seed,
                "offset": model.offset(),
                "imputed": imputed,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Table => {
            print_success(&format!(
                "Fitted isolation forest on {} records, saved to {}",
                annotated.len(),
                model_path.display()
            ));
            print_info(&format!(
                "{} records flagged as outliers (contamination {}, seed {})",
                flagged, contamination, seed
            ));
            if let Some(agreement) = label_agreement(&annotated) {
                print_info(&format!("Agreement with anomaly_flag: {}", format_percent(agreement)));
            }
        }
    }

    Ok(())
}

/// Score the data file with a previously saved model
pub fn score(path: &Path, model_path: &Path, all: bool, format: OutputFormat) -> Result<()> {
    let model = load_model(model_path, &feature_schema())
        .with_context(|| format!("Failed to load model from {}", model_path.display()))?;
    let batch = load_batch(path)?;
    let annotated = model.score(&batch).context("Failed to score batch")?;

    let logger = StructuredLogger::new("netpulse-cli");
    report_imputation(&logger, &annotated, format);

    let flagged = annotated.iter().filter(|a| a.predicted_anomaly).count();
    let shown: Vec<AnnotatedRecord> = annotated
        .iter()
        .filter(|a| all || a.predicted_anomaly)
        .cloned()
        .collect();
    let rows: Vec<ScoreRow> = shown.iter().map(ScoreRow::from).collect();
    print_rows(&shown, rows, format, "No outliers found");

    if let OutputFormat::Table = format {
        print_info(&format!("{} of {} records scored as outliers", flagged, annotated.len()));
    }

    Ok(())
}
