//! Statistical outlier detection
//!
//! Fits an isolation forest over the numeric features of a whole batch
//! and labels the expected `contamination` fraction as outliers. The
//! fitted model is kept so later batches can be scored without refitting.

use super::isolation_forest::{percentile, IsolationForest};
use crate::error::{DetectorError, Result};
use crate::models::{feature_schema, AnnotatedRecord, Feature, TelemetryRecord, NUM_FEATURES};
use serde::{Deserialize, Serialize};

/// Expected outlier fraction when none is configured
pub const DEFAULT_CONTAMINATION: f64 = 0.05;

/// Seed used for reproducible fits
pub const DEFAULT_SEED: u64 = 42;

/// Upper bound for contamination
const MAX_CONTAMINATION: f64 = 0.5;

/// Mean updated one value at a time, finite for any finite input
fn running_mean(values: &[f64]) -> f64 {
    values
        .iter()
        .enumerate()
        .fold(0.0, |mean, (i, v)| mean + (v - mean) / (i + 1) as f64)
}

/// Dense feature matrix built from a batch
struct FeatureMatrix {
    rows: Vec<Vec<f64>>,
    imputed: Vec<Vec<Feature>>,
    means: Vec<f64>,
}

impl FeatureMatrix {
    /// Build rows in schema order, filling gaps with the column mean
    ///
    /// A column with no usable value takes its mean from `fallback`, or
    /// fails with `InvalidRecord` when there is none.
    fn build(batch: &[TelemetryRecord], fallback: Option<&[f64]>) -> Result<Self> {
        let mut means = Vec::with_capacity(NUM_FEATURES);
        for (col, feature) in Feature::ALL.iter().enumerate() {
            let present: Vec<f64> = batch.iter().filter_map(|r| r.feature(*feature)).collect();
            let mean = if present.is_empty() {
                fallback
                    .and_then(|m| m.get(col).copied())
                    .ok_or(DetectorError::InvalidRecord {
                        index: 0,
                        field: feature.name(),
                    })?
            } else {
                running_mean(&present)
            };
            means.push(mean);
        }

        let mut rows = Vec::with_capacity(batch.len());
        let mut imputed = Vec::with_capacity(batch.len());
        for record in batch {
            let mut row = Vec::with_capacity(NUM_FEATURES);
            let mut filled = Vec::new();
            for (col, feature) in Feature::ALL.iter().enumerate() {
                match record.feature(*feature) {
                    Some(v) => row.push(v),
                    None => {
                        row.push(means[col]);
                        filled.push(*feature);
                    }
                }
            }
            rows.push(row);
            imputed.push(filled);
        }

        Ok(Self {
            rows,
            imputed,
            means,
        })
    }
}

/// Fitted isolation forest with its calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalModel {
    forest: IsolationForest,
    feature_schema: Vec<String>,
    contamination: f64,
    /// Raw score at the contamination percentile of the training batch
    offset: f64,
    /// Training means, used when a scored batch lacks a whole column
    feature_means: Vec<f64>,
}

impl StatisticalModel {
    /// Fit a model over the whole batch
    pub fn fit(batch: &[TelemetryRecord], contamination: f64, seed: u64) -> Result<Self> {
        Self::fit_annotated(batch, contamination, seed).map(|(model, _)| model)
    }

    fn fit_annotated(
        batch: &[TelemetryRecord],
        contamination: f64,
        seed: u64,
    ) -> Result<(Self, Vec<AnnotatedRecord>)> {
        if batch.is_empty() {
            return Err(DetectorError::EmptyBatch);
        }
        if !(contamination > 0.0 && contamination <= MAX_CONTAMINATION) {
            return Err(DetectorError::InvalidContamination(contamination));
        }

        let matrix = FeatureMatrix::build(batch, None)?;
        let mut forest = IsolationForest::new(seed);
        forest.fit(&matrix.rows);

        let raw = forest.score_samples(&matrix.rows);
        let offset = percentile(&raw, contamination * 100.0);

        let model = Self {
            forest,
            feature_schema: feature_schema(),
            contamination,
            offset,
            feature_means: matrix.means.clone(),
        };
        let annotated = model.annotate(batch, matrix, &raw);
        Ok((model, annotated))
    }

    /// Score a new batch against this model without refitting
    pub fn score(&self, batch: &[TelemetryRecord]) -> Result<Vec<AnnotatedRecord>> {
        if self.feature_schema != feature_schema() {
            return Err(DetectorError::IncompatibleModel(format!(
                "model fitted on {:?}, expected {:?}",
                self.feature_schema,
                feature_schema()
            )));
        }
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let matrix = FeatureMatrix::build(batch, Some(&self.feature_means))?;
        let raw = self.forest.score_samples(&matrix.rows);
        Ok(self.annotate(batch, matrix, &raw))
    }

    fn annotate(
        &self,
        batch: &[TelemetryRecord],
        matrix: FeatureMatrix,
        raw: &[f64],
    ) -> Vec<AnnotatedRecord> {
        batch
            .iter()
            .zip(matrix.imputed)
            .zip(raw)
            .map(|((record, imputed_features), raw_score)| {
                let decision = raw_score - self.offset;
                AnnotatedRecord {
                    record: record.clone(),
                    predicted_anomaly: decision < 0.0,
                    triggered_rules: Vec::new(),
                    anomaly_reason: String::new(),
                    anomaly_score: Some(decision),
                    imputed_features,
                }
            })
            .collect()
    }

    pub fn feature_schema(&self) -> &[String] {
        &self.feature_schema
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    pub fn seed(&self) -> u64 {
        self.forest.seed
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }
}

/// Fit a model over the batch and annotate every record with its verdict
pub fn classify_statistical(
    batch: &[TelemetryRecord],
    contamination: f64,
    seed: u64,
) -> Result<(Vec<AnnotatedRecord>, StatisticalModel)> {
    let (model, annotated) = StatisticalModel::fit_annotated(batch, contamination, seed)?;
    Ok((annotated, model))
}

/// Number of imputed values per feature across an annotated batch
pub fn imputation_counts(annotated: &[AnnotatedRecord]) -> Vec<(Feature, usize)> {
    Feature::ALL
        .iter()
        .map(|feature| {
            let count = annotated
                .iter()
                .filter(|a| a.imputed_features.contains(feature))
                .count();
            (*feature, count)
        })
        .filter(|(_, count)| *count > 0)
        .collect()
}
