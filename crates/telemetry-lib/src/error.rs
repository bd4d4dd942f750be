//! Error taxonomy for classification and storage

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Errors surfaced by detectors, the batch source and the model artifact
#[derive(Debug, Error)]
pub enum DetectorError {
    /// A numeric field required for evaluation is missing or non-finite
    #[error("record {index} has a missing or non-numeric `{field}`")]
    InvalidRecord { index: usize, field: &'static str },

    #[error("cannot fit a model on an empty batch")]
    EmptyBatch,

    /// Contamination must lie in (0, 0.5]
    #[error("contamination {0} is outside (0, 0.5]")]
    InvalidContamination(f64),

    #[error("incompatible model artifact: {0}")]
    IncompatibleModel(String),

    #[error("batch source unavailable: {0}")]
    SourceUnavailable(String),
}

impl DetectorError {
    /// Short machine-readable name, used for metric labels and logs
    pub fn kind(&self) -> &'static str {
        match self {
            DetectorError::InvalidRecord { .. } => "invalid_record",
            DetectorError::EmptyBatch => "empty_batch",
            DetectorError::InvalidContamination(_) => "invalid_contamination",
            DetectorError::IncompatibleModel(_) => "incompatible_model",
            DetectorError::SourceUnavailable(_) => "source_unavailable",
        }
    }
}
