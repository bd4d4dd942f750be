//! CSV persistence for telemetry batches
//!
//! The batch is always read and written as a whole; the only incremental
//! operation is appending a single record.

use crate::error::{DetectorError, Result};
use crate::models::TelemetryRecord;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source of the current telemetry batch
pub trait BatchSource: Send + Sync {
    /// Read the full batch in append order
    fn load(&self) -> Result<Vec<TelemetryRecord>>;

    /// Persist one more record at the end of the batch
    fn append(&self, record: &TelemetryRecord) -> Result<()>;

    /// Where the batch lives, for logs
    fn describe(&self) -> String {
        "batch source".to_string()
    }
}

/// Batch stored as a headed CSV file
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Replace the stored batch
    pub fn write_all(&self, batch: &[TelemetryRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.unavailable(e))?;
        }

        // Write to temp file first
        let temp_path = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&temp_path).map_err(|e| self.unavailable(e))?;
            for record in batch {
                writer.serialize(record).map_err(|e| self.unavailable(e))?;
            }
            writer.flush().map_err(|e| self.unavailable(e))?;
        }
        fs::rename(&temp_path, &self.path).map_err(|e| self.unavailable(e))?;

        debug!(path = %self.path.display(), records = batch.len(), "Batch written");
        Ok(())
    }

    fn unavailable(&self, err: impl std::fmt::Display) -> DetectorError {
        DetectorError::SourceUnavailable(format!("{}: {}", self.path.display(), err))
    }
}

impl BatchSource for CsvStore {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Vec<TelemetryRecord>> {
        let file = File::open(&self.path).map_err(|e| self.unavailable(e))?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(file);

        let batch = reader
            .deserialize::<TelemetryRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| self.unavailable(e))?;

        debug!(path = %self.path.display(), records = batch.len(), "Batch loaded");
        Ok(batch)
    }

    fn append(&self, record: &TelemetryRecord) -> Result<()> {
        let needs_header = fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.unavailable(e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record).map_err(|e| self.unavailable(e))?;
        writer.flush().map_err(|e| self.unavailable(e))?;

        debug!(path = %self.path.display(), location = %record.location_id, "Record appended");
        Ok(())
    }
}
