//! Persistence of fitted statistical models
//!
//! A model is stored together with the feature schema it was fitted on
//! and a SHA256 checksum of its payload. Loading validates both before
//! the model can be used for scoring.

use crate::anomaly::StatisticalModel;
use crate::error::{DetectorError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Artifact layout version understood by this build
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ModelArtifact {
    format_version: u32,
    feature_schema: Vec<String>,
    checksum: String,
    /// JSON-encoded `StatisticalModel`; the checksum covers these bytes
    payload: String,
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Write a fitted model to `path`
pub fn save_model(model: &StatisticalModel, path: &Path) -> Result<()> {
    let io_err = |e: &dyn std::fmt::Display| {
        DetectorError::SourceUnavailable(format!("{}: {}", path.display(), e))
    };

    let payload = serde_json::to_string(model).map_err(|e| io_err(&e))?;
    let artifact = ModelArtifact {
        format_version: ARTIFACT_FORMAT_VERSION,
        feature_schema: model.feature_schema().to_vec(),
        checksum: compute_checksum(payload.as_bytes()),
        payload,
    };
    let bytes = serde_json::to_vec(&artifact).map_err(|e| io_err(&e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_err(&e))?;
    }

    // Write to temp file first
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, &bytes).map_err(|e| io_err(&e))?;
    fs::rename(&temp_path, path).map_err(|e| io_err(&e))?;

    info!(
        path = %path.display(),
        size = bytes.len(),
        checksum = %artifact.checksum,
        "Model artifact saved"
    );
    Ok(())
}

/// Load a model, requiring it to match `expected_schema`
pub fn load_model(path: &Path, expected_schema: &[String]) -> Result<StatisticalModel> {
    let bytes = fs::read(path).map_err(|e| {
        DetectorError::SourceUnavailable(format!("{}: {}", path.display(), e))
    })?;

    let artifact: ModelArtifact = serde_json::from_slice(&bytes)
        .map_err(|e| DetectorError::IncompatibleModel(format!("unreadable artifact: {}", e)))?;

    if artifact.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(DetectorError::IncompatibleModel(format!(
            "format version {} is not supported (expected {})",
            artifact.format_version, ARTIFACT_FORMAT_VERSION
        )));
    }

    if artifact.feature_schema != expected_schema {
        return Err(DetectorError::IncompatibleModel(format!(
            "model fitted on {:?}, expected {:?}",
            artifact.feature_schema, expected_schema
        )));
    }

    let computed = compute_checksum(artifact.payload.as_bytes());
    if computed != artifact.checksum {
        return Err(DetectorError::IncompatibleModel(format!(
            "checksum mismatch: expected {}, got {}",
            artifact.checksum, computed
        )));
    }

    let model: StatisticalModel = serde_json::from_str(&artifact.payload)
        .map_err(|e| DetectorError::IncompatibleModel(format!("invalid model payload: {}", e)))?;

    if model.feature_schema() != expected_schema {
        return Err(DetectorError::IncompatibleModel(
            "payload schema differs from artifact header".to_string(),
        ));
    }

    debug!(path = %path.display(), checksum = %computed, "Model artifact loaded");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::DEFAULT_SEED;
    use crate::models::{feature_schema, TelemetryRecord};
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

    fn fitted() -> StatisticalModel {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let batch: Vec<_> = (0..60)
            .map(|i| {
                let k = (i % 12) as f64;
                TelemetryRecord::new(start + Duration::minutes(i), "Loc_1", "LTE")
                    .with_metrics(-70.0 - k, 20.0 + k, 300.0 - k * 3.0, 0.4)
                    .with_device_count(30 + i as u32)
            })
            .collect();
        StatisticalModel::fit(&batch, 0.05, DEFAULT_SEED).unwrap()
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("models").join("iforest.json");
        let model = fitted();

        save_model(&model, &path).unwrap();
        let loaded = load_model(&path, &feature_schema()).unwrap();
        assert_eq!(loaded, model);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_schema_mismatch_is_incompatible() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("iforest.json");
        save_model(&fitted(), &path).unwrap();

        let mut other = feature_schema();
        other.pop();
        assert!(matches!(
            load_model(&path, &other),
            Err(DetectorError::IncompatibleModel(_))
        ));
    }

    #[test]
    fn test_tampered_payload_fails_checksum() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("iforest.json");
        save_model(&fitted(), &path).unwrap();

        let mut artifact: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let payload = artifact["payload"].as_str().unwrap().to_string();
        let tampered = payload.replacen("\"contamination\":0.05", "\"contamination\":0.5", 1);
        assert_ne!(payload, tampered);
        artifact["payload"] = serde_json::json!(tampered);
        fs::write(&path, serde_json::to_vec(&artifact).unwrap()).unwrap();

        match load_model(&path, &feature_schema()) {
            Err(DetectorError::IncompatibleModel(msg)) => assert!(msg.contains("checksum")),
            other => panic!("expected checksum failure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_artifact_is_source_unavailable() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_model(&dir.path().join("nope.json"), &feature_schema()),
            Err(DetectorError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn test_garbage_is_incompatible() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("iforest.json");
        fs::write(&path, b"\x00\x01not json").unwrap();
        assert!(matches!(
            load_model(&path, &feature_schema()),
            Err(DetectorError::IncompatibleModel(_))
        ));
    }

    #[test]
    fn test_checksum_is_hex_sha256() {
        let checksum = compute_checksum(b"netpulse");
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
