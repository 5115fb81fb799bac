//! Model artifact persistence.
//!
//! The model directory holds four files: the bincode-serialized forest, the
//! fitted scaler, the metadata document, and the synthetic training set. The
//! first three are required for the backend to serve predictions; setup and
//! the launch preflight check for them.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use super::sample::OccupancyDataset;
use super::training::{ForestModel, TrainingOutcome};
use super::{ModelMetadata, StandardScaler};
use crate::error::OpsError;

pub const MODEL_FILE: &str = "occupancy_model.bin";
pub const SCALER_FILE: &str = "occupancy_scaler.json";
pub const METADATA_FILE: &str = "model_metadata.json";
pub const SAMPLE_DATA_FILE: &str = "sample_data.csv";

const REQUIRED_FILES: [&str; 3] = [MODEL_FILE, SCALER_FILE, METADATA_FILE];

/// Required artifacts that are not present in the model directory.
pub fn missing_artifacts(dir: &Path) -> Vec<&'static str> {
    REQUIRED_FILES
        .iter()
        .filter(|name| !dir.join(name).exists())
        .copied()
        .collect()
}

pub fn artifacts_present(dir: &Path) -> bool {
    missing_artifacts(dir).is_empty()
}

/// Persist a training outcome and its dataset into the model directory.
pub fn save(dir: &Path, outcome: &TrainingOutcome, dataset: &OccupancyDataset) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;

    let model_bytes = bincode::serialize(&outcome.model).context("cannot serialize model")?;
    std::fs::write(dir.join(MODEL_FILE), model_bytes)?;

    let scaler_json = serde_json::to_string_pretty(&outcome.scaler)?;
    std::fs::write(dir.join(SCALER_FILE), scaler_json)?;

    let metadata_json = serde_json::to_string_pretty(&outcome.metadata)?;
    std::fs::write(dir.join(METADATA_FILE), metadata_json)?;

    dataset.write_csv(&dir.join(SAMPLE_DATA_FILE))?;

    info!(
        dir = %dir.display(),
        samples = outcome.metadata.training_samples,
        mae = outcome.metadata.validation_metrics.mae,
        r2 = outcome.metadata.validation_metrics.r2,
        "model artifacts written"
    );
    Ok(())
}

/// A fully loaded model ready to predict.
#[derive(Debug)]
pub struct LoadedModel {
    pub model: ForestModel,
    pub scaler: StandardScaler,
    pub metadata: ModelMetadata,
}

impl LoadedModel {
    /// Predict occupancy for raw (unscaled) features. A prediction outside
    /// [0, 1] means the artifacts no longer describe an occupancy model.
    pub fn predict(&self, raw_features: &[f64]) -> Result<f64> {
        use smartcore::linalg::basic::matrix::DenseMatrix;

        let scaled = self.scaler.transform(raw_features)?;
        let x = DenseMatrix::new(1, scaled.len(), scaled, false);
        let predictions = self
            .model
            .predict(&x)
            .map_err(|e| anyhow::anyhow!("prediction failed: {:?}", e))?;

        let value = *predictions
            .first()
            .ok_or_else(|| anyhow::anyhow!("model returned no prediction"))?;

        if !(0.0..=1.0).contains(&value) {
            return Err(OpsError::ModelCorrupt(format!(
                "occupancy prediction out of range: {value:.4}"
            ))
            .into());
        }
        Ok(value)
    }
}

/// Read only the metadata document, without deserializing the forest.
pub fn read_metadata(dir: &Path) -> Result<ModelMetadata, OpsError> {
    let raw = std::fs::read_to_string(dir.join(METADATA_FILE))
        .map_err(|e| OpsError::ModelCorrupt(format!("{METADATA_FILE}: {e}")))?;
    serde_json::from_str(&raw).map_err(|e| OpsError::ModelCorrupt(format!("{METADATA_FILE}: {e}")))
}

/// Load the artifacts from the model directory.
pub fn load(dir: &Path) -> Result<LoadedModel, OpsError> {
    let missing = missing_artifacts(dir);
    if !missing.is_empty() {
        return Err(OpsError::ModelsMissing(dir.to_path_buf()));
    }

    let model_bytes = std::fs::read(dir.join(MODEL_FILE))
        .map_err(|e| OpsError::ModelCorrupt(format!("{MODEL_FILE}: {e}")))?;
    let model: ForestModel = bincode::deserialize(&model_bytes)
        .map_err(|e| OpsError::ModelCorrupt(format!("{MODEL_FILE}: {e}")))?;

    let scaler_raw = std::fs::read_to_string(dir.join(SCALER_FILE))
        .map_err(|e| OpsError::ModelCorrupt(format!("{SCALER_FILE}: {e}")))?;
    let scaler: StandardScaler = serde_json::from_str(&scaler_raw)
        .map_err(|e| OpsError::ModelCorrupt(format!("{SCALER_FILE}: {e}")))?;

    let metadata_raw = std::fs::read_to_string(dir.join(METADATA_FILE))
        .map_err(|e| OpsError::ModelCorrupt(format!("{METADATA_FILE}: {e}")))?;
    let metadata: ModelMetadata = serde_json::from_str(&metadata_raw)
        .map_err(|e| OpsError::ModelCorrupt(format!("{METADATA_FILE}: {e}")))?;

    Ok(LoadedModel {
        model,
        scaler,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MlConfig;
    use crate::ml::{sample, training};
    use chrono::NaiveDate;

    fn trained_outcome() -> (TrainingOutcome, OccupancyDataset) {
        let cfg = MlConfig {
            history_days: 60,
            n_trees: 10,
            max_depth: 5,
            seed: 42,
        };
        let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let dataset = sample::generate(cfg.history_days, cfg.seed, end);
        let outcome = training::train_occupancy_model(&dataset, &cfg).unwrap();
        (outcome, dataset)
    }

    #[test]
    fn test_save_load_predict_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let (outcome, dataset) = trained_outcome();

        save(dir.path(), &outcome, &dataset).unwrap();
        assert!(artifacts_present(dir.path()));
        assert!(dir.path().join(SAMPLE_DATA_FILE).exists());

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.metadata.model_id, outcome.metadata.model_id);

        // Wednesday in July, average stay and rate
        let prediction = loaded.predict(&[2.0, 7.0, 0.0, 2.5, 150.0]).unwrap();
        assert!((0.0..=1.0).contains(&prediction));
    }

    #[test]
    fn test_missing_artifacts_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = missing_artifacts(dir.path());
        assert_eq!(missing.len(), 3);
        assert!(!artifacts_present(dir.path()));
        assert!(matches!(
            load(dir.path()).unwrap_err(),
            OpsError::ModelsMissing(_)
        ));
    }

    #[test]
    fn test_corrupt_model_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (outcome, dataset) = trained_outcome();
        save(dir.path(), &outcome, &dataset).unwrap();

        std::fs::write(dir.path().join(MODEL_FILE), b"garbage").unwrap();
        assert!(matches!(
            load(dir.path()).unwrap_err(),
            OpsError::ModelCorrupt(_)
        ));
    }
}
