//! Occupancy model training.
//!
//! Standardizes the synthetic features, fits a random-forest regressor, and
//! computes validation metrics over the training window.

use anyhow::Result;
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

use super::sample::OccupancyDataset;
use super::{ModelMetadata, ModelType, StandardScaler, ValidationMetrics, FEATURE_NAMES};
use crate::config::MlConfig;

pub type ForestModel = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// A trained model together with everything needed to use and describe it.
pub struct TrainingOutcome {
    pub model: ForestModel,
    pub scaler: StandardScaler,
    pub metadata: ModelMetadata,
}

/// Forest parameters sized for a placeholder model: small enough to train
/// in seconds on modest hardware, deep enough to capture the weekly and
/// seasonal structure of the synthetic data.
pub fn forest_parameters(n_trees: usize, max_depth: u16, seed: u64) -> RandomForestRegressorParameters {
    RandomForestRegressorParameters {
        max_depth: Some(max_depth),
        min_samples_leaf: 2,
        min_samples_split: 5,
        n_trees,
        m: None,
        keep_samples: false,
        seed,
    }
}

/// Train the occupancy model on the given dataset.
pub fn train_occupancy_model(dataset: &OccupancyDataset, cfg: &MlConfig) -> Result<TrainingOutcome> {
    if dataset.is_empty() {
        anyhow::bail!("cannot train on empty dataset");
    }
    if dataset.features.len() != dataset.targets.len() {
        anyhow::bail!(
            "feature and target count mismatch: {} features, {} targets",
            dataset.features.len(),
            dataset.targets.len()
        );
    }

    let scaler = StandardScaler::fit(&dataset.features)?;
    let scaled = scaler.transform_rows(&dataset.features)?;

    let n_samples = scaled.len();
    let n_features = scaled[0].len();
    let mut flat = Vec::with_capacity(n_samples * n_features);
    for row in &scaled {
        flat.extend_from_slice(row);
    }

    let x = DenseMatrix::new(n_samples, n_features, flat, false);
    let y = dataset.targets.clone();

    let params = forest_parameters(cfg.n_trees, cfg.max_depth, cfg.seed);
    let model = ForestModel::fit(&x, &y, params)
        .map_err(|e| anyhow::anyhow!("random forest training failed: {:?}", e))?;

    let predictions = model
        .predict(&x)
        .map_err(|e| anyhow::anyhow!("prediction failed during validation: {:?}", e))?;
    let metrics = calculate_metrics(&predictions, &dataset.targets)?;

    let metadata = ModelMetadata {
        model_id: format!("occupancy_rf_{}", uuid::Uuid::new_v4()),
        model_type: ModelType::RandomForest,
        version: env!("CARGO_PKG_VERSION").to_string(),
        trained_at: chrono::Utc::now(),
        training_samples: n_samples,
        validation_metrics: metrics,
        feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
    };

    Ok(TrainingOutcome {
        model,
        scaler,
        metadata,
    })
}

/// Calculate validation metrics
pub fn calculate_metrics(predictions: &[f64], targets: &[f64]) -> Result<ValidationMetrics> {
    if predictions.len() != targets.len() {
        anyhow::bail!("prediction and target count mismatch");
    }

    if predictions.is_empty() {
        anyhow::bail!("no predictions to evaluate");
    }

    let n = predictions.len() as f64;

    // Mean Absolute Error
    let mae: f64 = predictions
        .iter()
        .zip(targets.iter())
        .map(|(p, t)| (p - t).abs())
        .sum::<f64>()
        / n;

    // Root Mean Square Error
    let mse: f64 = predictions
        .iter()
        .zip(targets.iter())
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / n;
    let rmse = mse.sqrt();

    // Mean Absolute Percentage Error
    let mape: f64 = predictions
        .iter()
        .zip(targets.iter())
        .filter(|(_, t)| t.abs() > 1e-10) // Avoid division by zero
        .map(|(p, t)| ((p - t) / t).abs() * 100.0)
        .sum::<f64>()
        / n;

    // R-squared
    let mean_target: f64 = targets.iter().sum::<f64>() / n;
    let ss_tot: f64 = targets.iter().map(|t| (t - mean_target).powi(2)).sum();
    let ss_res: f64 = predictions
        .iter()
        .zip(targets.iter())
        .map(|(p, t)| (t - p).powi(2))
        .sum();

    let r2 = if ss_tot.abs() < 1e-10 {
        0.0
    } else {
        1.0 - (ss_res / ss_tot)
    };

    Ok(ValidationMetrics::new(mae, rmse, mape, r2))
}
