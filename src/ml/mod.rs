//! Occupancy prediction model support.
//!
//! The backend serves occupancy predictions from a random-forest model. This
//! module owns the placeholder-artifact pipeline the setup flow relies on:
//! - Synthetic training data generation
//! - Feature standardization
//! - Model training with validation metrics
//! - Artifact persistence and loading

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod artifacts;
pub mod sample;
pub mod training;

/// Feature layout shared by training, persistence, and prediction.
pub const FEATURE_NAMES: [&str; 5] = [
    "day_of_week",
    "month",
    "is_weekend",
    "avg_stay_duration",
    "avg_room_rate",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ModelType {
    RandomForest,
    LinearRegression,
}

/// Metadata persisted next to a trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub model_type: ModelType,
    pub version: String,
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub training_samples: usize,
    pub validation_metrics: ValidationMetrics,
    pub feature_names: Vec<String>,
}

/// Validation Metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub mae: f64,  // Mean Absolute Error
    pub rmse: f64, // Root Mean Square Error
    pub mape: f64, // Mean Absolute Percentage Error
    pub r2: f64,   // R-squared
}

impl ValidationMetrics {
    pub fn new(mae: f64, rmse: f64, mape: f64, r2: f64) -> Self {
        Self { mae, rmse, mape, r2 }
    }

    /// Check if metrics meet quality thresholds
    pub fn meets_quality_threshold(&self, max_mape: f64, min_r2: f64) -> bool {
        self.mape <= max_mape && self.r2 >= min_r2
    }
}

/// Fitted z-score scaler, persisted alongside the model so prediction inputs
/// are standardized exactly like the training data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit per-column mean and standard deviation over the given rows.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        if rows.is_empty() {
            anyhow::bail!("cannot fit scaler on empty dataset");
        }
        let n_features = rows[0].len();
        let n = rows.len() as f64;

        let mut means = vec![0.0; n_features];
        for row in rows {
            if row.len() != n_features {
                anyhow::bail!(
                    "ragged dataset: expected {} features, found {}",
                    n_features,
                    row.len()
                );
            }
            for (i, value) in row.iter().enumerate() {
                means[i] += value / n;
            }
        }

        let mut stds = vec![0.0; n_features];
        for row in rows {
            for (i, value) in row.iter().enumerate() {
                stds[i] += (value - means[i]).powi(2) / n;
            }
        }
        for std in &mut stds {
            *std = std.sqrt();
        }

        Ok(Self { means, stds })
    }

    /// Standardize one feature vector. Zero-variance columns map to 0.
    pub fn transform(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.means.len() {
            anyhow::bail!(
                "feature count mismatch: scaler has {}, input has {}",
                self.means.len(),
                features.len()
            );
        }

        Ok(features
            .iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(f, (mean, std))| {
                if std.abs() < 1e-10 {
                    0.0
                } else {
                    (f - mean) / std
                }
            })
            .collect())
    }

    pub fn transform_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|row| self.transform(row)).collect()
    }
}
