//! Clean-environment preparation.
//!
//! Verifies the external tools, creates the directory layout, scaffolds a
//! starter configuration, generates placeholder model artifacts, and smoke
//! tests the result. Safe to run repeatedly.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::db;
use crate::exec;
use crate::ml::{artifacts, sample, training};

/// Client tools the backup and restore flows shell out to.
pub const REQUIRED_TOOLS: [&str; 3] = ["pg_dump", "pg_restore", "psql"];

pub async fn run(cfg: &Config, config_path: &Path) -> Result<()> {
    verify_tools().await?;
    create_directories(cfg)?;
    scaffold_config(config_path)?;
    ensure_model_artifacts(cfg, false)?;
    smoke_test(cfg, config_path).await?;
    info!("setup complete");
    Ok(())
}

/// Fail when any required external tool is missing from PATH.
pub async fn verify_tools() -> Result<()> {
    for tool in REQUIRED_TOOLS {
        let version = exec::tool_version(tool).await?;
        info!(tool, %version, "tool available");
    }
    Ok(())
}

/// Create every directory the application expects. Existing directories are
/// left alone.
pub fn create_directories(cfg: &Config) -> Result<()> {
    for dir in cfg.paths.expected_dirs() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create {}", dir.display()))?;
    }
    info!("directory layout ready");
    Ok(())
}

/// Write a starter configuration file when none exists. Never overwrites.
pub fn scaffold_config(path: &Path) -> Result<()> {
    if path.exists() {
        info!(path = %path.display(), "configuration file already present");
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, Config::default_toml()?)
        .with_context(|| format!("cannot write {}", path.display()))?;
    info!(path = %path.display(), "starter configuration written");
    Ok(())
}

/// Generate the occupancy model artifacts. A no-op when they already exist,
/// unless `force` is set.
pub fn ensure_model_artifacts(cfg: &Config, force: bool) -> Result<()> {
    let dir = cfg.paths.ml_model_dir.as_path();
    if !force && artifacts::artifacts_present(dir) {
        info!(dir = %dir.display(), "model artifacts already present");
        return Ok(());
    }

    info!(
        history_days = cfg.ml.history_days,
        n_trees = cfg.ml.n_trees,
        "training placeholder occupancy model"
    );
    let end = chrono::Utc::now().date_naive();
    let dataset = sample::generate(cfg.ml.history_days, cfg.ml.seed, end);
    let outcome = training::train_occupancy_model(&dataset, &cfg.ml)?;
    artifacts::save(dir, &outcome, &dataset)?;
    Ok(())
}

/// Confirm the prepared environment actually works: the configuration loads,
/// the model artifacts deserialize, and the database answers. A dead
/// database is only a warning here; provisioning often runs before it is up.
async fn smoke_test(cfg: &Config, config_path: &Path) -> Result<()> {
    let reloaded = Config::load_from(config_path)?;

    let model = artifacts::load(&reloaded.paths.ml_model_dir)?;
    info!(model_id = %model.metadata.model_id, "model artifacts load cleanly");

    match db::probe(&cfg.database).await {
        Ok(latency) => {
            info!(latency_ms = latency.as_millis() as u64, "database reachable");
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "database not reachable; start it before launching");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathsConfig;
    use std::path::PathBuf;

    fn temp_config(root: &Path) -> Config {
        Config {
            paths: PathsConfig {
                upload_dir: root.join("uploads"),
                ocr_upload_dir: root.join("uploads/ocr"),
                ml_model_dir: root.join("ml_models"),
                backup_dir: root.join("backups"),
                data_dir: root.join("data"),
                log_dir: root.join("logs"),
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_create_directories_builds_full_layout() {
        let root = tempfile::tempdir().unwrap();
        let cfg = temp_config(root.path());

        create_directories(&cfg).unwrap();
        for dir in cfg.paths.expected_dirs() {
            assert!(dir.is_dir(), "missing {}", dir.display());
        }

        // second run is a no-op
        create_directories(&cfg).unwrap();
    }

    #[test]
    fn test_scaffold_config_writes_once() {
        let root = tempfile::tempdir().unwrap();
        let path: PathBuf = root.path().join("config/default.toml");

        scaffold_config(&path).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        assert!(first.contains("[server]"));

        std::fs::write(&path, "# hand edited\n").unwrap();
        scaffold_config(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hand edited\n");
    }

    #[test]
    fn test_ensure_model_artifacts_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let mut cfg = temp_config(root.path());
        cfg.ml.history_days = 60;
        cfg.ml.n_trees = 5;

        ensure_model_artifacts(&cfg, false).unwrap();
        let first_meta =
            std::fs::read_to_string(cfg.paths.ml_model_dir.join(artifacts::METADATA_FILE))
                .unwrap();

        // Without force, the second run must not retrain.
        ensure_model_artifacts(&cfg, false).unwrap();
        let second_meta =
            std::fs::read_to_string(cfg.paths.ml_model_dir.join(artifacts::METADATA_FILE))
                .unwrap();
        assert_eq!(first_meta, second_meta);

        // With force, a new model id is minted.
        ensure_model_artifacts(&cfg, true).unwrap();
        let third_meta =
            std::fs::read_to_string(cfg.paths.ml_model_dir.join(artifacts::METADATA_FILE))
                .unwrap();
        assert_ne!(first_meta, third_meta);
    }
}
