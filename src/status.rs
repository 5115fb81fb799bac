//! One-shot environment report.

use anyhow::Result;

use crate::backup;
use crate::config::Config;
use crate::db;
use crate::ml::artifacts;

/// Print a readiness report: configuration summary, directory layout, model
/// artifacts, database reachability, backup inventory.
pub async fn run(cfg: &Config) -> Result<()> {
    println!(
        "{} v{} ({})",
        cfg.app.name, cfg.app.version, cfg.app.environment
    );
    println!();

    println!("directories:");
    for dir in cfg.paths.expected_dirs() {
        let state = if dir.is_dir() { "present" } else { "missing" };
        println!("  {:<28} {}", dir.display().to_string(), state);
    }
    println!();

    let model_dir = cfg.paths.ml_model_dir.as_path();
    let missing = artifacts::missing_artifacts(model_dir);
    if missing.is_empty() {
        match artifacts::read_metadata(model_dir) {
            Ok(meta) => println!(
                "model artifacts: present ({}, trained {})",
                meta.model_id,
                meta.trained_at.format("%Y-%m-%d")
            ),
            Err(e) => println!("model artifacts: unreadable ({e})"),
        }
    } else {
        println!("model artifacts: missing {}", missing.join(", "));
    }

    match db::probe(&cfg.database).await {
        Ok(latency) => println!("database:        reachable ({} ms)", latency.as_millis()),
        Err(e) => println!("database:        unreachable ({e:#})"),
    }

    let backups = backup::list_backups(&cfg.paths.backup_dir)?;
    match backups.first() {
        Some(newest) => println!(
            "backups:         {} (newest {})",
            backups.len(),
            newest.file_name
        ),
        None => println!("backups:         none"),
    }

    Ok(())
}
