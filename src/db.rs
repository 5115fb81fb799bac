//! Database boundary: connectivity probe plus dump/restore tool invocations.
//!
//! The probe opens a real connection and runs `SELECT 1` with bounded
//! exponential-backoff retries. Dumps and restores shell out to the
//! PostgreSQL client tools; credentials travel via PGPASSWORD in the child
//! environment, never on the command line.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::OpsError;
use crate::exec;

pub const DUMP_FILE_NAME: &str = "database.dump";

/// One connectivity check: connect and run `SELECT 1`. Returns the latency.
pub async fn probe(cfg: &DatabaseConfig) -> Result<Duration> {
    let start = Instant::now();

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .connect(&cfg.connection_url())
        .await
        .context("failed to open database connection")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("database liveness query failed")?;

    pool.close().await;
    Ok(start.elapsed())
}

/// Probe with exponential backoff. Gives the database a chance to come up
/// before aborting a backup or launch.
pub async fn probe_with_retry(cfg: &DatabaseConfig) -> Result<(), OpsError> {
    let max_attempts = cfg.probe_attempts.max(1);
    let mut delay = Duration::from_secs(1);

    for attempt in 1..=max_attempts {
        match probe(cfg).await {
            Ok(latency) => {
                info!(
                    attempt,
                    latency_ms = latency.as_millis() as u64,
                    "database reachable"
                );
                return Ok(());
            }
            Err(e) if attempt == max_attempts => {
                return Err(OpsError::DatabaseUnreachable(format!(
                    "{e:#} (after {max_attempts} attempts)"
                )));
            }
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts,
                    error = %e,
                    "database probe failed, retrying in {:?}", delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }

    unreachable!("probe loop always returns")
}

/// Arguments for `pg_dump` writing a custom-format dump to `out`.
pub fn dump_args(cfg: &DatabaseConfig, out: &Path) -> Vec<String> {
    let mut args = connection_args(cfg);
    args.extend([
        "--format=custom".to_string(),
        "--no-password".to_string(),
        "--file".to_string(),
        out.display().to_string(),
    ]);
    args
}

/// Arguments for `pg_restore` reading the given dump file.
pub fn restore_args(cfg: &DatabaseConfig, dump: &Path) -> Vec<String> {
    let mut args = connection_args(cfg);
    args.extend([
        "--clean".to_string(),
        "--if-exists".to_string(),
        "--no-password".to_string(),
        dump.display().to_string(),
    ]);
    args
}

fn connection_args(cfg: &DatabaseConfig) -> Vec<String> {
    if let Some(url) = &cfg.url {
        return vec!["--dbname".to_string(), url.clone()];
    }
    vec![
        "--host".to_string(),
        cfg.host.clone(),
        "--port".to_string(),
        cfg.port.to_string(),
        "--username".to_string(),
        cfg.user.clone(),
        "--dbname".to_string(),
        cfg.name.clone(),
    ]
}

fn password_env(cfg: &DatabaseConfig) -> Vec<(String, String)> {
    if cfg.url.is_none() && !cfg.password.is_empty() {
        vec![("PGPASSWORD".to_string(), cfg.password.clone())]
    } else {
        Vec::new()
    }
}

/// Dump the database into `out` via `pg_dump`.
pub async fn dump(cfg: &DatabaseConfig, out: &Path) -> Result<(), OpsError> {
    let args = dump_args(cfg, out);
    exec::run_tool("pg_dump", &args, &password_env(cfg)).await?;
    info!(path = %out.display(), "database dump written");
    Ok(())
}

/// Restore the database from a custom-format dump via `pg_restore`.
pub async fn restore(cfg: &DatabaseConfig, dump_file: &Path) -> Result<(), OpsError> {
    let args = restore_args(cfg, dump_file);
    exec::run_tool("pg_restore", &args, &password_env(cfg)).await?;
    info!(path = %dump_file.display(), "database restored");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parts_config() -> DatabaseConfig {
        DatabaseConfig {
            host: "db.internal".to_string(),
            port: 5433,
            user: "admin".to_string(),
            password: "hunter2".to_string(),
            name: "hotel_prod".to_string(),
            ..DatabaseConfig::default()
        }
    }

    #[test]
    fn test_dump_args_from_parts() {
        let args = dump_args(&parts_config(), &PathBuf::from("/tmp/db.dump"));
        assert_eq!(
            args,
            vec![
                "--host",
                "db.internal",
                "--port",
                "5433",
                "--username",
                "admin",
                "--dbname",
                "hotel_prod",
                "--format=custom",
                "--no-password",
                "--file",
                "/tmp/db.dump",
            ]
        );
    }

    #[test]
    fn test_dump_args_from_url() {
        let cfg = DatabaseConfig {
            url: Some("postgres://u:p@h/d".to_string()),
            ..DatabaseConfig::default()
        };
        let args = dump_args(&cfg, &PathBuf::from("out.dump"));
        assert_eq!(args[0], "--dbname");
        assert_eq!(args[1], "postgres://u:p@h/d");
    }

    #[test]
    fn test_restore_args_include_clean() {
        let args = restore_args(&parts_config(), &PathBuf::from("db.dump"));
        assert!(args.contains(&"--clean".to_string()));
        assert!(args.contains(&"--if-exists".to_string()));
        assert_eq!(args.last().unwrap(), "db.dump");
    }

    #[test]
    fn test_password_stays_out_of_args() {
        let cfg = parts_config();
        let args = dump_args(&cfg, &PathBuf::from("out.dump"));
        assert!(!args.iter().any(|a| a.contains("hunter2")));
        assert_eq!(
            password_env(&cfg),
            vec![("PGPASSWORD".to_string(), "hunter2".to_string())]
        );
    }

    #[test]
    fn test_no_password_env_for_url_mode() {
        let cfg = DatabaseConfig {
            url: Some("postgres://u:p@h/d".to_string()),
            password: "ignored".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(password_env(&cfg).is_empty());
    }
}
