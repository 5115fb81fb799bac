//! Readiness validation and web application launch.
//!
//! Preflight mirrors what the application needs at boot: directory layout,
//! model artifacts, reachable database. The server itself is an external
//! process; worker count is pass-through configuration for production runs.

use anyhow::Result;
use std::io::ErrorKind;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::Config;
use crate::db;
use crate::error::OpsError;
use crate::ml::artifacts;
use crate::setup;
use crate::telemetry;

/// Command line for the web application: program plus arguments.
pub fn build_server_command(cfg: &Config, workers: Option<u32>) -> (String, Vec<String>) {
    let mut args = vec![
        cfg.server.app.clone(),
        "--host".to_string(),
        cfg.server.host.clone(),
        "--port".to_string(),
        cfg.server.port.to_string(),
    ];
    if let Some(workers) = workers {
        args.push("--workers".to_string());
        args.push(workers.to_string());
    }
    (cfg.server.command.clone(), args)
}

/// Worker count to launch with: an explicit request wins, production runs
/// default to the configured count, development stays single-process.
pub fn effective_workers(cfg: &Config, requested: Option<u32>) -> Option<u32> {
    requested.or_else(|| cfg.app.is_production().then_some(cfg.server.workers))
}

pub async fn preflight(cfg: &Config) -> Result<()> {
    setup::create_directories(cfg)?;

    if !artifacts::artifacts_present(&cfg.paths.ml_model_dir) {
        warn!("model artifacts missing, generating placeholders");
        setup::ensure_model_artifacts(cfg, false)?;
    }

    db::probe_with_retry(&cfg.database).await?;

    if cfg.server.host == "0.0.0.0" {
        warn!(
            "server binding to 0.0.0.0 - the application will be accessible from the network; \
            bind to 127.0.0.1 unless behind a firewall or reverse proxy"
        );
    }
    Ok(())
}

/// Run preflight, launch the server, and supervise it until it exits or a
/// shutdown signal arrives. Returns the child's exit code.
pub async fn run(cfg: &Config, requested_workers: Option<u32>) -> Result<i32> {
    preflight(cfg).await?;

    let workers = effective_workers(cfg, requested_workers);
    let (program, args) = build_server_command(cfg, workers);
    info!(
        command = %program,
        host = %cfg.server.host,
        port = cfg.server.port,
        workers = workers.unwrap_or(1),
        "launching web application"
    );

    let mut child = Command::new(&program)
        .args(&args)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => OpsError::ToolMissing(program.clone()),
            _ => OpsError::SpawnError {
                tool: program.clone(),
                source: e,
            },
        })?;

    tokio::select! {
        status = child.wait() => {
            let status = status?;
            let code = status.code().unwrap_or(1);
            if code == 0 {
                info!("web application exited cleanly");
            } else {
                warn!(code, "web application exited with an error");
            }
            Ok(code)
        }
        _ = telemetry::shutdown_signal() => {
            warn!("stopping web application");
            child.start_kill().ok();
            let status = child.wait().await?;
            Ok(status.code().unwrap_or(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_server_command_development() {
        let cfg = Config::default();
        let (program, args) = build_server_command(&cfg, None);
        assert_eq!(program, "uvicorn");
        assert_eq!(
            args,
            vec!["app.main:app", "--host", "127.0.0.1", "--port", "8000"]
        );
    }

    #[test]
    fn test_build_server_command_with_workers() {
        let cfg = Config::default();
        let (_, args) = build_server_command(&cfg, Some(4));
        assert!(args.windows(2).any(|w| w == ["--workers", "4"]));
    }

    #[test]
    fn test_effective_workers() {
        let mut cfg = Config::default();
        assert_eq!(effective_workers(&cfg, None), None);
        assert_eq!(effective_workers(&cfg, Some(2)), Some(2));

        cfg.app.environment = "production".to_string();
        assert_eq!(effective_workers(&cfg, None), Some(4));
        assert_eq!(effective_workers(&cfg, Some(8)), Some(8));
    }
}
