use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use hotel_ops::backup::{BackupService, RestoreOptions};
use hotel_ops::config::{Config, DEFAULT_CONFIG_FILE};
use hotel_ops::{deploy, launch, setup, status, telemetry};

#[derive(Parser)]
#[command(name = "hotel-ops")]
#[command(version)]
#[command(about = "Operational toolkit for the hotel management backend")]
#[command(long_about = "Backup, setup, launch, and deployment helpers for the hotel management \
backend. Configuration comes from config/default.toml merged with HOTEL_OPS__ \
environment variables (e.g. HOTEL_OPS__DATABASE__PASSWORD).")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backup operations
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Prepare a clean environment: tools, directories, config, model artifacts
    Setup,
    /// Validate readiness and launch the web application
    Start {
        /// Worker processes (production launches default to the configured count)
        #[arg(short, long)]
        workers: Option<u32>,
    },
    /// Occupancy model artifact operations
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },
    /// Azure provisioning and deployment helpers
    Deploy {
        #[command(subcommand)]
        action: DeployAction,
    },
    /// Report environment readiness
    Status,
}

#[derive(Subcommand)]
enum BackupAction {
    /// Create a full system backup
    Create,
    /// List available backups, newest first
    List,
    /// Restore from a backup archive
    Restore {
        /// Backup archive to restore
        file: PathBuf,

        /// Leave the database untouched
        #[arg(long)]
        skip_database: bool,

        /// Leave uploaded files and application data untouched
        #[arg(long)]
        skip_files: bool,

        /// Leave the model artifacts untouched
        #[arg(long)]
        skip_models: bool,
    },
    /// Delete one backup by file name
    Delete {
        /// File name as shown by `backup list`
        name: String,
    },
    /// Delete backups past the retention policy
    Prune,
}

#[derive(Subcommand)]
enum ModelsAction {
    /// Generate the occupancy model artifacts
    Generate {
        /// Regenerate even when artifacts already exist
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum DeployAction {
    /// Verify the Azure CLI is installed and logged in
    Check,
    /// Create resource group, app service plan, and web app
    Provision,
    /// Apply the startup command and app settings
    Configure,
    /// Show deployment state and hostname
    Status,
    /// Print the site and portal URLs
    Browse,
    /// Interactive dispatch loop over the actions above
    Menu,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let cfg = Config::load_from(&config_path)?;

    let _guard = telemetry::init_tracing(&cfg.paths.log_dir, &cfg.app.log_level);

    match cli.command {
        Commands::Backup { action } => {
            let service = BackupService::new(&cfg);
            match action {
                BackupAction::Create => {
                    let path = service.create().await?;
                    println!("backup created: {}", path.display());
                }
                BackupAction::List => {
                    let backups = service.list()?;
                    if backups.is_empty() {
                        println!("no backups in {}", cfg.paths.backup_dir.display());
                    } else {
                        let now = Utc::now();
                        println!("{:<44} {:>12} {:>8}  created", "file", "size", "age");
                        for b in backups {
                            println!(
                                "{:<44} {:>10} B {:>6} d  {}",
                                b.file_name,
                                b.size_bytes,
                                b.age_days(now),
                                b.created_at.format("%Y-%m-%d %H:%M:%S")
                            );
                        }
                    }
                }
                BackupAction::Restore {
                    file,
                    skip_database,
                    skip_files,
                    skip_models,
                } => {
                    let opts = RestoreOptions {
                        skip_database,
                        skip_files,
                        skip_models,
                    };
                    let report = service.restore(&file, &opts).await?;
                    println!(
                        "restored: database={} files={} models={} data={}",
                        report.database, report.files, report.ml_models, report.data
                    );
                }
                BackupAction::Delete { name } => {
                    service.delete(&name)?;
                    println!("deleted {name}");
                }
                BackupAction::Prune => {
                    let deleted = service.prune(Utc::now())?;
                    println!("deleted {deleted} backup(s)");
                }
            }
        }
        Commands::Setup => {
            setup::run(&cfg, &config_path).await?;
        }
        Commands::Start { workers } => {
            let code = launch::run(&cfg, workers).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Models { action } => match action {
            ModelsAction::Generate { force } => {
                setup::ensure_model_artifacts(&cfg, force)?;
            }
        },
        Commands::Deploy { action } => match action {
            DeployAction::Check => deploy::check().await?,
            DeployAction::Provision => deploy::provision(&cfg).await?,
            DeployAction::Configure => deploy::configure(&cfg).await?,
            DeployAction::Status => deploy::status(&cfg).await?,
            DeployAction::Browse => deploy::browse(&cfg),
            DeployAction::Menu => deploy::menu(&cfg).await?,
        },
        Commands::Status => {
            status::run(&cfg).await?;
        }
    }

    Ok(())
}
