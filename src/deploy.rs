//! Azure deployment helper.
//!
//! Thin orchestration over the `az` CLI: resource group, app service plan,
//! web app, startup command, app settings, and deployment status. Every
//! invocation is built by a pure argument-builder so the command lines stay
//! testable without a subscription.

use anyhow::{Context, Result};
use console::Term;
use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::info;

use crate::config::{AzureConfig, Config};
use crate::exec;

const AZ: &str = "az";

pub fn resource_group_args(cfg: &AzureConfig) -> Vec<String> {
    vec![
        "group".into(),
        "create".into(),
        "--name".into(),
        cfg.resource_group.clone(),
        "--location".into(),
        cfg.location.clone(),
    ]
}

pub fn plan_args(cfg: &AzureConfig) -> Vec<String> {
    vec![
        "appservice".into(),
        "plan".into(),
        "create".into(),
        "--name".into(),
        cfg.plan.clone(),
        "--resource-group".into(),
        cfg.resource_group.clone(),
        "--sku".into(),
        cfg.sku.clone(),
        "--is-linux".into(),
    ]
}

pub fn webapp_args(cfg: &AzureConfig) -> Vec<String> {
    vec![
        "webapp".into(),
        "create".into(),
        "--name".into(),
        cfg.app_name.clone(),
        "--resource-group".into(),
        cfg.resource_group.clone(),
        "--plan".into(),
        cfg.plan.clone(),
        "--runtime".into(),
        cfg.runtime.clone(),
    ]
}

pub fn startup_command_args(cfg: &AzureConfig) -> Vec<String> {
    vec![
        "webapp".into(),
        "config".into(),
        "set".into(),
        "--name".into(),
        cfg.app_name.clone(),
        "--resource-group".into(),
        cfg.resource_group.clone(),
        "--startup-file".into(),
        cfg.startup_command.clone(),
    ]
}

pub fn app_settings_args(cfg: &AzureConfig, environment: &str, port: u16) -> Vec<String> {
    vec![
        "webapp".into(),
        "config".into(),
        "appsettings".into(),
        "set".into(),
        "--name".into(),
        cfg.app_name.clone(),
        "--resource-group".into(),
        cfg.resource_group.clone(),
        "--settings".into(),
        format!("ENVIRONMENT={environment}"),
        format!("PORT={port}"),
        "SCM_DO_BUILD_DURING_DEPLOYMENT=true".into(),
    ]
}

pub fn show_args(cfg: &AzureConfig) -> Vec<String> {
    vec![
        "webapp".into(),
        "show".into(),
        "--name".into(),
        cfg.app_name.clone(),
        "--resource-group".into(),
        cfg.resource_group.clone(),
        "--output".into(),
        "json".into(),
    ]
}

pub fn site_url(cfg: &AzureConfig) -> String {
    format!("https://{}.azurewebsites.net", cfg.app_name)
}

/// Verify the Azure CLI is installed and a login session exists.
pub async fn check() -> Result<()> {
    let version = exec::tool_version(AZ).await?;
    info!(%version, "Azure CLI available");

    exec::run_tool(
        AZ,
        &["account".into(), "show".into(), "--output".into(), "none".into()],
        &[],
    )
    .await
    .context("no active Azure session - run `az login` first")?;
    info!("Azure login session active");
    Ok(())
}

/// Create resource group, app service plan, and web app in order. Failures
/// abort the sequence; Azure treats re-creation of existing resources as an
/// update, so the sequence is safe to re-run.
pub async fn provision(cfg: &Config) -> Result<()> {
    check().await?;
    let azure = &cfg.azure;

    exec::run_tool(AZ, &resource_group_args(azure), &[]).await?;
    info!(name = %azure.resource_group, "resource group ready");

    exec::run_tool(AZ, &plan_args(azure), &[]).await?;
    info!(name = %azure.plan, sku = %azure.sku, "app service plan ready");

    exec::run_tool(AZ, &webapp_args(azure), &[]).await?;
    info!(name = %azure.app_name, runtime = %azure.runtime, "web app ready");

    println!("provisioned: {}", site_url(azure));
    Ok(())
}

/// Apply the startup command and app settings to the web app.
pub async fn configure(cfg: &Config) -> Result<()> {
    let azure = &cfg.azure;

    exec::run_tool(AZ, &startup_command_args(azure), &[]).await?;
    info!(startup = %azure.startup_command, "startup command set");

    let args = app_settings_args(azure, &cfg.app.environment, cfg.server.port);
    exec::run_tool(AZ, &args, &[]).await?;
    info!("app settings applied");
    Ok(())
}

/// Query the web app and report its state and hostname.
pub async fn status(cfg: &Config) -> Result<()> {
    let output = exec::run_tool(AZ, &show_args(&cfg.azure), &[]).await?;
    let details: serde_json::Value =
        serde_json::from_str(&output.stdout).context("unexpected `az webapp show` output")?;

    let state = details["state"].as_str().unwrap_or("unknown");
    let host = details["defaultHostName"].as_str().unwrap_or("unknown");
    println!("state: {state}");
    println!("host:  https://{host}");
    Ok(())
}

/// Print where to find the deployment.
pub fn browse(cfg: &Config) {
    let azure = &cfg.azure;
    println!("site:   {}", site_url(azure));
    println!(
        "portal: https://portal.azure.com/#@/resource/subscriptions (resource group {})",
        azure.resource_group
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
enum MenuAction {
    #[strum(serialize = "Check Azure CLI and login")]
    Check,
    #[strum(serialize = "Provision resource group, plan, and web app")]
    Provision,
    #[strum(serialize = "Configure startup command and app settings")]
    Configure,
    #[strum(serialize = "Show deployment status")]
    Status,
    #[strum(serialize = "Show site and portal URLs")]
    Browse,
}

/// Interactive dispatch loop over the deployment actions.
pub async fn menu(cfg: &Config) -> Result<()> {
    use std::io::{self, Write};

    let term = Term::stdout();
    if !term.is_term() {
        anyhow::bail!("the interactive menu needs a terminal; use the deploy subcommands instead");
    }

    loop {
        println!();
        println!("Azure deployment helper - {}", cfg.azure.app_name);
        for (i, action) in MenuAction::iter().enumerate() {
            println!("  {}) {}", i + 1, action);
        }
        println!("  q) quit");

        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let choice = line.trim();
        if choice.eq_ignore_ascii_case("q") {
            break;
        }

        let action = choice
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| MenuAction::iter().nth(idx));

        let Some(action) = action else {
            println!("unrecognized choice: {choice}");
            continue;
        };

        let result = match action {
            MenuAction::Check => check().await,
            MenuAction::Provision => provision(cfg).await,
            MenuAction::Configure => configure(cfg).await,
            MenuAction::Status => status(cfg).await,
            MenuAction::Browse => {
                browse(cfg);
                Ok(())
            }
        };

        if let Err(e) = result {
            eprintln!("error: {e:#}");
        }
    }
    Ok(())
}
