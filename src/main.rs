//! Berth CLI - sparse-checkout static site deployment
//!
//! Usage: berth [COMMAND]
//!
//! Commands:
//!   deploy  Deploy the site (default when no command is given)
//!   doctor  Check privileges, dependencies and target state

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Berth - deploy a static site subtree from a Git remote
#[derive(Parser, Debug)]
#[command(name = "berth")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the config file (default: /etc/berth.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format for CI
    #[arg(long, default_value = "false")]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch the deployment branch and sync the document root
    Deploy,

    /// Check privileges, dependencies and target state without deploying
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Deploy) {
        Commands::Deploy => cmd_deploy(cli.config.as_deref(), cli.json),
        Commands::Doctor => cmd_doctor(cli.config.as_deref(), cli.json),
    }
}

fn load_config(path: Option<&Path>) -> Result<berth::Config> {
    let (config, warnings) = berth::Config::load_or_default(path)?;

    for warning in &warnings {
        eprintln!(
            "warning: unknown config key '{}' in {}",
            warning.key,
            warning.file.display()
        );
    }

    Ok(config)
}

fn cmd_deploy(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;

    // In --json mode the log still gets every line; stdout stays machine-readable
    let logger = berth::Logger::open(&config.log.file, !json)?;

    match berth::deploy::run(&config, &logger, &berth::SystemRunner) {
        Ok(outcome) => {
            if json {
                let output = serde_json::json!({
                    "event": "deploy",
                    "status": "success",
                    "state_before": format!("{:?}", outcome.state_before),
                    "fetch_attempts": outcome.fetch_attempts,
                });
                println!("{}", serde_json::to_string(&output)?);
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let output = serde_json::json!({
                    "event": "deploy",
                    "status": "error",
                    "message": e.to_string(),
                });
                println!("{}", serde_json::to_string(&output)?);
            }
            Err(e.into())
        }
    }
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<()> {
    use berth::CheckStatus;

    let config = load_config(config_path)?;
    let report = berth::run_doctor(&config, &berth::SystemRunner);

    if json {
        let output = serde_json::json!({
            "event": "doctor",
            "passes": report.passes(),
            "warnings": report.warnings(),
            "errors": report.errors(),
            "success": report.is_success(),
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        for check in &report.checks {
            let icon = match check.status {
                CheckStatus::Pass => "✓",
                CheckStatus::Warning => "⚠",
                CheckStatus::Error => "✗",
            };
            println!("{} {} - {}", icon, check.name, check.message);
        }

        println!();
        println!(
            "Summary: {} passed, {} warnings, {} errors",
            report.passes(),
            report.warnings(),
            report.errors()
        );
    }

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
