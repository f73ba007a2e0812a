//! # Catalog Tool
//!
//! Loads an engine configuration, bootstraps its catalog into an in-memory
//! store and prints the resulting permission set. Operators and CI use it
//! to validate catalog files before rollout.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `RBAC_CONFIG` - Path to the TOML configuration (default: ./rbac.toml)
//! - `RUST_LOG` - Log filter (default: `log_level` from the configuration)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rbac_authz::{AuthzEngine, EngineConfig, Permission};
use std::path::PathBuf;
use tracing::info;

/// RBAC catalog tool
#[derive(Parser)]
#[command(name = "rbac-catalog")]
#[command(about = "Validate and bootstrap an RBAC permission catalog")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "rbac.toml", env = "RBAC_CONFIG")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Bootstrap the catalog and list the resulting permissions (default)
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Only parse and validate the configuration
    Check,

    /// Print the normalized configuration as TOML
    Normalize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EngineConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let log_level = if cli.verbose { "debug" } else { config.log_level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Loaded configuration from {:?}", cli.config);

    match cli.command.unwrap_or(Command::List { json: false }) {
        Command::Check => {
            println!(
                "OK: catalog v{} with {} modules and {} permissions",
                config.catalog.version,
                config.catalog.modules.len(),
                config.catalog.len()
            );
        }
        Command::Normalize => {
            print!("{}", config.to_toml_string()?);
        }
        Command::List { json } => {
            let engine = AuthzEngine::in_memory(config).context("Failed to build engine")?;
            let permissions = engine
                .ensure_catalog()
                .await
                .context("Catalog bootstrap failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&permissions)?);
            } else {
                print_table(&permissions);
            }
        }
    }

    Ok(())
}

fn print_table(permissions: &[Permission]) {
    let width = permissions
        .iter()
        .map(|p| p.canonical_key.len())
        .max()
        .unwrap_or(0);

    for permission in permissions {
        println!(
            "{:<width$}  {:<12}  {}",
            permission.canonical_key,
            permission.category,
            permission.description,
            width = width
        );
    }
}
