//! CLI commands module.

use anyhow::{Context, Result};
use clap::Subcommand;
use coinchain_chain::LedgerConfig;
use std::path::Path;

mod demo;
mod inspect;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the two-wallet demo and optionally save the resulting ledger
    Demo(demo::DemoArgs),
    /// Load a saved ledger, print it and re-validate the chain
    Inspect(inspect::InspectArgs),
}

pub fn run(cmd: Commands, config: LedgerConfig) -> Result<()> {
    match cmd {
        Commands::Demo(args) => demo::run(args, config),
        Commands::Inspect(args) => inspect::run(args, config),
    }
}

/// Build the ledger configuration from the global flags.
pub fn load_config(path: Option<&Path>, difficulty: Option<u32>) -> Result<LedgerConfig> {
    let mut config = match path {
        Some(path) => LedgerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => LedgerConfig::default(),
    };

    if let Some(difficulty) = difficulty {
        config.difficulty = difficulty;
    }
    config.validate().context("Invalid configuration")?;

    Ok(config)
}
