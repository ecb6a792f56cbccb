//! coinchain CLI entry point.

use clap::Parser;
use std::path::PathBuf;

mod commands;
mod logging;
mod snapshot_file;

#[derive(Parser)]
#[command(name = "coinchain")]
#[command(about = "A single-node proof-of-work coin ledger", long_about = None)]
struct Cli {
    /// Ledger configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the mining difficulty
    #[arg(short, long, global = true)]
    difficulty: Option<u32>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<commands::Commands>,
}

fn main() {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        logging::LogFormat::Json
    } else {
        logging::LogFormat::Human
    };
    logging::init_logging(format, &cli.log_level);

    match cli.command {
        Some(cmd) => {
            let result = commands::load_config(cli.config.as_deref(), cli.difficulty)
                .and_then(|config| commands::run(cmd, config));
            if let Err(e) = result {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("coinchain - A single-node proof-of-work coin ledger");
            println!("Run 'coinchain --help' for usage information.");
        }
    }
}
