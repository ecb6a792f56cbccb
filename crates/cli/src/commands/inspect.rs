//! Inspect a saved ledger snapshot.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use coinchain_chain::{Ledger, LedgerConfig};
use std::path::PathBuf;

use crate::snapshot_file;

#[derive(Args)]
pub struct InspectArgs {
    /// Snapshot file written by `coinchain demo --out`
    path: PathBuf,

    /// Also list every transaction and pending transfer
    #[arg(short, long)]
    verbose: bool,
}

pub fn run(args: InspectArgs, config: LedgerConfig) -> Result<()> {
    let (snapshot, format) = snapshot_file::read(&args.path)?;
    let ledger = Ledger::from_snapshot(snapshot, config)
        .with_context(|| format!("Failed to restore ledger from {}", args.path.display()))?;

    println!();
    println!(
        "{} ({:?}, difficulty {})",
        "Ledger snapshot".bold().cyan(),
        format,
        ledger.difficulty()
    );

    println!();
    println!("{}", "Blocks:".bold());
    for block in ledger.chain() {
        println!(
            "  #{:<4} {}  txs: {:<3} nonce: {}",
            block.index.to_string().bright_cyan(),
            block.hash.to_hex().bright_yellow(),
            block.tx_count(),
            block.nonce
        );
        if args.verbose {
            for tx in &block.transactions {
                println!(
                    "         {} -> {}  ({} coins)",
                    tx.from.to_hex().bright_black(),
                    tx.to.to_hex().bright_black(),
                    tx.coin_count()
                );
            }
        }
    }

    println!();
    println!("{}", "Wallets:".bold());
    for wallet in ledger.wallets() {
        println!(
            "  {}  balance: {}  owned: {}  outgoing: {}",
            wallet.address.to_hex().bright_yellow(),
            ledger.balance_of(&wallet.address).to_string().bright_cyan(),
            wallet.coin_count(),
            ledger.pending_from(&wallet.address).len()
        );
    }

    let stats = ledger.stats();
    println!();
    println!("  Total supply:         {}", stats.total_supply);
    println!("  Pending transactions: {}", stats.pending_transactions);
    println!("  Pending senders:      {}", ledger.mempool_stats().unique_senders);
    println!("  Reserved coins:       {}", stats.reserved_coins);
    if args.verbose {
        for tx in ledger.pending() {
            println!(
                "    {}  {} -> {}  (seq {}, {} coins)",
                tx.id().to_hex().bright_black(),
                tx.from.to_hex(),
                tx.to.to_hex(),
                tx.sequence,
                tx.coin_count()
            );
        }
    }

    println!();
    match ledger.validate_chain() {
        Ok(()) => {
            println!(
                "{}  Chain valid ({} blocks)",
                "✓".green().bold(),
                ledger.chain().len()
            );
            Ok(())
        }
        Err(fault) => {
            println!("{}  {}", "✗".red().bold(), fault);
            bail!("{}", fault)
        }
    }
}
