//! Two-wallet demo: mint, trade back and forth, seal, validate.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use coinchain_chain::{Ledger, LedgerConfig};
use coinchain_core::{Address, Keypair};
use std::path::PathBuf;

use crate::snapshot_file::{self, SnapshotFormat};

#[derive(Args)]
pub struct DemoArgs {
    /// Coins minted into each wallet
    #[arg(short = 'n', long, default_value = "5")]
    coins: usize,

    /// Save the final ledger snapshot here
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Snapshot encoding
    #[arg(short, long, value_enum, default_value = "json")]
    format: SnapshotFormat,
}

/// A demo participant: seed pair and derived key.
struct Participant {
    name: &'static str,
    seeds: (&'static str, &'static str),
    keypair: Keypair,
}

impl Participant {
    fn new(name: &'static str, seed1: &'static str, seed2: &'static str) -> Result<Self> {
        let keypair = Keypair::from_seeds(seed1, seed2)
            .with_context(|| format!("Failed to derive key for {}", name))?;
        Ok(Self {
            name,
            seeds: (seed1, seed2),
            keypair,
        })
    }

    fn address(&self) -> Address {
        self.keypair.address()
    }
}

pub fn run(args: DemoArgs, config: LedgerConfig) -> Result<()> {
    println!("{}", "Running coinchain demo...".bold().cyan());
    println!(
        "    Difficulty: {}",
        config.difficulty.to_string().bright_cyan()
    );
    println!();

    let ledger = replay(config, args.coins)?;

    println!();
    println!("{}", "Balances:".bold());
    for wallet in ledger.wallets() {
        println!(
            "  {}  {}",
            wallet.address.to_hex().bright_yellow(),
            ledger.balance_of(&wallet.address).to_string().bright_cyan()
        );
    }
    println!(
        "  Pending transactions: {}",
        ledger.pending().len().to_string().bright_cyan()
    );

    println!();
    match ledger.validate_chain() {
        Ok(()) => println!(
            "{}  Chain valid ({} blocks)",
            "✓".green().bold(),
            ledger.chain().len()
        ),
        Err(fault) => println!("{}  {}", "✗".red().bold(), fault),
    }

    if let Some(path) = args.out {
        snapshot_file::write(&path, &ledger.snapshot(), args.format)?;
        println!(
            "{}  Saved snapshot to: {}",
            "✓".green().bold(),
            path.display().to_string().bright_black()
        );
    }

    Ok(())
}

/// Mint two wallets, trade A→B (1, 2, 1), seal, trade B→A (1, 3, 1), seal,
/// then leave one more B→A transfer pending.
fn replay(config: LedgerConfig, coins: usize) -> Result<Ledger> {
    let mut ledger = Ledger::new(config)?;
    let alice = Participant::new("wallet A", "abc", "123")?;
    let bob = Participant::new("wallet B", "def", "456")?;

    for participant in [&alice, &bob] {
        let (seed1, seed2) = participant.seeds;
        let wallet = ledger
            .mint(seed1, seed2, coins)
            .with_context(|| format!("Failed to mint {}", participant.name))?;
        println!(
            "{}  Minted {} with {} coins: {}",
            "✓".green().bold(),
            participant.name,
            coins,
            wallet.address.to_hex().bright_yellow()
        );
    }

    send(&mut ledger, &alice, &bob, &[1, 2, 1])?;
    seal(&mut ledger)?;
    send(&mut ledger, &bob, &alice, &[1, 3, 1])?;
    seal(&mut ledger)?;
    send(&mut ledger, &bob, &alice, &[1])?;

    Ok(ledger)
}

fn send(ledger: &mut Ledger, from: &Participant, to: &Participant, counts: &[usize]) -> Result<()> {
    for &count in counts {
        ledger
            .transfer(&from.address(), &from.keypair, &to.address(), count)
            .with_context(|| format!("Transfer {} -> {} failed", from.name, to.name))?;
        println!(
            "{}  Queued {} coin(s) {} -> {}",
            "✓".green().bold(),
            count,
            from.name,
            to.name
        );
    }
    Ok(())
}

fn seal(ledger: &mut Ledger) -> Result<()> {
    let receipt = ledger.seal_block().context("Failed to seal block")?;
    println!(
        "{}  Sealed block {} ({} transactions, nonce {})",
        "✓".green().bold(),
        receipt.block.index.to_string().bright_cyan(),
        receipt.block.tx_count(),
        receipt.block.nonce
    );
    println!("    Hash: {}", receipt.block.hash.to_hex().bright_yellow());
    Ok(())
}
