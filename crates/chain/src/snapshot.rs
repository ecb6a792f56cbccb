//! Serializable ledger state.
//!
//! A snapshot carries everything except the open seal, so a restored ledger
//! starts idle with the same pool contents.

use crate::circulation::Circulation;
use crate::config::LedgerConfig;
use crate::ledger::{Ledger, LedgerError, Result};
use coinchain_core::{Address, Block, Coin, CoinState, Hash, Transaction, Wallet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub difficulty: u32,
    pub chain: Vec<Block>,
    pub wallets: BTreeMap<Address, Wallet>,
    pub circulation: Vec<Coin>,
    pub pending: Vec<Transaction>,
}

impl LedgerSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Ledger {
    /// Capture the full ledger state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            difficulty: self.config.difficulty,
            chain: self.chain.clone(),
            wallets: self.wallets.clone(),
            circulation: self.circulation.as_slice().to_vec(),
            pending: self.mempool.pending(),
        }
    }

    /// Rebuild a ledger from a snapshot.
    ///
    /// The snapshot's difficulty replaces the one in `config`. Structural
    /// problems are rejected: missing genesis, repeated coins, wallets whose
    /// key does not match their address. Every pending transaction goes
    /// through the admission checks again (signature, ownership, free
    /// coins) and must not already be in the chain; afterwards a coin must
    /// be pending exactly when the pool holds it. Chain integrity is left to
    /// [`Ledger::validate_chain`].
    pub fn from_snapshot(snapshot: LedgerSnapshot, config: LedgerConfig) -> Result<Self> {
        let config = LedgerConfig {
            difficulty: snapshot.difficulty,
            ..config
        };
        config.validate()?;

        if snapshot.chain.first() != Some(&Block::genesis()) {
            return Err(LedgerError::Snapshot("chain does not start at genesis".into()));
        }
        if snapshot.circulation.first() != Some(&Coin::genesis()) {
            return Err(LedgerError::Snapshot(
                "circulation does not start with the genesis coin".into(),
            ));
        }
        if let Some((key, wallet)) = snapshot
            .wallets
            .iter()
            .find(|(key, wallet)| {
                **key != wallet.address || wallet.public_key.to_address() != wallet.address
            })
        {
            return Err(LedgerError::Snapshot(format!(
                "wallet {} filed under {}",
                wallet.address, key
            )));
        }

        let circulation = Circulation::from_coins(snapshot.circulation)
            .map_err(|coin| LedgerError::Snapshot(format!("coin {coin} appears twice")))?;

        let confirmed: HashSet<Hash> = snapshot
            .chain
            .iter()
            .flat_map(|block| block.transactions.iter().map(Transaction::id))
            .collect();
        let recorded: Vec<(Hash, CoinState)> = circulation
            .iter()
            .map(|coin| (coin.hash, coin.state))
            .collect();

        let mut ledger = Ledger::assemble(config, snapshot.chain, snapshot.wallets, circulation);
        for (hash, _) in &recorded {
            if let Some(coin) = ledger.circulation.get_mut(hash) {
                coin.release();
            }
        }

        for tx in snapshot.pending {
            let tx_id = tx.id();
            if confirmed.contains(&tx_id) {
                return Err(LedgerError::Snapshot(format!(
                    "pending transaction {tx_id} is already in the chain"
                )));
            }
            ledger.readmit(tx).map_err(|err| match err {
                LedgerError::Snapshot(reason) => {
                    LedgerError::Snapshot(format!("pending transaction {tx_id}: {reason}"))
                }
                other => LedgerError::Snapshot(format!("pending transaction {tx_id}: {other}")),
            })?;
        }

        if let Some((hash, state)) = recorded
            .iter()
            .find(|(hash, state)| ledger.circulation.get(hash).map(|coin| coin.state) != Some(*state))
        {
            return Err(LedgerError::Snapshot(format!(
                "coin {hash} is recorded as {state:?} but the pending pool disagrees"
            )));
        }

        info!(
            height = ledger.height(),
            wallets = ledger.wallets.len(),
            pending = ledger.mempool.len(),
            "ledger restored from snapshot"
        );
        Ok(ledger)
    }
}
