//! Pending pool for admitted transactions.
//!
//! The pool keeps transactions in admission order and tracks which coins
//! they reserve, so a coin can back at most one pending transfer. While a
//! block is being sealed, the transactions it snapshotted are marked in
//! flight and cannot be withdrawn.

use coinchain_core::{Address, Hash, Transaction};
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Errors that can occur during mempool operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MempoolError {
    #[error("transaction already in mempool")]
    DuplicateTransaction,

    #[error("mempool is full (capacity: {0})")]
    MempoolFull(usize),

    #[error("transaction not found in mempool")]
    TransactionNotFound,

    #[error("coin {0} is already reserved by a pending transaction")]
    CoinAlreadyReserved(Hash),

    #[error("transaction is being sealed into a block")]
    TransactionSealing,
}

pub type Result<T> = std::result::Result<T, MempoolError>;

/// Configuration for the mempool.
#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Maximum number of transactions in the mempool.
    pub max_transactions: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_transactions: 10_000,
        }
    }
}

/// Transaction mempool.
pub struct Mempool {
    config: MempoolConfig,
    /// Transaction ids in admission order.
    order: Vec<Hash>,
    /// Transactions indexed by id.
    transactions: HashMap<Hash, Transaction>,
    /// Transaction ids grouped by sender address.
    by_sender: HashMap<Address, VecDeque<Hash>>,
    /// Reserved coin -> id of the transaction holding it.
    reserved: HashMap<Hash, Hash>,
    /// Ids captured by a seal that has not finished yet.
    in_flight: HashSet<Hash>,
}

impl Mempool {
    /// Create a new mempool with default configuration.
    pub fn new() -> Self {
        Self::with_config(MempoolConfig::default())
    }

    /// Create a new mempool with the given configuration.
    pub fn with_config(config: MempoolConfig) -> Self {
        Self {
            config,
            order: Vec::new(),
            transactions: HashMap::new(),
            by_sender: HashMap::new(),
            reserved: HashMap::new(),
            in_flight: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn contains(&self, tx_id: &Hash) -> bool {
        self.transactions.contains_key(tx_id)
    }

    pub fn get(&self, tx_id: &Hash) -> Option<&Transaction> {
        self.transactions.get(tx_id)
    }

    /// Whether some pending transaction already lists `coin`.
    pub fn contains_coin(&self, coin: &Hash) -> bool {
        self.reserved.contains_key(coin)
    }

    pub fn is_in_flight(&self, tx_id: &Hash) -> bool {
        self.in_flight.contains(tx_id)
    }

    /// Check whether `tx` could be added, without adding it.
    pub fn check(&self, tx: &Transaction) -> Result<()> {
        if self.contains(&tx.id()) {
            return Err(MempoolError::DuplicateTransaction);
        }

        if self.transactions.len() >= self.config.max_transactions {
            return Err(MempoolError::MempoolFull(self.config.max_transactions));
        }

        if let Some(coin) = tx.coins.iter().find(|coin| self.contains_coin(coin)) {
            return Err(MempoolError::CoinAlreadyReserved(*coin));
        }

        Ok(())
    }

    /// Add a transaction, reserving every coin it lists.
    ///
    /// Nothing changes unless every check passes.
    pub fn add(&mut self, tx: Transaction) -> Result<Hash> {
        self.check(&tx)?;

        let tx_id = tx.id();
        for coin in &tx.coins {
            self.reserved.insert(*coin, tx_id);
        }
        self.by_sender.entry(tx.from).or_default().push_back(tx_id);
        self.order.push(tx_id);
        self.transactions.insert(tx_id, tx);

        Ok(tx_id)
    }

    /// Remove a transaction and free its coins.
    ///
    /// Fails while the transaction is part of an unfinished seal.
    pub fn remove(&mut self, tx_id: &Hash) -> Result<Transaction> {
        if !self.contains(tx_id) {
            return Err(MempoolError::TransactionNotFound);
        }
        if self.is_in_flight(tx_id) {
            return Err(MempoolError::TransactionSealing);
        }
        self.take(tx_id).ok_or(MempoolError::TransactionNotFound)
    }

    fn take(&mut self, tx_id: &Hash) -> Option<Transaction> {
        let tx = self.transactions.remove(tx_id)?;

        self.order.retain(|id| id != tx_id);
        self.in_flight.remove(tx_id);
        for coin in &tx.coins {
            self.reserved.remove(coin);
        }

        if let Some(sender_txs) = self.by_sender.get_mut(&tx.from) {
            sender_txs.retain(|id| id != tx_id);
            if sender_txs.is_empty() {
                self.by_sender.remove(&tx.from);
            }
        }

        Some(tx)
    }

    /// Capture every pending transaction for a block and mark them in flight.
    pub fn begin_seal(&mut self) -> Vec<Transaction> {
        self.in_flight = self.order.iter().copied().collect();
        self.pending()
    }

    /// Drop the in-flight mark without removing anything.
    pub fn abort_seal(&mut self) {
        self.in_flight.clear();
    }

    /// Remove the given transactions after their block was appended.
    ///
    /// Transactions admitted after the seal began stay in the pool.
    pub fn commit_seal(&mut self, tx_ids: &[Hash]) -> Vec<Transaction> {
        let committed = tx_ids.iter().filter_map(|id| self.take(id)).collect();
        self.in_flight.clear();
        committed
    }

    /// Get transactions from a specific sender, oldest first.
    pub fn get_by_sender(&self, sender: &Address) -> Vec<Transaction> {
        self.by_sender
            .get(sender)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.transactions.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All pending transactions in admission order.
    pub fn pending(&self) -> Vec<Transaction> {
        self.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.order.iter().filter_map(|id| self.transactions.get(id))
    }

    /// Get mempool statistics.
    pub fn stats(&self) -> MempoolStats {
        MempoolStats {
            total_transactions: self.len(),
            unique_senders: self.by_sender.len(),
            reserved_coins: self.reserved.len(),
            in_flight: self.in_flight.len(),
            capacity: self.config.max_transactions,
        }
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

/// Mempool statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MempoolStats {
    /// Total number of transactions.
    pub total_transactions: usize,
    /// Number of unique senders.
    pub unique_senders: usize,
    /// Coins held by pending transactions.
    pub reserved_coins: usize,
    /// Transactions captured by an unfinished seal.
    pub in_flight: usize,
    /// Mempool capacity.
    pub capacity: usize,
}
