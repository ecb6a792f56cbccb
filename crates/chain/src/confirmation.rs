//! Block confirmation engine.
//!
//! Applies the transfers of a sealed block to the wallet registry and the
//! circulation: every listed coin leaves the sender, joins the receiver and
//! becomes available again under its new owner.

use coinchain_core::{Address, Block, Hash, Transaction, Wallet};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::circulation::Circulation;

/// Why part of a transaction could not be confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FaultReason {
    #[error("sender wallet {0} not found")]
    SenderMissing(Address),

    #[error("receiver wallet {0} not found")]
    ReceiverMissing(Address),

    #[error("coin {0} not found in circulation")]
    CoinNotFound(Hash),

    #[error("coin {coin} is not owned by {sender}")]
    CoinNotOwned { coin: Hash, sender: Address },

    #[error("coin {0} already listed by the receiver")]
    AlreadyHeldByReceiver(Hash),
}

/// A confirmation fault tied to the transaction that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transaction {tx_id}: {reason}")]
pub struct IntegrityFault {
    pub tx_id: Hash,
    pub reason: FaultReason,
}

/// Result of confirming a single transaction.
#[derive(Debug, Clone)]
pub struct TransactionReceipt {
    /// Transaction id.
    pub tx_id: Hash,
    /// Coins that changed hands.
    pub coins_moved: usize,
    /// Anything that could not be applied cleanly.
    pub faults: Vec<IntegrityFault>,
}

impl TransactionReceipt {
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

/// Result of confirming a block.
#[derive(Debug, Clone)]
pub struct BlockConfirmation {
    /// Block hash.
    pub block_hash: Hash,
    /// Transaction receipts, in block order.
    pub receipts: Vec<TransactionReceipt>,
    /// Total coins moved.
    pub coins_moved: usize,
}

impl BlockConfirmation {
    pub fn faults(&self) -> impl Iterator<Item = &IntegrityFault> {
        self.receipts.iter().flat_map(|r| r.faults.iter())
    }

    pub fn is_clean(&self) -> bool {
        self.receipts.iter().all(TransactionReceipt::is_clean)
    }
}

/// Confirmation engine over the ledger's mutable state.
pub struct Confirmer<'a> {
    wallets: &'a mut BTreeMap<Address, Wallet>,
    circulation: &'a mut Circulation,
}

impl<'a> Confirmer<'a> {
    pub fn new(wallets: &'a mut BTreeMap<Address, Wallet>, circulation: &'a mut Circulation) -> Self {
        Self {
            wallets,
            circulation,
        }
    }

    /// Report every fault confirming `tx` would hit, without changing state.
    pub fn check_transaction(&self, tx: &Transaction) -> Vec<IntegrityFault> {
        let tx_id = tx.id();
        let fault = |reason| IntegrityFault { tx_id, reason };
        let mut faults = Vec::new();

        let sender = self.wallets.get(&tx.from);
        let receiver = self.wallets.get(&tx.to);
        if sender.is_none() {
            faults.push(fault(FaultReason::SenderMissing(tx.from)));
        }
        if receiver.is_none() {
            faults.push(fault(FaultReason::ReceiverMissing(tx.to)));
        }
        let (Some(sender), Some(receiver)) = (sender, receiver) else {
            return faults;
        };

        for coin in &tx.coins {
            if !self.circulation.contains(coin) {
                faults.push(fault(FaultReason::CoinNotFound(*coin)));
            } else if !sender.owns(coin) {
                faults.push(fault(FaultReason::CoinNotOwned {
                    coin: *coin,
                    sender: tx.from,
                }));
            } else if tx.from != tx.to && receiver.owns(coin) {
                faults.push(fault(FaultReason::AlreadyHeldByReceiver(*coin)));
            }
        }

        faults
    }

    /// Faults across every transaction of a block.
    ///
    /// Coins are unique within a validated block, so checking each
    /// transaction against the current state is enough.
    pub fn check_block(&self, block: &Block) -> Vec<IntegrityFault> {
        block
            .transactions
            .iter()
            .flat_map(|tx| self.check_transaction(tx))
            .collect()
    }

    /// Confirm a single transaction, applying whatever can be applied.
    ///
    /// A coin the sender does not own is released rather than moved. When
    /// either wallet is missing no coin moves and every listed coin is
    /// released back to its owner.
    pub fn confirm_transaction(&mut self, tx: &Transaction) -> TransactionReceipt {
        let tx_id = tx.id();
        let fault = |reason| IntegrityFault { tx_id, reason };
        let mut receipt = TransactionReceipt {
            tx_id,
            coins_moved: 0,
            faults: Vec::new(),
        };

        if !self.wallets.contains_key(&tx.from) {
            receipt.faults.push(fault(FaultReason::SenderMissing(tx.from)));
        }
        if !self.wallets.contains_key(&tx.to) {
            receipt.faults.push(fault(FaultReason::ReceiverMissing(tx.to)));
        }
        if !receipt.faults.is_empty() {
            for coin in &tx.coins {
                if let Some(record) = self.circulation.get_mut(coin) {
                    record.release();
                }
            }
            return receipt;
        }

        for coin in &tx.coins {
            let Some(record) = self.circulation.get_mut(coin) else {
                receipt.faults.push(fault(FaultReason::CoinNotFound(*coin)));
                continue;
            };

            let removed = self
                .wallets
                .get_mut(&tx.from)
                .is_some_and(|wallet| wallet.remove_coin(coin));
            if !removed {
                receipt.faults.push(fault(FaultReason::CoinNotOwned {
                    coin: *coin,
                    sender: tx.from,
                }));
                record.release();
                continue;
            }

            let added = self
                .wallets
                .get_mut(&tx.to)
                .is_some_and(|wallet| wallet.add_coin(*coin));
            if !added {
                receipt
                    .faults
                    .push(fault(FaultReason::AlreadyHeldByReceiver(*coin)));
            }

            record.settle(tx.to);
            receipt.coins_moved += 1;
        }

        receipt
    }

    /// Confirm every transaction of a block, in order.
    pub fn confirm_block(&mut self, block: &Block) -> BlockConfirmation {
        let receipts: Vec<_> = block
            .transactions
            .iter()
            .map(|tx| self.confirm_transaction(tx))
            .collect();
        let coins_moved = receipts.iter().map(|r| r.coins_moved).sum();

        BlockConfirmation {
            block_hash: block.hash,
            receipts,
            coins_moved,
        }
    }
}
