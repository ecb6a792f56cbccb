//! Transaction, block and chain validation rules.

use coinchain_core::{Block, Hash, PublicKey, Transaction};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("transaction signature verification failed")]
    InvalidSignature,

    #[error("transaction moves no coins")]
    EmptyTransaction,

    #[error("coin {0} listed more than once")]
    DuplicateCoin(Hash),

    #[error("chain is empty")]
    EmptyChain,

    #[error("genesis block differs from the sentinel")]
    GenesisMismatch,

    #[error("block index mismatch (expected {expected}, got {got})")]
    InvalidIndex { expected: u64, got: u64 },

    #[error("block previous_hash mismatch")]
    InvalidPrevHash,

    #[error("stored block hash does not match its contents")]
    HashMismatch,

    #[error("block hash does not meet difficulty {0}")]
    InsufficientWork(u32),
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// The first block that breaks the chain, and why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chain invalid at block {index}: {reason}")]
pub struct ChainFault {
    pub index: u64,
    pub reason: ValidationError,
}

/// Transaction validator.
pub struct TransactionValidator;

impl TransactionValidator {
    /// Structural checks: at least one coin, no coin listed twice.
    pub fn validate_transaction(tx: &Transaction) -> Result<()> {
        if tx.coins.is_empty() {
            return Err(ValidationError::EmptyTransaction);
        }

        let mut seen = HashSet::with_capacity(tx.coins.len());
        for coin in &tx.coins {
            if !seen.insert(coin) {
                return Err(ValidationError::DuplicateCoin(*coin));
            }
        }

        Ok(())
    }

    /// Structural checks plus signature verification against the sender key.
    pub fn validate_with_signature(tx: &Transaction, public_key: &PublicKey) -> Result<()> {
        tx.verify(public_key)
            .map_err(|_| ValidationError::InvalidSignature)?;

        Self::validate_transaction(tx)?;

        Ok(())
    }
}

/// Block validator.
pub struct BlockValidator;

impl BlockValidator {
    /// The stored hash must equal the recomputed content hash.
    pub fn validate_hash(block: &Block) -> Result<()> {
        if block.compute_hash() != block.hash {
            return Err(ValidationError::HashMismatch);
        }
        Ok(())
    }

    /// The block must directly follow `parent`.
    pub fn validate_link(block: &Block, parent: &Block) -> Result<()> {
        if block.previous_hash != parent.hash {
            return Err(ValidationError::InvalidPrevHash);
        }

        let expected = parent.index + 1;
        if block.index != expected {
            return Err(ValidationError::InvalidIndex {
                expected,
                got: block.index,
            });
        }

        Ok(())
    }

    /// The stored hash must carry enough leading zero digits.
    pub fn validate_work(block: &Block, difficulty: u32) -> Result<()> {
        if !block.is_mined(difficulty) {
            return Err(ValidationError::InsufficientWork(difficulty));
        }
        Ok(())
    }

    /// Everything a freshly mined block must satisfy before it is appended.
    pub fn validate_full(block: &Block, parent: &Block, difficulty: u32) -> Result<()> {
        Self::validate_hash(block)?;
        Self::validate_link(block, parent)?;
        Self::validate_work(block, difficulty)?;

        let mut seen = HashSet::new();
        for tx in &block.transactions {
            TransactionValidator::validate_transaction(tx)?;
            for coin in &tx.coins {
                if !seen.insert(*coin) {
                    return Err(ValidationError::DuplicateCoin(*coin));
                }
            }
        }

        Ok(())
    }
}

/// Whole-chain integrity check.
pub struct ChainValidator;

impl ChainValidator {
    /// Walk the chain and report the first broken block.
    ///
    /// Genesis must equal the sentinel. Every later block must hash to its
    /// stored hash and point at the stored hash of its predecessor.
    pub fn validate(chain: &[Block]) -> std::result::Result<(), ChainFault> {
        let Some(genesis) = chain.first() else {
            return Err(ChainFault {
                index: 0,
                reason: ValidationError::EmptyChain,
            });
        };
        if *genesis != Block::genesis() {
            return Err(ChainFault {
                index: 0,
                reason: ValidationError::GenesisMismatch,
            });
        }

        for (position, pair) in chain.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let fault = |reason| ChainFault {
                index: position as u64 + 1,
                reason,
            };

            Self::check_block(current, previous).map_err(fault)?;
        }

        Ok(())
    }

    fn check_block(current: &Block, previous: &Block) -> Result<()> {
        BlockValidator::validate_hash(current)?;
        BlockValidator::validate_link(current, previous)
    }

    pub fn is_valid(chain: &[Block]) -> bool {
        Self::validate(chain).is_ok()
    }
}
