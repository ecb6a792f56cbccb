//! Proof-of-work consensus for coinchain.
//!
//! This crate provides:
//! - Parallel, cancellable nonce search with an optional deadline
//! - Transaction validation (structure, signature)
//! - Block validation (hash, parent link, work)
//! - Whole-chain integrity checks that report the first broken block
//!
//! # Example
//!
//! ```rust,no_run
//! use coinchain_consensus::{ChainValidator, Miner, MinerConfig};
//! use coinchain_core::Block;
//!
//! let genesis = Block::genesis();
//! let mut block = Block::seal(vec![], genesis.hash, 1);
//!
//! let miner = Miner::new(MinerConfig::with_difficulty(4));
//! miner.mine(&mut block).unwrap();
//!
//! assert!(ChainValidator::is_valid(&[genesis, block]));
//! ```

pub mod pow;
pub mod validator;

// Re-export commonly used types
pub use pow::{CancelToken, Miner, MinerConfig, MiningError, MiningOutcome, MiningTask, MAX_DIFFICULTY};
pub use validator::{BlockValidator, ChainFault, ChainValidator, TransactionValidator, ValidationError};
