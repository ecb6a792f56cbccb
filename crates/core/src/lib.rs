//! Core ledger primitives for coinchain.
//!
//! This crate provides the fundamental types used throughout the ledger:
//! - Content hashing and canonical timestamps
//! - Ed25519 keys, addresses and signatures
//! - Coins and wallets
//! - Transactions
//! - Blocks and sequential proof-of-work

pub mod block;
pub mod coin;
pub mod crypto;
pub mod hash;
pub mod time;
pub mod transaction;
pub mod wallet;

// Re-export commonly used types at the crate root
pub use block::Block;
pub use coin::{Coin, CoinState};
pub use crypto::{Address, CryptoError, Keypair, PublicKey, Signature};
pub use hash::{hash, FieldHasher, Hash, H256};
pub use time::Timestamp;
pub use transaction::{Transaction, TransactionError};
pub use wallet::Wallet;
