//! Ledger orchestration for coinchain.
//!
//! This crate brings the core types and proof of work together into a
//! working ledger:
//! - **Ledger**: wallet registry, coin circulation, chain, sealing
//! - **Mempool**: pending transactions and the coins they reserve
//! - **Confirmation**: applying sealed transfers to wallets and coins
//! - **Snapshot**: serializable ledger state
//! - **Service**: a lock-guarded handle that mines outside the lock
//!
//! # Example
//!
//! ```rust,no_run
//! use coinchain_chain::{Ledger, LedgerConfig};
//! use coinchain_core::Keypair;
//!
//! let mut ledger = Ledger::new(LedgerConfig::with_difficulty(4)).unwrap();
//! let alice = ledger.mint("alice", "secret", 5).unwrap();
//! let bob = ledger.mint("bob", "secret", 0).unwrap();
//!
//! let signer = Keypair::from_seeds("alice", "secret").unwrap();
//! ledger.transfer(&alice.address, &signer, &bob.address, 2).unwrap();
//! ledger.seal_block().unwrap();
//!
//! assert_eq!(ledger.balance_of(&bob.address), 2);
//! assert!(ledger.is_valid());
//! ```

pub mod circulation;
pub mod config;
pub mod confirmation;
pub mod ledger;
pub mod mempool;
pub mod service;
pub mod snapshot;

// Re-export commonly used types
pub use circulation::Circulation;
pub use config::{ConfigError, IntegrityPolicy, LedgerConfig};
pub use confirmation::{BlockConfirmation, Confirmer, FaultReason, IntegrityFault, TransactionReceipt};
pub use ledger::{Ledger, LedgerError, LedgerStats, SealReceipt, SealTicket};
pub use mempool::{Mempool, MempoolConfig, MempoolError, MempoolStats};
pub use service::{LedgerService, PendingSeal};
pub use snapshot::LedgerSnapshot;
