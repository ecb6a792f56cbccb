//! Wallet records held in the ledger registry.

use crate::crypto::{Address, CryptoError, PublicKey, Signature};
use crate::hash::Hash;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An account in the ledger.
///
/// The registry only ever sees the public half of the key; spending requires
/// a signature from the matching [`Keypair`](crate::Keypair).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Address derived from `public_key`.
    pub address: Address,
    /// Key that every outgoing transaction must verify against.
    pub public_key: PublicKey,
    /// When the wallet was registered.
    pub created_at: Timestamp,
    /// Identity hashes of the coins this wallet owns.
    ///
    /// Iteration is in hash order, which is what coin selection walks.
    pub coins: BTreeSet<Hash>,
    /// Lowest sequence number a new outgoing transfer may use.
    ///
    /// Advances on admission, so withdrawn transfers keep theirs used.
    pub next_sequence: u64,
}

impl Wallet {
    /// Create an empty wallet for a public key.
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            address: public_key.to_address(),
            public_key,
            created_at: Timestamp::now(),
            coins: BTreeSet::new(),
            next_sequence: 0,
        }
    }

    /// Record a coin as owned. Returns false if it was already listed.
    pub fn add_coin(&mut self, coin: Hash) -> bool {
        self.coins.insert(coin)
    }

    /// Drop a coin from the owned set. Returns false if it was not listed.
    pub fn remove_coin(&mut self, coin: &Hash) -> bool {
        self.coins.remove(coin)
    }

    pub fn owns(&self, coin: &Hash) -> bool {
        self.coins.contains(coin)
    }

    /// Number of coins listed, regardless of state.
    pub fn coin_count(&self) -> usize {
        self.coins.len()
    }

    /// Mark `sequence` as taken by an admitted transfer.
    pub fn consume_sequence(&mut self, sequence: u64) {
        self.next_sequence = self.next_sequence.max(sequence.saturating_add(1));
    }

    /// Check that `signature` over `message` was made by this wallet's key.
    pub fn verify(&self, message: &Hash, signature: &Signature) -> Result<(), CryptoError> {
        self.public_key.verify(message.as_bytes(), signature)
    }
}
