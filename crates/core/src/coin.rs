//! Non-fungible coins and their availability state.

use crate::crypto::Address;
use crate::hash::{FieldHasher, Hash};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Whether a coin may be selected for a new transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoinState {
    /// Owned and free to spend.
    Available,
    /// Referenced by a transaction waiting in the pending pool.
    Pending,
}

/// One indivisible unit of value.
///
/// The identity hash is fixed at mint time and is the only lookup key. Coins
/// are never destroyed; ownership changes only through [`Coin::settle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// Identity hash over (created_at, minted_in, lineage).
    pub hash: Hash,
    /// When the coin was minted.
    pub created_at: Timestamp,
    /// Tip block hash at the moment of minting.
    pub minted_in: Hash,
    /// Hash of the coin minted immediately before this one.
    pub lineage: Hash,
    /// Current owner.
    pub owner: Address,
    /// Owner before the last settlement (equal to `owner` right after mint).
    pub previous_owner: Option<Address>,
    /// Availability.
    pub state: CoinState,
}

impl Coin {
    /// Mint a fresh coin for `owner`, chained after `lineage`.
    pub fn mint(lineage: Hash, minted_in: Hash, owner: Address) -> Self {
        Self::mint_at(Timestamp::now(), lineage, minted_in, owner)
    }

    fn mint_at(created_at: Timestamp, lineage: Hash, minted_in: Hash, owner: Address) -> Self {
        Self {
            hash: Self::identity(&created_at, &minted_in, &lineage),
            created_at,
            minted_in,
            lineage,
            owner,
            previous_owner: Some(owner),
            state: CoinState::Available,
        }
    }

    /// The genesis sentinel, identical in every ledger.
    pub fn genesis() -> Self {
        let mut coin = Self::mint_at(Timestamp::EPOCH, Hash::ZERO, Hash::ZERO, Address::ZERO);
        coin.previous_owner = None;
        coin
    }

    /// Compute the identity hash for the given creation inputs.
    pub fn identity(created_at: &Timestamp, minted_in: &Hash, lineage: &Hash) -> Hash {
        FieldHasher::new("coinchain/coin")
            .timestamp(created_at)
            .hash(minted_in)
            .hash(lineage)
            .finalize()
    }

    pub fn is_available(&self) -> bool {
        self.state == CoinState::Available
    }

    /// Mark the coin as held by a pending transaction.
    ///
    /// Callers must only reserve coins that are currently available.
    pub fn reserve(&mut self) {
        self.state = CoinState::Pending;
    }

    /// Return a reserved coin to its owner without a transfer.
    pub fn release(&mut self) {
        self.state = CoinState::Available;
    }

    /// Hand the coin to `new_owner` and make it spendable again.
    pub fn settle(&mut self, new_owner: Address) {
        self.previous_owner = Some(self.owner);
        self.owner = new_owner;
        self.state = CoinState::Available;
    }
}
