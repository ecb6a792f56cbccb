//! Blocks and the proof-of-work seal.

use crate::hash::{FieldHasher, Hash};
use crate::time::Timestamp;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// A sealed, hash-linked batch of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain (0 for genesis).
    pub index: u64,
    /// When the block was assembled.
    pub timestamp: Timestamp,
    /// Transactions confirmed by this block, in pool order.
    pub transactions: Vec<Transaction>,
    /// Hash of the previous block.
    pub previous_hash: Hash,
    /// Content hash, see [`Block::compute_hash`].
    pub hash: Hash,
    /// Proof-of-work nonce.
    pub nonce: u64,
}

impl Block {
    /// Assemble a candidate block with nonce 0.
    pub fn seal(transactions: Vec<Transaction>, previous_hash: Hash, index: u64) -> Self {
        Self::assemble(index, Timestamp::now(), transactions, previous_hash)
    }

    /// The genesis sentinel. Built from constants only, so every ledger
    /// starts from the same hash.
    pub fn genesis() -> Self {
        Self::assemble(0, Timestamp::EPOCH, Vec::new(), Hash::ZERO)
    }

    fn assemble(
        index: u64,
        timestamp: Timestamp,
        transactions: Vec<Transaction>,
        previous_hash: Hash,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            previous_hash,
            hash: Hash::ZERO,
            nonce: 0,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Hasher state with every field except the nonce absorbed.
    pub fn preimage(&self) -> FieldHasher {
        let mut hasher = FieldHasher::new("coinchain/block")
            .u64(self.index)
            .hash(&self.previous_hash)
            .timestamp(&self.timestamp)
            .u64(self.transactions.len() as u64);
        for tx in &self.transactions {
            hasher = hasher.hash(&tx.hash());
        }
        hasher
    }

    /// Finish a preimage with a candidate nonce.
    pub fn finish(preimage: &FieldHasher, nonce: u64) -> Hash {
        preimage.clone().u64(nonce).finalize()
    }

    /// The content hash this block would have with `nonce`.
    pub fn hash_with_nonce(&self, nonce: u64) -> Hash {
        Self::finish(&self.preimage(), nonce)
    }

    /// Recompute the content hash from the stored fields.
    pub fn compute_hash(&self) -> Hash {
        self.hash_with_nonce(self.nonce)
    }

    /// Set the nonce and refresh the stored hash.
    pub fn apply_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.hash = self.compute_hash();
    }

    /// Sequential proof-of-work: bump the nonce until the hash has
    /// `difficulty` leading zero digits. Returns the number of hashes tried.
    ///
    /// Unbounded; a difficulty above 64 never terminates. Use the
    /// consensus `Miner` for parallel or deadline-bound search.
    pub fn mine(&mut self, difficulty: u32) -> u64 {
        let preimage = self.preimage();
        let mut attempts = 1;
        self.hash = Self::finish(&preimage, self.nonce);
        while !self.hash.meets_difficulty(difficulty) {
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = Self::finish(&preimage, self.nonce);
            attempts += 1;
        }
        attempts
    }

    /// Whether the stored hash satisfies `difficulty`.
    pub fn is_mined(&self, difficulty: u32) -> bool {
        self.hash.meets_difficulty(difficulty)
    }

    /// Check if this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == Hash::ZERO
    }

    /// Get the number of transactions in this block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Total coins moved by this block.
    pub fn coin_count(&self) -> usize {
        self.transactions.iter().map(Transaction::coin_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Address, Keypair};
    use crate::hash::hash;

    fn sample_tx() -> Transaction {
        let keypair = Keypair::generate();
        let to = Address::from_bytes([2u8; 20]);
        Transaction::transfer(keypair.address(), to, vec![hash(b"coin")]).signed(&keypair)
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis();

        assert!(genesis.is_genesis());
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, Hash::ZERO);
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis, Block::genesis());
    }

    #[test]
    fn test_seal_computes_hash() {
        let block = Block::seal(vec![sample_tx()], Hash::ZERO, 1);
        assert_eq!(block.nonce, 0);
        assert_eq!(block.hash, block.compute_hash());
        assert_eq!(block.tx_count(), 1);
        assert_eq!(block.coin_count(), 1);
    }

    #[test]
    fn test_block_hash_deterministic() {
        let block = Block::seal(vec![sample_tx()], Hash::ZERO, 1);
        assert_eq!(block.compute_hash(), block.compute_hash());
    }

    #[test]
    fn test_mine_meets_difficulty() {
        for difficulty in 0..=2 {
            let mut block = Block::seal(vec![sample_tx()], Hash::ZERO, 1);
            let attempts = block.mine(difficulty);

            assert!(attempts >= 1);
            assert!(block.is_mined(difficulty));
            assert!(block.hash.to_hex().starts_with(&"0".repeat(difficulty as usize)));
            assert_eq!(block.hash, block.compute_hash());
        }
    }

    #[test]
    fn test_mine_zero_difficulty_keeps_nonce() {
        let mut block = Block::seal(vec![], Hash::ZERO, 1);
        assert_eq!(block.mine(0), 1);
        assert_eq!(block.nonce, 0);
    }

    #[test]
    fn test_field_changes_change_hash() {
        let block = Block::seal(vec![sample_tx()], Hash::ZERO, 1);

        let mut other = block.clone();
        other.index = 2;
        assert_ne!(other.compute_hash(), block.hash);

        let mut other = block.clone();
        other.previous_hash = hash(b"elsewhere");
        assert_ne!(other.compute_hash(), block.hash);

        let mut other = block.clone();
        other.transactions.clear();
        assert_ne!(other.compute_hash(), block.hash);

        let mut other = block.clone();
        other.nonce += 1;
        assert_ne!(other.compute_hash(), block.hash);
    }

    #[test]
    fn test_apply_nonce() {
        let mut block = Block::seal(vec![], Hash::ZERO, 1);
        block.apply_nonce(99);
        assert_eq!(block.nonce, 99);
        assert_eq!(block.hash, block.hash_with_nonce(99));
    }

    #[test]
    fn test_serde_roundtrip_preserves_hash() {
        let mut block = Block::seal(vec![sample_tx()], Hash::ZERO, 1);
        block.mine(1);

        let json = serde_json::to_string(&block).unwrap();
        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
        assert_eq!(back.compute_hash(), block.hash);
    }
}
