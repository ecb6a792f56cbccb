//! Coin transfer transactions and signing.

use crate::crypto::{Address, Keypair, PublicKey, Signature};
use crate::hash::{FieldHasher, Hash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during transaction operations.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("missing signature")]
    MissingSignature,
}

/// A proposed transfer of specific coins from one wallet to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's address.
    pub from: Address,
    /// Recipient's address.
    pub to: Address,
    /// Sender's sequence number; each value can be confirmed once.
    pub sequence: u64,
    /// Identity hashes of the coins being moved.
    pub coins: Vec<Hash>,
    /// Sender's signature over the signing hash.
    pub signature: Signature,
}

impl Transaction {
    /// Stage an empty, unsigned transfer.
    pub fn stage(from: Address, to: Address) -> Self {
        Self {
            from,
            to,
            sequence: 0,
            coins: Vec::new(),
            signature: Signature::default(),
        }
    }

    /// Create an unsigned transfer of the given coins.
    pub fn transfer(from: Address, to: Address, coins: Vec<Hash>) -> Self {
        Self {
            coins,
            ..Self::stage(from, to)
        }
    }

    /// Set the sender sequence number. Call before signing.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Append a coin to the transfer list. No duplicate check is made here.
    pub fn attach(&mut self, coin: Hash) {
        self.coins.push(coin);
    }

    /// Get the hash of the unsigned transaction (for signing).
    pub fn signing_hash(&self) -> Hash {
        let mut hasher = FieldHasher::new("coinchain/transaction")
            .bytes(self.from.as_ref())
            .bytes(self.to.as_ref())
            .u64(self.sequence)
            .u64(self.coins.len() as u64);
        for coin in &self.coins {
            hasher = hasher.hash(coin);
        }
        hasher.finalize()
    }

    /// Transaction identifier used by the pending pool.
    pub fn id(&self) -> Hash {
        self.signing_hash()
    }

    /// Get the full transaction hash (including signature).
    pub fn hash(&self) -> Hash {
        FieldHasher::new("coinchain/signed-transaction")
            .hash(&self.signing_hash())
            .bytes(self.signature.as_bytes())
            .finalize()
    }

    /// Sign the transaction with the given keypair.
    pub fn sign(&mut self, keypair: &Keypair) {
        let hash = self.signing_hash();
        self.signature = keypair.sign_hash(&hash);
    }

    /// Create a signed transaction.
    pub fn signed(mut self, keypair: &Keypair) -> Self {
        self.sign(keypair);
        self
    }

    /// Verify the transaction signature.
    pub fn verify(&self, public_key: &PublicKey) -> Result<(), TransactionError> {
        if self.signature.is_empty() {
            return Err(TransactionError::MissingSignature);
        }
        let hash = self.signing_hash();
        public_key
            .verify(hash.as_bytes(), &self.signature)
            .map_err(|_| TransactionError::VerificationFailed)
    }

    /// Number of coins moved.
    pub fn coin_count(&self) -> usize {
        self.coins.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash;

    fn coins(n: u8) -> Vec<Hash> {
        (0..n).map(|i| hash(&[i])).collect()
    }

    #[test]
    fn test_stage_and_attach() {
        let from = Address::from_bytes([1u8; 20]);
        let to = Address::from_bytes([2u8; 20]);
        let mut tx = Transaction::stage(from, to);
        assert_eq!(tx.coin_count(), 0);

        for coin in coins(3) {
            tx.attach(coin);
        }
        assert_eq!(tx.coins, coins(3));
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = Keypair::generate();
        let to = Address::from_bytes([2u8; 20]);
        let tx = Transaction::transfer(keypair.address(), to, coins(2)).signed(&keypair);

        assert!(tx.verify(&keypair.public_key).is_ok());
    }

    #[test]
    fn test_unsigned_fails_verification() {
        let keypair = Keypair::generate();
        let to = Address::from_bytes([2u8; 20]);
        let tx = Transaction::transfer(keypair.address(), to, coins(1));

        assert!(matches!(
            tx.verify(&keypair.public_key),
            Err(TransactionError::MissingSignature)
        ));
    }

    #[test]
    fn test_wrong_key_verification_fails() {
        let keypair1 = Keypair::generate();
        let keypair2 = Keypair::generate();
        let to = Address::from_bytes([2u8; 20]);
        let tx = Transaction::transfer(keypair1.address(), to, coins(1)).signed(&keypair1);

        assert!(matches!(
            tx.verify(&keypair2.public_key),
            Err(TransactionError::VerificationFailed)
        ));
    }

    #[test]
    fn test_signature_covers_coins() {
        let keypair = Keypair::generate();
        let to = Address::from_bytes([2u8; 20]);
        let mut tx = Transaction::transfer(keypair.address(), to, coins(2)).signed(&keypair);

        tx.attach(hash(b"smuggled"));
        assert!(tx.verify(&keypair.public_key).is_err());
    }

    #[test]
    fn test_signature_covers_sequence() {
        let keypair = Keypair::generate();
        let to = Address::from_bytes([2u8; 20]);
        let first = Transaction::transfer(keypair.address(), to, coins(1)).signed(&keypair);
        let second = Transaction::transfer(keypair.address(), to, coins(1))
            .with_sequence(1)
            .signed(&keypair);
        assert_ne!(first.id(), second.id());

        let mut bumped = first.clone();
        bumped.sequence = 1;
        assert!(bumped.verify(&keypair.public_key).is_err());
    }

    #[test]
    fn test_id_ignores_signature_but_hash_does_not() {
        let keypair = Keypair::generate();
        let to = Address::from_bytes([2u8; 20]);
        let unsigned = Transaction::transfer(keypair.address(), to, coins(2));
        let signed = unsigned.clone().signed(&keypair);

        assert_eq!(unsigned.id(), signed.id());
        assert_ne!(unsigned.hash(), signed.hash());
    }

    #[test]
    fn test_transaction_hash_deterministic() {
        let keypair = Keypair::generate();
        let to = Address::from_bytes([2u8; 20]);
        let tx = Transaction::transfer(keypair.address(), to, coins(3)).signed(&keypair);

        assert_eq!(tx.hash(), tx.hash());
    }
}
