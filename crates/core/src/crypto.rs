//! Ed25519 keys, wallet addresses and transaction signatures.
//!
//! A wallet is known to the ledger only by its public key; the address is
//! the first 20 bytes of the key's Blake3 hash. Keys are usually rebuilt
//! from the two seeds a wallet was created with.

use crate::hash::{hash, hex_bytes, FieldHasher, Hash};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Errors raised while deriving keys or checking signatures.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("wallet seed must not be empty")]
    EmptySeed,
    #[error("bytes are not a valid ed25519 public key")]
    InvalidPublicKey,
    #[error("signature does not match the wallet key")]
    BadSignature,
}

/// Wallet address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Address(#[serde(with = "hex_bytes")] pub [u8; 20]);

impl Address {
    /// Owner of the genesis coin.
    pub const ZERO: Self = Self([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Ed25519 signature bytes. All zeros marks an unsigned transaction.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "hex_bytes")] pub [u8; 64]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 64]
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0[..8]))
    }
}

/// The verifying half of a wallet key.
#[derive(Clone)]
pub struct PublicKey(pub VerifyingKey);

impl PublicKey {
    pub fn to_address(&self) -> Address {
        let digest = hash(self.0.as_bytes());
        let mut address = [0u8; 20];
        address.copy_from_slice(&digest.as_bytes()[..20]);
        Address(address)
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(bytes)
            .map(PublicKey)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        self.0
            .verify(message, &DalekSignature::from_bytes(&signature.0))
            .map_err(|_| CryptoError::BadSignature)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hex_bytes::serialize(self.0.as_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: [u8; 32] = hex_bytes::deserialize(deserializer)?;
        PublicKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", hex::encode(&self.0.as_bytes()[..8]))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes() == other.0.as_bytes()
    }
}

impl Eq for PublicKey {}

/// Signing key plus its public half. Never stored by the ledger.
pub struct Keypair {
    signing_key: SigningKey,
    pub public_key: PublicKey,
}

impl Keypair {
    /// Fresh random key, for wallets registered with
    /// `Ledger::register_wallet`.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Derive a keypair deterministically from two caller-held seeds.
    ///
    /// Anyone holding both seeds can rebuild the key, so the seeds are the
    /// wallet credential. The first seed must be non-empty.
    pub fn from_seeds(seed1: &str, seed2: &str) -> Result<Self, CryptoError> {
        if seed1.is_empty() {
            return Err(CryptoError::EmptySeed);
        }
        let secret = FieldHasher::new("coinchain/wallet-seed")
            .str(seed1)
            .str(seed2)
            .finalize();
        Ok(Self::from_signing_key(SigningKey::from_bytes(secret.as_bytes())))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = PublicKey(signing_key.verifying_key());
        Self {
            signing_key,
            public_key,
        }
    }

    pub fn address(&self) -> Address {
        self.public_key.to_address()
    }

    /// Sign a 32-byte digest.
    pub fn sign_hash(&self, digest: &Hash) -> Signature {
        Signature(self.signing_key.sign(digest.as_bytes()).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish()
    }
}
