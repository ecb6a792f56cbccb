//! Blake3 hashing utilities for the ledger.

use crate::time::Timestamp;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A named alias for a 32-byte(u8) array, used to represent a 256-bit hash.
pub type H256 = [u8; 32];

/// A wrapper type for H256 with Display and Debug formatting.
///
/// Serializes as lowercase hex text in human-readable formats and as raw
/// bytes otherwise.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash(pub H256);

impl Hash {
    /// The zero hash (all zeros).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Number of hex digits in a rendered hash.
    pub const HEX_LEN: u32 = 64;

    /// Create a new Hash from raw bytes.
    pub fn from_bytes(bytes: H256) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &H256 {
        &self.0
    }

    /// Convert to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Count the `'0'` digits at the start of the hex rendering.
    pub fn leading_zero_digits(&self) -> u32 {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 2;
                continue;
            }
            if byte >> 4 == 0 {
                count += 1;
            }
            break;
        }
        count
    }

    /// Whether the hex rendering starts with at least `difficulty` zero digits.
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        self.leading_zero_digits() >= difficulty
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<H256> for Hash {
    fn from(bytes: H256) -> Self {
        Self(bytes)
    }
}

impl From<Hash> for H256 {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        hex_bytes::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Hash(hex_bytes::deserialize(deserializer)?))
    }
}

/// Serde helpers for fixed-size byte strings: hex text for human-readable
/// formats, a length-prefixed byte string for binary ones.
pub(crate) mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(bytes))
        } else {
            serializer.serialize_bytes(bytes)
        }
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = if deserializer.is_human_readable() {
            let text = String::deserialize(deserializer)?;
            let text = text.strip_prefix("0x").unwrap_or(&text);
            hex::decode(text).map_err(de::Error::custom)?
        } else {
            Vec::<u8>::deserialize(deserializer)?
        };
        <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
            de::Error::custom(format!("expected {} bytes, got {}", N, bytes.len()))
        })
    }
}

/// Hash arbitrary data using Blake3.
pub fn hash(data: &[u8]) -> Hash {
    Hash(blake3::hash(data).into())
}

const TAG_BYTES: u8 = 0x01;
const TAG_STR: u8 = 0x02;
const TAG_U64: u8 = 0x03;
const TAG_HASH: u8 = 0x04;
const TAG_TIME: u8 = 0x05;

/// Content hasher over a sequence of typed fields.
///
/// Every field is written as `tag || len (u64 LE) || bytes`, so two different
/// field sequences can never produce the same input stream. Timestamps are
/// written in their canonical RFC 3339 text form.
///
/// The hasher is `Clone`, which lets the miner absorb the fixed part of a
/// block once and only feed the nonce per attempt.
#[derive(Clone)]
pub struct FieldHasher {
    inner: blake3::Hasher,
}

impl FieldHasher {
    /// Start a hasher under a domain tag (e.g. `"coinchain/block"`).
    pub fn new(domain: &str) -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
        .str(domain)
    }

    fn field(mut self, tag: u8, bytes: &[u8]) -> Self {
        self.inner.update(&[tag]);
        self.inner.update(&(bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
        self
    }

    /// Append a raw byte field.
    pub fn bytes(self, bytes: &[u8]) -> Self {
        self.field(TAG_BYTES, bytes)
    }

    /// Append a text field.
    pub fn str(self, text: &str) -> Self {
        self.field(TAG_STR, text.as_bytes())
    }

    /// Append an integer field.
    pub fn u64(self, value: u64) -> Self {
        self.field(TAG_U64, &value.to_le_bytes())
    }

    /// Append a nested hash.
    pub fn hash(self, value: &Hash) -> Self {
        self.field(TAG_HASH, value.as_bytes())
    }

    /// Append a timestamp in canonical text form.
    pub fn timestamp(self, value: &Timestamp) -> Self {
        self.field(TAG_TIME, value.canonical().as_bytes())
    }

    /// Finish and return the digest.
    pub fn finalize(&self) -> Hash {
        Hash(self.inner.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let data = b"hello world";
        let h1 = hash(data);
        let h2 = hash(data);
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_hash_different_inputs() {
        let h1 = hash(b"hello");
        let h2 = hash(b"world");
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let h = hash(b"test data");
        let hex_str = h.to_hex();
        let parsed = Hash::from_hex(&hex_str).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn test_hash_display() {
        let h = hash(b"test");
        let display = format!("{}", h);
        assert_eq!(display.len(), Hash::HEX_LEN as usize);
        assert!(display.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_zero_hash() {
        assert_eq!(Hash::ZERO.0, [0u8; 32]);
        assert_eq!(Hash::ZERO.leading_zero_digits(), 64);
    }

    #[test]
    fn test_leading_zero_digits() {
        let mut bytes = [0xffu8; 32];
        assert_eq!(Hash(bytes).leading_zero_digits(), 0);

        bytes[0] = 0x0f;
        assert_eq!(Hash(bytes).leading_zero_digits(), 1);

        bytes[0] = 0x00;
        bytes[1] = 0x0a;
        let h = Hash(bytes);
        assert_eq!(h.leading_zero_digits(), 3);
        assert!(h.to_hex().starts_with("000"));
        assert!(h.meets_difficulty(3));
        assert!(!h.meets_difficulty(4));
    }

    #[test]
    fn test_field_hasher_separates_fields() {
        let a = FieldHasher::new("test").str("ab").str("c").finalize();
        let b = FieldHasher::new("test").str("a").str("bc").finalize();
        assert_ne!(a, b);
    }

    #[test]
    fn test_field_hasher_domain_and_type_tags() {
        let a = FieldHasher::new("one").u64(7).finalize();
        let b = FieldHasher::new("two").u64(7).finalize();
        let c = FieldHasher::new("one").bytes(&7u64.to_le_bytes()).finalize();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_field_hasher_clone_continues() {
        let prefix = FieldHasher::new("block").str("fixed");
        let direct = FieldHasher::new("block").str("fixed").u64(42).finalize();
        let via_clone = prefix.clone().u64(42).finalize();
        assert_eq!(direct, via_clone);
        assert_ne!(prefix.finalize(), direct);
    }

    #[test]
    fn test_hash_serde_hex_in_json() {
        let h = hash(b"serde");
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", h.to_hex()));
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn test_hash_serde_binary() {
        let h = hash(b"binary");
        let encoded = bincode::serialize(&h).unwrap();
        let back: Hash = bincode::deserialize(&encoded).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn test_hash_serde_rejects_wrong_length() {
        let result: Result<Hash, _> = serde_json::from_str("\"abcd\"");
        assert!(result.is_err());
    }
}
