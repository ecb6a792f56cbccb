//! Reading and writing ledger snapshots on disk.

use anyhow::{Context, Result};
use clap::ValueEnum;
use coinchain_chain::LedgerSnapshot;
use std::fs;
use std::path::Path;

/// On-disk snapshot encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SnapshotFormat {
    /// Pretty-printed JSON with hex hashes and RFC 3339 timestamps.
    Json,
    /// Compact bincode.
    Bincode,
}

pub fn write(path: &Path, snapshot: &LedgerSnapshot, format: SnapshotFormat) -> Result<()> {
    let bytes = match format {
        SnapshotFormat::Json => snapshot.to_json()?.into_bytes(),
        SnapshotFormat::Bincode => bincode::serialize(snapshot)?,
    };
    fs::write(path, bytes)
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))
}

/// Load a snapshot, telling JSON from bincode by the first byte.
pub fn read(path: &Path) -> Result<(LedgerSnapshot, SnapshotFormat)> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read snapshot: {}", path.display()))?;

    let looks_like_json = bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{');

    if looks_like_json {
        let snapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("Malformed JSON snapshot: {}", path.display()))?;
        Ok((snapshot, SnapshotFormat::Json))
    } else {
        let snapshot = bincode::deserialize(&bytes)
            .with_context(|| format!("Malformed bincode snapshot: {}", path.display()))?;
        Ok((snapshot, SnapshotFormat::Bincode))
    }
}
