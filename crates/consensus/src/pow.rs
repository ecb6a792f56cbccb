//! Proof-of-work mining.
//!
//! A block is mined when the hex rendering of its hash starts with
//! `difficulty` zero digits. The search splits the nonce space across rayon
//! workers: worker `i` of `n` tries `i, i + n, i + 2n, ...`. The first worker
//! to hit a valid nonce signals the others to stop, and the winner is
//! re-verified on the calling thread before it is written into the block.

use coinchain_core::{Block, Hash};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Highest meaningful difficulty: a hash has 64 hex digits.
pub const MAX_DIFFICULTY: u32 = Hash::HEX_LEN;

/// Nonces tried per worker between cancellation and deadline checks.
const BATCH_SIZE: u64 = 4096;

/// Errors that can occur while mining.
#[derive(Debug, Error)]
pub enum MiningError {
    #[error("difficulty {0} exceeds the maximum of 64")]
    DifficultyTooHigh(u32),

    #[error("mining timed out after {attempts} attempts")]
    Timeout { attempts: u64 },

    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("winning nonce {nonce} failed re-verification")]
    RecheckFailed { nonce: u64 },

    #[error("failed to start mining worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("mining worker panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, MiningError>;

/// Miner configuration.
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Required count of leading zero hex digits.
    pub difficulty: u32,
    /// Number of parallel search lanes.
    pub workers: usize,
    /// Give up after this long. `None` searches until a nonce is found.
    pub timeout: Option<Duration>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            difficulty: 4,
            workers: rayon::current_num_threads().max(1),
            timeout: None,
        }
    }
}

impl MinerConfig {
    /// Default configuration at the given difficulty.
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }
}

/// Cooperative stop signal shared with running workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every worker holding this token to stop at its next batch.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Statistics of a successful search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningOutcome {
    /// The accepted nonce.
    pub nonce: u64,
    /// The resulting block hash.
    pub hash: Hash,
    /// Hashes evaluated across all workers (approximate for parallel runs).
    pub attempts: u64,
    /// Wall-clock search time.
    pub elapsed: Duration,
}

/// Parallel proof-of-work miner.
#[derive(Debug, Clone, Default)]
pub struct Miner {
    config: MinerConfig,
}

impl Miner {
    pub fn new(config: MinerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    /// Mine `block` in place.
    pub fn mine(&self, block: &mut Block) -> Result<MiningOutcome> {
        self.mine_with(block, &CancelToken::new())
    }

    /// Mine `block` in place, stopping early if `cancel` fires.
    ///
    /// On error the block is left unchanged.
    pub fn mine_with(&self, block: &mut Block, cancel: &CancelToken) -> Result<MiningOutcome> {
        let difficulty = self.config.difficulty;
        if difficulty > MAX_DIFFICULTY {
            return Err(MiningError::DifficultyTooHigh(difficulty));
        }

        let started = Instant::now();
        debug!(index = block.index, difficulty, workers = self.config.workers, "mining started");

        if difficulty == 0 {
            block.apply_nonce(0);
            return Ok(MiningOutcome {
                nonce: 0,
                hash: block.hash,
                attempts: 1,
                elapsed: started.elapsed(),
            });
        }

        let preimage = block.preimage();
        let deadline = self.config.timeout.map(|timeout| started + timeout);
        let workers = self.config.workers.max(1);
        let stride = workers as u64;

        let winner = OnceLock::<u64>::new();
        let attempts = AtomicU64::new(0);
        let expired = AtomicBool::new(false);

        (0..workers).into_par_iter().for_each(|lane| {
            let mut nonce = lane as u64;
            loop {
                if winner.get().is_some() || cancel.is_cancelled() || expired.load(Ordering::Relaxed)
                {
                    return;
                }
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    expired.store(true, Ordering::Relaxed);
                    return;
                }

                for tried in 1..=BATCH_SIZE {
                    if Block::finish(&preimage, nonce).meets_difficulty(difficulty) {
                        let _ = winner.set(nonce);
                        attempts.fetch_add(tried, Ordering::Relaxed);
                        return;
                    }
                    nonce = nonce.wrapping_add(stride);
                }
                attempts.fetch_add(BATCH_SIZE, Ordering::Relaxed);
            }
        });

        let attempts = attempts.load(Ordering::Relaxed);
        let Some(&nonce) = winner.get() else {
            if cancel.is_cancelled() {
                warn!(index = block.index, attempts, "mining cancelled");
                return Err(MiningError::Cancelled { attempts });
            }
            warn!(index = block.index, attempts, "mining timed out");
            return Err(MiningError::Timeout { attempts });
        };

        // Re-verify sequentially before touching the block.
        let hash = block.hash_with_nonce(nonce);
        if !hash.meets_difficulty(difficulty) {
            return Err(MiningError::RecheckFailed { nonce });
        }
        block.nonce = nonce;
        block.hash = hash;

        let elapsed = started.elapsed();
        info!(
            index = block.index,
            hash = %hash,
            nonce,
            attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "block mined"
        );

        Ok(MiningOutcome {
            nonce,
            hash,
            attempts,
            elapsed,
        })
    }

    /// Mine `block` on a dedicated thread.
    pub fn spawn(&self, block: Block) -> Result<MiningTask> {
        let miner = self.clone();
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = thread::Builder::new()
            .name(format!("coinchain-miner-{}", block.index))
            .spawn(move || {
                let mut block = block;
                let outcome = miner.mine_with(&mut block, &token)?;
                Ok((block, outcome))
            })?;
        Ok(MiningTask { cancel, handle })
    }
}

/// A search running on its own thread.
pub struct MiningTask {
    cancel: CancelToken,
    handle: JoinHandle<Result<(Block, MiningOutcome)>>,
}

impl MiningTask {
    /// Request the search to stop. `join` then returns `Cancelled`
    /// unless a nonce was already found.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the search and return the mined block.
    pub fn join(self) -> Result<(Block, MiningOutcome)> {
        self.handle.join().map_err(|_| MiningError::WorkerPanicked)?
    }
}
