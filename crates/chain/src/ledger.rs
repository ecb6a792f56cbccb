//! The ledger aggregate.
//!
//! Owns the chain, the wallet registry, every coin in circulation and the
//! pending pool. All mutation goes through the methods here; a seal is a
//! three-step affair (begin, mine, commit) so the expensive middle step can
//! run without holding the ledger.

use crate::circulation::Circulation;
use crate::config::{ConfigError, IntegrityPolicy, LedgerConfig};
use crate::confirmation::{BlockConfirmation, Confirmer, IntegrityFault};
use crate::mempool::{Mempool, MempoolError, MempoolStats};
use coinchain_consensus::{
    BlockValidator, ChainFault, ChainValidator, Miner, MiningError, TransactionValidator,
    ValidationError,
};
use coinchain_core::{
    Address, Block, Coin, CryptoError, Hash, Keypair, PublicKey, Transaction, Wallet,
};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("wallet not found: {0}")]
    WalletNotFound(Address),

    #[error("wallet already registered: {0}")]
    WalletExists(Address),

    #[error("wallet creation failed: {0}")]
    WalletCreationFailed(#[source] CryptoError),

    #[error("insufficient balance (required {required}, available {available})")]
    InsufficientBalance { required: usize, available: usize },

    #[error("not authorized to spend from {0}")]
    NotAuthorized(Address),

    #[error("transfer must move at least one coin")]
    ZeroAmount,

    #[error("coin not found: {0}")]
    CoinNotFound(Hash),

    #[error("coin {0} is not available to the sender")]
    CoinUnavailable(Hash),

    #[error("sequence {sequence} already used by the sender (next is {next})")]
    StaleSequence { sequence: u64, next: u64 },

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("mempool error: {0}")]
    Mempool(#[from] MempoolError),

    #[error("a block seal is already in progress")]
    SealInProgress,

    #[error("seal ticket does not match the open seal")]
    StaleSeal,

    #[error("mining timed out after {attempts} attempts")]
    MiningTimeout { attempts: u64 },

    #[error("mining error: {0}")]
    Mining(MiningError),

    #[error("integrity check failed with {} fault(s)", .0.len())]
    Integrity(Vec<IntegrityFault>),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid snapshot: {0}")]
    Snapshot(String),

    #[error("ledger lock poisoned")]
    Poisoned,
}

impl From<MiningError> for LedgerError {
    fn from(err: MiningError) -> Self {
        match err {
            MiningError::Timeout { attempts } => LedgerError::MiningTimeout { attempts },
            other => LedgerError::Mining(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// A pending-pool capture handed out by [`Ledger::begin_seal`].
///
/// The candidate block carries the captured transactions and still needs
/// proof of work before it can be committed.
#[derive(Debug, Clone)]
pub struct SealTicket {
    id: u64,
    tx_ids: Vec<Hash>,
    candidate: Block,
}

impl SealTicket {
    /// Unmined block over the captured transactions.
    pub fn candidate(&self) -> &Block {
        &self.candidate
    }

    pub fn tx_ids(&self) -> &[Hash] {
        &self.tx_ids
    }
}

/// What a committed seal produced.
#[derive(Debug, Clone)]
pub struct SealReceipt {
    /// The appended block.
    pub block: Block,
    /// Per-transaction confirmation results.
    pub confirmation: BlockConfirmation,
}

impl SealReceipt {
    pub fn faults(&self) -> Vec<IntegrityFault> {
        self.confirmation.faults().cloned().collect()
    }
}

/// Ledger statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStats {
    /// Index of the latest block.
    pub height: u64,
    /// Hash of the latest block.
    pub tip_hash: Hash,
    /// Registered wallets.
    pub wallets: usize,
    /// Coins minted to wallets.
    pub total_supply: usize,
    /// Transactions waiting in the pool.
    pub pending_transactions: usize,
    /// Coins held by pending transactions.
    pub reserved_coins: usize,
    /// Current mining difficulty.
    pub difficulty: u32,
}

/// Single-node coin ledger.
pub struct Ledger {
    pub(crate) config: LedgerConfig,
    /// Never empty; index 0 is the genesis sentinel.
    pub(crate) chain: Vec<Block>,
    pub(crate) wallets: BTreeMap<Address, Wallet>,
    pub(crate) circulation: Circulation,
    pub(crate) mempool: Mempool,
    open_seal: Option<u64>,
    seal_counter: u64,
}

impl Ledger {
    /// Create a ledger holding only the genesis block and genesis coin.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        info!(difficulty = config.difficulty, integrity = ?config.integrity, "ledger created");

        Ok(Self::assemble(
            config,
            vec![Block::genesis()],
            BTreeMap::new(),
            Circulation::new(),
        ))
    }

    pub(crate) fn assemble(
        config: LedgerConfig,
        chain: Vec<Block>,
        wallets: BTreeMap<Address, Wallet>,
        circulation: Circulation,
    ) -> Self {
        let mempool = Mempool::with_config(config.mempool_config());
        Self {
            config,
            chain,
            wallets,
            circulation,
            mempool,
            open_seal: None,
            seal_counter: 0,
        }
    }

    /// Derive a wallet from two seeds and mint `count` coins into it.
    pub fn mint(&mut self, seed1: &str, seed2: &str, count: usize) -> Result<Wallet> {
        let keypair =
            Keypair::from_seeds(seed1, seed2).map_err(LedgerError::WalletCreationFailed)?;
        self.register_wallet(keypair.public_key, count)
    }

    /// Register a wallet for `public_key` and mint `count` coins into it.
    pub fn register_wallet(&mut self, public_key: PublicKey, count: usize) -> Result<Wallet> {
        let address = public_key.to_address();
        if self.wallets.contains_key(&address) {
            return Err(LedgerError::WalletExists(address));
        }

        let mut wallet = Wallet::new(public_key);
        let minted_in = self.latest_block().hash;
        for _ in 0..count {
            let lineage = self.circulation.last().map_or(Hash::ZERO, |coin| coin.hash);
            let coin = Coin::mint(lineage, minted_in, address);
            wallet.add_coin(coin.hash);
            self.circulation.push(coin);
        }

        info!(address = %address, coins = count, "wallet minted");
        self.wallets.insert(address, wallet.clone());
        Ok(wallet)
    }

    /// Build, sign and admit a transfer of `count` available coins.
    ///
    /// Coins are picked in identity-hash order. Nothing is reserved unless
    /// every check passes.
    pub fn transfer(
        &mut self,
        sender: &Address,
        signer: &Keypair,
        receiver: &Address,
        count: usize,
    ) -> Result<Hash> {
        if count == 0 {
            return Err(LedgerError::ZeroAmount);
        }

        let wallet = self
            .wallets
            .get(sender)
            .ok_or(LedgerError::WalletNotFound(*sender))?;
        if !self.wallets.contains_key(receiver) {
            return Err(LedgerError::WalletNotFound(*receiver));
        }

        let selected: Vec<Hash> = wallet
            .coins
            .iter()
            .filter(|coin| self.is_spendable(coin))
            .take(count)
            .copied()
            .collect();
        if selected.len() < count {
            return Err(LedgerError::InsufficientBalance {
                required: count,
                available: self.balance_of(sender),
            });
        }

        let mut tx =
            Transaction::stage(*sender, *receiver).with_sequence(self.next_sequence(sender));
        for coin in selected {
            tx.attach(coin);
        }
        tx.sign(signer);
        Self::authorize(&tx, wallet)?;

        self.admit(tx)
    }

    /// Admit a transaction built and signed elsewhere.
    pub fn submit(&mut self, tx: Transaction) -> Result<Hash> {
        let wallet = self.vet_parties(&tx)?;

        let next = wallet.next_sequence;
        if tx.sequence < next {
            return Err(LedgerError::StaleSequence {
                sequence: tx.sequence,
                next,
            });
        }
        self.vet_coins(&tx, wallet)?;

        self.admit(tx)
    }

    /// Put a transaction from a saved pool back into this one.
    ///
    /// Same checks as [`submit`](Self::submit), except the sequence number
    /// must already be used up by the sender.
    pub(crate) fn readmit(&mut self, tx: Transaction) -> Result<Hash> {
        let wallet = self.vet_parties(&tx)?;
        if tx.sequence >= wallet.next_sequence {
            return Err(LedgerError::Snapshot(format!(
                "sequence {} was never issued by {}",
                tx.sequence, tx.from
            )));
        }
        self.vet_coins(&tx, wallet)?;

        self.admit(tx)
    }

    /// Both wallets exist and the sender signed.
    fn vet_parties(&self, tx: &Transaction) -> Result<&Wallet> {
        let wallet = self
            .wallets
            .get(&tx.from)
            .ok_or(LedgerError::WalletNotFound(tx.from))?;
        if !self.wallets.contains_key(&tx.to) {
            return Err(LedgerError::WalletNotFound(tx.to));
        }
        Self::authorize(tx, wallet)?;
        Ok(wallet)
    }

    /// Every listed coin is the sender's and free to spend.
    fn vet_coins(&self, tx: &Transaction, wallet: &Wallet) -> Result<()> {
        for coin in &tx.coins {
            let record = self
                .circulation
                .get(coin)
                .ok_or(LedgerError::CoinNotFound(*coin))?;
            if record.owner != tx.from || !wallet.owns(coin) || !self.is_spendable(coin) {
                return Err(LedgerError::CoinUnavailable(*coin));
            }
        }
        Ok(())
    }

    /// Lowest sequence number a new transfer from `sender` may carry.
    ///
    /// Every admitted transfer uses up its number, whether it is later
    /// confirmed or withdrawn, so a signed transfer is admitted at most once.
    pub fn next_sequence(&self, sender: &Address) -> u64 {
        self.wallets
            .get(sender)
            .map_or(0, |wallet| wallet.next_sequence)
    }

    /// Pull a pending transaction back out of the pool, freeing its coins.
    ///
    /// Only the sender may withdraw, and not while a seal holds it.
    pub fn withdraw(&mut self, tx_id: &Hash, signer: &Keypair) -> Result<Transaction> {
        let sender = self
            .mempool
            .get(tx_id)
            .map(|tx| tx.from)
            .ok_or(LedgerError::Mempool(MempoolError::TransactionNotFound))?;
        let wallet = self
            .wallets
            .get(&sender)
            .ok_or(LedgerError::WalletNotFound(sender))?;
        wallet
            .verify(tx_id, &signer.sign_hash(tx_id))
            .map_err(|_| LedgerError::NotAuthorized(sender))?;

        let tx = self.evict(tx_id)?;
        debug!(tx = %tx_id, sender = %sender, "transaction withdrawn");
        Ok(tx)
    }

    /// Drop a pending transaction without a signature check.
    ///
    /// Operator escape hatch for transactions a strict seal keeps refusing.
    pub fn evict(&mut self, tx_id: &Hash) -> Result<Transaction> {
        let tx = self.mempool.remove(tx_id)?;
        for coin in &tx.coins {
            if let Some(record) = self.circulation.get_mut(coin) {
                record.release();
            }
        }
        debug!(tx = %tx_id, coins = tx.coin_count(), "transaction evicted");
        Ok(tx)
    }

    fn authorize(tx: &Transaction, wallet: &Wallet) -> Result<()> {
        TransactionValidator::validate_with_signature(tx, &wallet.public_key).map_err(|err| {
            match err {
                ValidationError::InvalidSignature => LedgerError::NotAuthorized(tx.from),
                other => LedgerError::Validation(other),
            }
        })
    }

    fn is_spendable(&self, coin: &Hash) -> bool {
        self.circulation.get(coin).is_some_and(Coin::is_available)
            && !self.mempool.contains_coin(coin)
    }

    fn admit(&mut self, tx: Transaction) -> Result<Hash> {
        let (from, to, coins, sequence) = (tx.from, tx.to, tx.coin_count(), tx.sequence);
        let tx_id = self.mempool.add(tx)?;

        if let Some(wallet) = self.wallets.get_mut(&from) {
            wallet.consume_sequence(sequence);
        }

        if let Some(tx) = self.mempool.get(&tx_id) {
            for coin in &tx.coins {
                if let Some(record) = self.circulation.get_mut(coin) {
                    record.reserve();
                }
            }
        }

        debug!(tx = %tx_id, from = %from, to = %to, coins, sequence, "transaction admitted");
        Ok(tx_id)
    }

    /// Capture the pending pool into a candidate block.
    ///
    /// The pool itself is untouched: captured transactions stay pending
    /// until [`commit_seal`](Self::commit_seal) and new admissions keep
    /// working meanwhile.
    pub fn begin_seal(&mut self) -> Result<SealTicket> {
        if self.open_seal.is_some() {
            return Err(LedgerError::SealInProgress);
        }

        let transactions = self.mempool.begin_seal();
        let tx_ids: Vec<Hash> = transactions.iter().map(Transaction::id).collect();
        let tip = self.latest_block();
        let candidate = Block::seal(transactions, tip.hash, tip.index + 1);

        self.seal_counter += 1;
        self.open_seal = Some(self.seal_counter);
        debug!(index = candidate.index, transactions = tx_ids.len(), "seal started");

        Ok(SealTicket {
            id: self.seal_counter,
            tx_ids,
            candidate,
        })
    }

    /// Append a mined block for an open seal and confirm its transfers.
    pub fn commit_seal(&mut self, ticket: SealTicket, block: Block) -> Result<SealReceipt> {
        self.check_ticket(&ticket)?;

        let same_transactions = block.transactions.len() == ticket.tx_ids.len()
            && block
                .transactions
                .iter()
                .map(Transaction::id)
                .eq(ticket.tx_ids.iter().copied());
        if !same_transactions {
            self.close_seal();
            return Err(LedgerError::StaleSeal);
        }

        if let Err(err) =
            BlockValidator::validate_full(&block, self.latest_block(), self.config.difficulty)
        {
            error!(index = block.index, error = %err, "mined block rejected");
            self.close_seal();
            return Err(err.into());
        }

        if self.config.integrity == IntegrityPolicy::Strict {
            let faults =
                Confirmer::new(&mut self.wallets, &mut self.circulation).check_block(&block);
            if !faults.is_empty() {
                for fault in &faults {
                    error!(index = block.index, fault = %fault, "integrity fault");
                }
                self.close_seal();
                return Err(LedgerError::Integrity(faults));
            }
        }

        let confirmation =
            Confirmer::new(&mut self.wallets, &mut self.circulation).confirm_block(&block);
        for fault in confirmation.faults() {
            warn!(index = block.index, fault = %fault, "transaction partially confirmed");
        }

        self.mempool.commit_seal(&ticket.tx_ids);
        self.open_seal = None;
        self.chain.push(block.clone());

        info!(
            index = block.index,
            hash = %block.hash,
            nonce = block.nonce,
            transactions = block.tx_count(),
            coins = confirmation.coins_moved,
            "block appended"
        );

        Ok(SealReceipt {
            block,
            confirmation,
        })
    }

    /// Give up on an open seal. The pool keeps every transaction.
    pub fn abort_seal(&mut self, ticket: SealTicket) -> Result<()> {
        self.check_ticket(&ticket)?;
        self.close_seal();
        debug!(index = ticket.candidate.index, "seal aborted");
        Ok(())
    }

    /// Seal the pending pool into a new block on the calling thread.
    pub fn seal_block(&mut self) -> Result<SealReceipt> {
        let ticket = self.begin_seal()?;
        let mut block = ticket.candidate.clone();

        match self.miner().mine(&mut block) {
            Ok(_) => self.commit_seal(ticket, block),
            Err(err) => {
                self.abort_seal(ticket)?;
                Err(err.into())
            }
        }
    }

    pub fn is_sealing(&self) -> bool {
        self.open_seal.is_some()
    }

    /// Abort whatever seal is open, with or without its ticket.
    ///
    /// Returns false when no seal was open. A ticket for the aborted seal is
    /// stale afterwards.
    pub fn abort_open_seal(&mut self) -> bool {
        if self.open_seal.is_none() {
            return false;
        }
        self.close_seal();
        warn!("open seal abandoned");
        true
    }

    fn check_ticket(&self, ticket: &SealTicket) -> Result<()> {
        if self.open_seal != Some(ticket.id) {
            return Err(LedgerError::StaleSeal);
        }
        Ok(())
    }

    fn close_seal(&mut self) {
        self.mempool.abort_seal();
        self.open_seal = None;
    }

    /// Miner configured from this ledger's settings.
    pub fn miner(&self) -> Miner {
        Miner::new(self.config.miner_config())
    }

    /// Count of the wallet's coins that are available to spend.
    ///
    /// Unknown addresses have a balance of zero.
    pub fn balance_of(&self, address: &Address) -> usize {
        self.wallets.get(address).map_or(0, |wallet| {
            wallet
                .coins
                .iter()
                .filter(|coin| self.circulation.get(coin).is_some_and(Coin::is_available))
                .count()
        })
    }

    /// Re-derive every block hash and link, reporting the first break.
    pub fn validate_chain(&self) -> std::result::Result<(), ChainFault> {
        ChainValidator::validate(&self.chain)
    }

    pub fn is_valid(&self) -> bool {
        self.validate_chain().is_ok()
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn latest_block(&self) -> &Block {
        &self.chain[self.chain.len() - 1]
    }

    /// Index of the latest block.
    pub fn height(&self) -> u64 {
        self.latest_block().index
    }

    pub fn block(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.chain.get(i))
    }

    pub fn wallet(&self, address: &Address) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    /// Registered wallets in address order.
    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values()
    }

    pub fn coin(&self, hash: &Hash) -> Option<&Coin> {
        self.circulation.get(hash)
    }

    /// Coin records listed by a wallet.
    pub fn coins_of(&self, address: &Address) -> Vec<&Coin> {
        self.wallets
            .get(address)
            .map(|wallet| {
                wallet
                    .coins
                    .iter()
                    .filter_map(|coin| self.circulation.get(coin))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every coin ever minted, genesis sentinel first.
    pub fn circulation(&self) -> &[Coin] {
        self.circulation.as_slice()
    }

    /// Coins minted to wallets; the genesis sentinel is not counted.
    pub fn total_supply(&self) -> usize {
        self.circulation.len().saturating_sub(1)
    }

    /// Pending transactions in admission order.
    pub fn pending(&self) -> Vec<Transaction> {
        self.mempool.pending()
    }

    /// Pending transactions sent by `address`, oldest first.
    pub fn pending_from(&self, address: &Address) -> Vec<Transaction> {
        self.mempool.get_by_sender(address)
    }

    pub fn pending_transaction(&self, tx_id: &Hash) -> Option<&Transaction> {
        self.mempool.get(tx_id)
    }

    pub fn mempool_stats(&self) -> MempoolStats {
        self.mempool.stats()
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn stats(&self) -> LedgerStats {
        let tip = self.latest_block();
        let mempool = self.mempool.stats();
        LedgerStats {
            height: tip.index,
            tip_hash: tip.hash,
            wallets: self.wallets.len(),
            total_supply: self.total_supply(),
            pending_transactions: mempool.total_transactions,
            reserved_coins: mempool.reserved_coins,
            difficulty: self.config.difficulty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirmation::FaultReason;
    use coinchain_core::CoinState;

    fn ledger() -> Ledger {
        Ledger::new(LedgerConfig::with_difficulty(1)).unwrap()
    }

    fn minted(ledger: &mut Ledger, seed: &str, count: usize) -> Keypair {
        let keypair = Keypair::from_seeds(seed, "pw").unwrap();
        ledger.mint(seed, "pw", count).unwrap();
        keypair
    }

    #[test]
    fn test_new_ledger_has_genesis() {
        let ledger = ledger();
        assert_eq!(ledger.chain(), &[Block::genesis()]);
        assert_eq!(ledger.circulation(), &[Coin::genesis()]);
        assert_eq!(ledger.total_supply(), 0);
        assert!(ledger.is_valid());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            Ledger::new(LedgerConfig::with_difficulty(65)),
            Err(LedgerError::Config(_))
        ));
    }

    #[test]
    fn test_mint_chains_lineage() {
        let mut ledger = ledger();
        let alice = minted(&mut ledger, "alice", 3);

        assert_eq!(ledger.balance_of(&alice.address()), 3);
        let coins = ledger.circulation();
        assert_eq!(coins.len(), 4);
        for pair in coins.windows(2) {
            assert_eq!(pair[1].lineage, pair[0].hash);
            assert_eq!(pair[1].minted_in, Block::genesis().hash);
        }
    }

    #[test]
    fn test_mint_rejects_empty_seed_and_duplicates() {
        let mut ledger = ledger();
        assert!(matches!(
            ledger.mint("", "pw", 1),
            Err(LedgerError::WalletCreationFailed(CryptoError::EmptySeed))
        ));

        let alice = minted(&mut ledger, "alice", 1);
        assert!(matches!(
            ledger.mint("alice", "pw", 1),
            Err(LedgerError::WalletExists(addr)) if addr == alice.address()
        ));
        assert_eq!(ledger.total_supply(), 1);
    }

    #[test]
    fn test_transfer_reserves_coins() {
        let mut ledger = ledger();
        let alice = minted(&mut ledger, "alice", 3);
        let bob = minted(&mut ledger, "bob", 0);

        let tx_id = ledger
            .transfer(&alice.address(), &alice, &bob.address(), 2)
            .unwrap();
        let tx = ledger.pending_transaction(&tx_id).unwrap().clone();

        assert_eq!(ledger.balance_of(&alice.address()), 1);
        assert_eq!(ledger.balance_of(&bob.address()), 0);
        for coin in &tx.coins {
            assert_eq!(ledger.coin(coin).unwrap().state, CoinState::Pending);
        }
    }

    #[test]
    fn test_transfer_rejections_leave_state_unchanged() {
        let mut ledger = ledger();
        let alice = minted(&mut ledger, "alice", 2);
        let bob = minted(&mut ledger, "bob", 0);
        let stranger = Keypair::generate();

        assert!(matches!(
            ledger.transfer(&alice.address(), &alice, &bob.address(), 0),
            Err(LedgerError::ZeroAmount)
        ));
        assert!(matches!(
            ledger.transfer(&alice.address(), &alice, &bob.address(), 3),
            Err(LedgerError::InsufficientBalance { required: 3, available: 2 })
        ));
        assert!(matches!(
            ledger.transfer(&alice.address(), &alice, &stranger.address(), 1),
            Err(LedgerError::WalletNotFound(_))
        ));
        assert!(matches!(
            ledger.transfer(&alice.address(), &stranger, &bob.address(), 1),
            Err(LedgerError::NotAuthorized(_))
        ));

        assert_eq!(ledger.balance_of(&alice.address()), 2);
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn test_seal_moves_coins_and_clears_pool() {
        let mut ledger = ledger();
        let alice = minted(&mut ledger, "alice", 3);
        let bob = minted(&mut ledger, "bob", 0);
        ledger
            .transfer(&alice.address(), &alice, &bob.address(), 2)
            .unwrap();

        let receipt = ledger.seal_block().unwrap();
        assert!(receipt.faults().is_empty());
        assert_eq!(receipt.block.index, 1);
        assert!(receipt.block.is_mined(1));

        assert_eq!(ledger.balance_of(&alice.address()), 1);
        assert_eq!(ledger.balance_of(&bob.address()), 2);
        assert!(ledger.pending().is_empty());
        assert!(ledger.is_valid());
    }

    #[test]
    fn test_empty_seal_appends_block() {
        let mut ledger = ledger();
        let receipt = ledger.seal_block().unwrap();
        assert_eq!(receipt.block.tx_count(), 0);
        assert_eq!(ledger.height(), 1);
    }

    #[test]
    fn test_second_seal_refused_while_open() {
        let mut ledger = ledger();
        let ticket = ledger.begin_seal().unwrap();
        assert!(matches!(ledger.begin_seal(), Err(LedgerError::SealInProgress)));

        ledger.abort_seal(ticket).unwrap();
        assert!(!ledger.is_sealing());
        assert!(ledger.begin_seal().is_ok());
    }

    #[test]
    fn test_stale_ticket_rejected() {
        let mut ledger = ledger();
        let stale = ledger.begin_seal().unwrap();
        ledger.abort_seal(stale.clone()).unwrap();

        let _fresh = ledger.begin_seal().unwrap();
        let block = stale.candidate().clone();
        assert!(matches!(
            ledger.commit_seal(stale, block),
            Err(LedgerError::StaleSeal)
        ));
    }

    #[test]
    fn test_unmined_block_rejected() {
        let mut ledger = Ledger::new(LedgerConfig::with_difficulty(8)).unwrap();
        let ticket = ledger.begin_seal().unwrap();
        let mut block = ticket.candidate().clone();
        block.mine(0);
        while block.hash.meets_difficulty(8) {
            block.nonce += 1;
            block.hash = block.compute_hash();
        }

        assert!(matches!(
            ledger.commit_seal(ticket, block),
            Err(LedgerError::Validation(ValidationError::InsufficientWork(8)))
        ));
        assert!(!ledger.is_sealing());
        assert_eq!(ledger.height(), 0);
    }

    #[test]
    fn test_mining_timeout_leaves_pool() {
        let config = LedgerConfig {
            difficulty: 64,
            mining_timeout_ms: Some(20),
            mining_workers: Some(1),
            ..LedgerConfig::default()
        };
        let mut ledger = Ledger::new(config).unwrap();
        let alice = minted(&mut ledger, "alice", 1);
        let bob = minted(&mut ledger, "bob", 0);
        let tx_id = ledger
            .transfer(&alice.address(), &alice, &bob.address(), 1)
            .unwrap();

        assert!(matches!(
            ledger.seal_block(),
            Err(LedgerError::MiningTimeout { .. })
        ));
        assert!(ledger.pending_transaction(&tx_id).is_some());
        assert!(!ledger.is_sealing());
        assert_eq!(ledger.height(), 0);
    }

    #[test]
    fn test_stats() {
        let mut ledger = ledger();
        let alice = minted(&mut ledger, "alice", 4);
        let bob = minted(&mut ledger, "bob", 1);
        ledger
            .transfer(&alice.address(), &alice, &bob.address(), 3)
            .unwrap();

        let stats = ledger.stats();
        assert_eq!(stats.height, 0);
        assert_eq!(stats.wallets, 2);
        assert_eq!(stats.total_supply, 5);
        assert_eq!(stats.pending_transactions, 1);
        assert_eq!(stats.reserved_coins, 3);
        assert_eq!(stats.difficulty, 1);
    }

    #[test]
    fn test_sequence_advances_through_pool_and_chain() {
        let mut ledger = ledger();
        let alice = minted(&mut ledger, "alice", 3);
        let bob = minted(&mut ledger, "bob", 0);
        assert_eq!(ledger.next_sequence(&alice.address()), 0);

        let first = ledger
            .transfer(&alice.address(), &alice, &bob.address(), 1)
            .unwrap();
        let second = ledger
            .transfer(&alice.address(), &alice, &bob.address(), 1)
            .unwrap();
        assert_eq!(ledger.pending_transaction(&first).unwrap().sequence, 0);
        assert_eq!(ledger.pending_transaction(&second).unwrap().sequence, 1);
        assert_eq!(ledger.pending_from(&alice.address()).len(), 2);
        assert!(ledger.pending_from(&bob.address()).is_empty());

        // a withdrawn sequence number is not handed out again
        let withdrawn = ledger.withdraw(&second, &alice).unwrap();
        let third = ledger
            .transfer(&alice.address(), &alice, &bob.address(), 1)
            .unwrap();
        assert_eq!(ledger.pending_transaction(&third).unwrap().sequence, 2);
        assert!(matches!(
            ledger.submit(withdrawn),
            Err(LedgerError::StaleSequence { sequence: 1, next: 3 })
        ));

        ledger.seal_block().unwrap();
        assert_eq!(ledger.next_sequence(&alice.address()), 3);
        assert_eq!(ledger.balance_of(&bob.address()), 2);
    }

    #[test]
    fn test_submit_rejects_used_sequence() {
        let mut ledger = ledger();
        let alice = minted(&mut ledger, "alice", 2);
        let bob = minted(&mut ledger, "bob", 0);
        ledger
            .transfer(&alice.address(), &alice, &bob.address(), 1)
            .unwrap();
        ledger.seal_block().unwrap();

        let coin = *ledger.wallet(&alice.address()).unwrap().coins.iter().next().unwrap();
        let reused = Transaction::transfer(alice.address(), bob.address(), vec![coin]).signed(&alice);
        assert!(matches!(
            ledger.submit(reused),
            Err(LedgerError::StaleSequence { sequence: 0, next: 1 })
        ));

        let fresh = Transaction::transfer(alice.address(), bob.address(), vec![coin])
            .with_sequence(1)
            .signed(&alice);
        assert!(ledger.submit(fresh).is_ok());
    }

    #[test]
    fn test_abort_open_seal_without_ticket() {
        let mut ledger = ledger();
        let alice = minted(&mut ledger, "alice", 1);
        let bob = minted(&mut ledger, "bob", 0);
        let tx_id = ledger
            .transfer(&alice.address(), &alice, &bob.address(), 1)
            .unwrap();

        let lost = ledger.begin_seal().unwrap();
        assert!(ledger.abort_open_seal());
        assert!(!ledger.abort_open_seal());
        assert!(!ledger.is_sealing());
        assert!(matches!(ledger.abort_seal(lost), Err(LedgerError::StaleSeal)));

        // the pool is intact and sealing works again
        assert!(ledger.pending_transaction(&tx_id).is_some());
        ledger.seal_block().unwrap();
        assert_eq!(ledger.balance_of(&bob.address()), 1);
    }

    /// Alice has a pending transfer of two coins to Bob, whose wallet has
    /// since disappeared from the registry.
    fn orphaned_receiver(policy: IntegrityPolicy) -> (Ledger, Keypair, Keypair) {
        let mut ledger = Ledger::new(LedgerConfig {
            integrity: policy,
            ..LedgerConfig::with_difficulty(1)
        })
        .unwrap();
        let alice = minted(&mut ledger, "alice", 5);
        let bob = minted(&mut ledger, "bob", 0);
        ledger
            .transfer(&alice.address(), &alice, &bob.address(), 2)
            .unwrap();
        ledger.wallets.remove(&bob.address());
        (ledger, alice, bob)
    }

    #[test]
    fn test_strict_integrity_aborts_before_append() {
        let (mut ledger, alice, bob) = orphaned_receiver(IntegrityPolicy::Strict);

        match ledger.seal_block() {
            Err(LedgerError::Integrity(faults)) => {
                assert_eq!(faults.len(), 1);
                assert_eq!(faults[0].reason, FaultReason::ReceiverMissing(bob.address()));
            }
            other => panic!("expected integrity failure, got {other:?}"),
        }
        assert_eq!(ledger.height(), 0);
        assert_eq!(ledger.pending().len(), 1);
        assert!(!ledger.is_sealing());

        // the sender can pull the offending transfer and carry on
        let tx_id = ledger.pending()[0].id();
        ledger.withdraw(&tx_id, &alice).unwrap();
        ledger.seal_block().unwrap();
        assert_eq!(ledger.balance_of(&alice.address()), 5);
    }

    #[test]
    fn test_lenient_integrity_appends_and_reports() {
        let (mut ledger, alice, bob) = orphaned_receiver(IntegrityPolicy::Lenient);

        let receipt = ledger.seal_block().unwrap();
        let faults = receipt.faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].reason, FaultReason::ReceiverMissing(bob.address()));
        assert_eq!(receipt.confirmation.coins_moved, 0);

        assert_eq!(ledger.height(), 1);
        assert!(ledger.pending().is_empty());
        assert_eq!(ledger.balance_of(&alice.address()), 5);
        assert!(ledger.is_valid());
    }

    #[test]
    fn test_lenient_skips_unowned_coin() {
        let mut ledger = Ledger::new(LedgerConfig {
            integrity: IntegrityPolicy::Lenient,
            ..LedgerConfig::with_difficulty(1)
        })
        .unwrap();
        let alice = minted(&mut ledger, "alice", 5);
        let bob = minted(&mut ledger, "bob", 0);
        let tx_id = ledger
            .transfer(&alice.address(), &alice, &bob.address(), 2)
            .unwrap();
        let tx = ledger.pending_transaction(&tx_id).unwrap().clone();
        ledger
            .wallets
            .get_mut(&alice.address())
            .unwrap()
            .remove_coin(&tx.coins[0]);

        let receipt = ledger.seal_block().unwrap();
        assert_eq!(receipt.confirmation.coins_moved, 1);
        assert!(matches!(
            receipt.faults()[0].reason,
            FaultReason::CoinNotOwned { coin, .. } if coin == tx.coins[0]
        ));
        assert_eq!(ledger.balance_of(&bob.address()), 1);
        assert!(ledger.coin(&tx.coins[0]).unwrap().is_available());
    }
}
