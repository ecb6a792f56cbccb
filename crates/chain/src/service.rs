//! Thread-safe handle over a [`Ledger`].
//!
//! Every operation takes the lock for its own duration only. Sealing takes
//! it twice: once to capture the pool and once to commit, with the nonce
//! search in between running on a worker thread while admissions continue.

use crate::ledger::{Ledger, LedgerError, LedgerStats, Result, SealReceipt, SealTicket};
use crate::snapshot::LedgerSnapshot;
use coinchain_consensus::{ChainFault, MiningTask};
use coinchain_core::{Address, Hash, Keypair, Transaction, Wallet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct LedgerService {
    inner: Arc<Mutex<Ledger>>,
}

impl LedgerService {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>> {
        self.inner.lock().map_err(|_| LedgerError::Poisoned)
    }

    /// Run `f` against the ledger under the lock.
    pub fn with_ledger<R>(&self, f: impl FnOnce(&Ledger) -> R) -> Result<R> {
        Ok(f(&*self.lock()?))
    }

    pub fn mint(&self, seed1: &str, seed2: &str, count: usize) -> Result<Wallet> {
        self.lock()?.mint(seed1, seed2, count)
    }

    pub fn transfer(
        &self,
        sender: &Address,
        signer: &Keypair,
        receiver: &Address,
        count: usize,
    ) -> Result<Hash> {
        self.lock()?.transfer(sender, signer, receiver, count)
    }

    pub fn submit(&self, tx: Transaction) -> Result<Hash> {
        self.lock()?.submit(tx)
    }

    pub fn withdraw(&self, tx_id: &Hash, signer: &Keypair) -> Result<Transaction> {
        self.lock()?.withdraw(tx_id, signer)
    }

    pub fn balance_of(&self, address: &Address) -> Result<usize> {
        Ok(self.lock()?.balance_of(address))
    }

    pub fn validate_chain(&self) -> Result<std::result::Result<(), ChainFault>> {
        Ok(self.lock()?.validate_chain())
    }

    pub fn is_valid(&self) -> Result<bool> {
        Ok(self.lock()?.is_valid())
    }

    pub fn stats(&self) -> Result<LedgerStats> {
        Ok(self.lock()?.stats())
    }

    pub fn snapshot(&self) -> Result<LedgerSnapshot> {
        Ok(self.lock()?.snapshot())
    }

    /// Capture the pool and start mining on a worker thread.
    pub fn start_seal(&self) -> Result<PendingSeal> {
        let (ticket, miner) = {
            let mut ledger = self.lock()?;
            (ledger.begin_seal()?, ledger.miner())
        };

        match miner.spawn(ticket.candidate().clone()) {
            Ok(task) => Ok(PendingSeal {
                service: self.clone(),
                ticket: Some(ticket),
                task: Some(task),
            }),
            Err(err) => {
                self.lock()?.abort_seal(ticket)?;
                Err(err.into())
            }
        }
    }

    /// Seal the pool into a block, blocking until it is appended.
    pub fn seal_block(&self) -> Result<SealReceipt> {
        self.start_seal()?.wait()
    }
}

/// A seal whose nonce search is running.
///
/// Dropping it without [`wait`](Self::wait) cancels the search and aborts
/// the seal, leaving the pool as it was.
pub struct PendingSeal {
    service: LedgerService,
    ticket: Option<SealTicket>,
    task: Option<MiningTask>,
}

impl PendingSeal {
    /// Ask the search to stop; [`wait`](Self::wait) then reports the
    /// cancellation and leaves the pool as it was.
    pub fn cancel(&self) {
        if let Some(task) = &self.task {
            task.cancel();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, MiningTask::is_finished)
    }

    pub fn tx_ids(&self) -> &[Hash] {
        self.ticket.as_ref().map(SealTicket::tx_ids).unwrap_or_default()
    }

    /// Wait for the search, then commit or abort under the lock.
    pub fn wait(mut self) -> Result<SealReceipt> {
        let (Some(ticket), Some(task)) = (self.ticket.take(), self.task.take()) else {
            return Err(LedgerError::StaleSeal);
        };

        let outcome = task.join();
        let mut ledger = self.service.lock()?;
        match outcome {
            Ok((block, _)) => ledger.commit_seal(ticket, block),
            Err(err) => {
                ledger.abort_seal(ticket)?;
                Err(err.into())
            }
        }
    }
}

impl Drop for PendingSeal {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
        if let Some(ticket) = self.ticket.take() {
            if let Ok(mut ledger) = self.service.lock() {
                // a stale ticket means the seal is already gone
                let _ = ledger.abort_seal(ticket);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use coinchain_consensus::MiningError;
    use std::thread;

    fn service(difficulty: u32) -> LedgerService {
        LedgerService::new(Ledger::new(LedgerConfig::with_difficulty(difficulty)).unwrap())
    }

    #[test]
    fn test_seal_through_service() {
        let service = service(1);
        service.mint("alice", "pw", 2).unwrap();
        service.mint("bob", "pw", 0).unwrap();
        let alice = Keypair::from_seeds("alice", "pw").unwrap();
        let bob = Keypair::from_seeds("bob", "pw").unwrap();

        service
            .transfer(&alice.address(), &alice, &bob.address(), 2)
            .unwrap();
        let receipt = service.seal_block().unwrap();

        assert_eq!(receipt.block.tx_count(), 1);
        assert_eq!(service.balance_of(&bob.address()).unwrap(), 2);
        assert!(service.is_valid().unwrap());
    }

    #[test]
    fn test_admission_during_mining_waits_for_next_block() {
        let service = service(2);
        service.mint("alice", "pw", 2).unwrap();
        service.mint("bob", "pw", 0).unwrap();
        let alice = Keypair::from_seeds("alice", "pw").unwrap();
        let bob = Keypair::from_seeds("bob", "pw").unwrap();

        let first = service
            .transfer(&alice.address(), &alice, &bob.address(), 1)
            .unwrap();
        let seal = service.start_seal().unwrap();
        let late = service
            .transfer(&alice.address(), &alice, &bob.address(), 1)
            .unwrap();

        assert_eq!(seal.tx_ids(), &[first]);
        let receipt = seal.wait().unwrap();
        assert_eq!(receipt.block.transactions[0].id(), first);

        let pending = service.with_ledger(|l| l.pending()).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id(), late);
    }

    #[test]
    fn test_cancelled_seal_leaves_pool() {
        let service = service(64);
        service.mint("alice", "pw", 1).unwrap();
        service.mint("bob", "pw", 0).unwrap();
        let alice = Keypair::from_seeds("alice", "pw").unwrap();
        let bob = Keypair::from_seeds("bob", "pw").unwrap();
        service
            .transfer(&alice.address(), &alice, &bob.address(), 1)
            .unwrap();

        let seal = service.start_seal().unwrap();
        assert!(matches!(
            service.start_seal(),
            Err(LedgerError::SealInProgress)
        ));
        seal.cancel();

        assert!(matches!(
            seal.wait(),
            Err(LedgerError::Mining(MiningError::Cancelled { .. }))
        ));
        let stats = service.stats().unwrap();
        assert_eq!(stats.height, 0);
        assert_eq!(stats.pending_transactions, 1);
        assert!(!service.with_ledger(Ledger::is_sealing).unwrap());
    }

    #[test]
    fn test_concurrent_transfers_never_double_spend() {
        let service = service(1);
        service.mint("alice", "pw", 10).unwrap();
        service.mint("bob", "pw", 0).unwrap();
        let bob = Keypair::from_seeds("bob", "pw").unwrap().address();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                thread::spawn(move || {
                    let alice = Keypair::from_seeds("alice", "pw").unwrap();
                    service.transfer(&alice.address(), &alice, &bob, 3).is_ok()
                })
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(admitted, 3);
        service.seal_block().unwrap();
        assert_eq!(service.balance_of(&bob).unwrap(), 9);
    }

    #[test]
    fn test_dropped_seal_is_aborted() {
        let service = service(64);
        service.mint("alice", "pw", 1).unwrap();
        service.mint("bob", "pw", 0).unwrap();
        let alice = Keypair::from_seeds("alice", "pw").unwrap();
        let bob = Keypair::from_seeds("bob", "pw").unwrap();
        let tx_id = service
            .transfer(&alice.address(), &alice, &bob.address(), 1)
            .unwrap();

        let seal = service.start_seal().unwrap();
        seal.cancel();
        drop(seal);

        assert!(!service.with_ledger(Ledger::is_sealing).unwrap());
        assert!(service
            .with_ledger(|l| l.pending_transaction(&tx_id).is_some())
            .unwrap());

        // the withdrawn-while-sealing guard is lifted too
        service.withdraw(&tx_id, &alice).unwrap();
        let fresh = service.start_seal().unwrap();
        assert!(fresh.tx_ids().is_empty());
    }
}
