// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - TRANSACTION MEMPOOL
//
// FIFO buffer of admitted but uncommitted transactions. Submission order
// is preserved so earlier transactions win when balances run tight.
// - Duplicate-hash rejection
// - TTL expiry for transactions that never commit
// - Admission statistics
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::ChainError;
use aula_core::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct Mempool {
    pending: Vec<Transaction>,
    hashes: HashSet<String>,
    total_received: u64,
    total_accepted: u64,
    total_rejected: u64,
    total_expired: u64,
}

impl Mempool {
    pub fn new() -> Self {
        Mempool::default()
    }

    /// Append in FIFO position. Rejects hashes already pending.
    pub fn push(&mut self, tx: Transaction) -> Result<(), ChainError> {
        self.total_received += 1;
        if self.hashes.contains(&tx.hash) {
            self.total_rejected += 1;
            return Err(ChainError::DuplicateTransaction(tx.hash));
        }
        self.hashes.insert(tx.hash.clone());
        self.pending.push(tx);
        self.total_accepted += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    /// Pending transactions in submission order.
    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    /// Owned copy for the assembly loop to work over.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.pending.clone()
    }

    /// Drop exactly the transactions that made it into a block; everything
    /// else keeps its position for the next attempt.
    pub fn remove_committed(&mut self, committed: &[String]) {
        let committed: HashSet<&str> = committed.iter().map(String::as_str).collect();
        self.pending.retain(|tx| !committed.contains(tx.hash.as_str()));
        self.hashes.retain(|h| !committed.contains(h.as_str()));
    }

    /// Prune transactions older than the TTL. Returns how many went.
    pub fn prune_expired(&mut self, now_micros: u64, ttl_secs: u64) -> usize {
        let cutoff = now_micros.saturating_sub(ttl_secs.saturating_mul(1_000_000));
        let before = self.pending.len();
        let hashes = &mut self.hashes;
        self.pending.retain(|tx| {
            let keep = tx.timestamp >= cutoff;
            if !keep {
                hashes.remove(&tx.hash);
            }
            keep
        });
        let expired = before - self.pending.len();
        self.total_expired += expired as u64;
        expired
    }

    pub fn stats(&self) -> MempoolStats {
        MempoolStats {
            size: self.pending.len(),
            total_received: self.total_received,
            total_accepted: self.total_accepted,
            total_rejected: self.total_rejected,
            total_expired: self.total_expired,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolStats {
    pub size: usize,
    pub total_received: u64,
    pub total_accepted: u64,
    pub total_rejected: u64,
    pub total_expired: u64,
}
