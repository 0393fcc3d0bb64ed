// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - BLOCK
//
// Aggregates transactions under a Merkle root and links to the previous
// block by hash. Sealed either by proof-of-work (parallel nonce search
// over disjoint per-worker ranges) or by a validator signature.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::merkle::merkle_root;
use crate::{timestamp_micros, CoreError, Transaction, Wallet};
use aula_crypto::{address_to_public_key, sha256_hex, verify_signature, Address};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;

/// Leading `'0'` hex digits of a hash.
pub fn leading_hex_zeros(hash: &str) -> u32 {
    hash.chars().take_while(|c| *c == '0').count() as u32
}

/// PoW target check: at least `difficulty` leading hex zeros.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    leading_hex_zeros(hash) >= difficulty
}

enum WorkerReport {
    Found { nonce: u64, hash: String },
    Exhausted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub previous_hash: String,
    /// Unix microseconds at construction.
    pub timestamp: u64,
    pub data: Vec<Transaction>,
    pub merkle_root: String,
    pub nonce: u64,
    pub hash: String,
    /// Set by mining (PoW chains only).
    pub difficulty: Option<u32>,
    /// Sealing validator (PoS chains only).
    pub validator: Option<Address>,
    pub signature: Option<String>,
    /// Wall-clock milliseconds the successful mining attempt took.
    pub mine_time_ms: Option<u64>,
    /// True once a PoW seal has been found.
    pub created: bool,
}

impl Block {
    /// Build an unsealed block: Merkle root over the transaction hashes,
    /// hash computed with nonce 0.
    pub fn new(previous_hash: String, data: Vec<Transaction>) -> Result<Self, CoreError> {
        if data.is_empty() {
            return Err(CoreError::EmptyBlock);
        }
        let timestamp = timestamp_micros();
        let hashes: Vec<String> = data.iter().map(|tx| tx.hash.clone()).collect();
        let root = merkle_root(&hashes);
        let hash = Self::compute_hash(timestamp, &root, &previous_hash, 0);
        Ok(Block {
            previous_hash,
            timestamp,
            data,
            merkle_root: root,
            nonce: 0,
            hash,
            difficulty: None,
            validator: None,
            signature: None,
            mine_time_ms: None,
            created: false,
        })
    }

    fn compute_hash(timestamp: u64, merkle_root: &str, previous_hash: &str, nonce: u64) -> String {
        sha256_hex(&format!(
            "{timestamp}-{merkle_root}-{previous_hash}-{nonce}"
        ))
    }

    /// Hash of this block's header fields with an arbitrary nonce.
    pub fn hash_with_nonce(&self, nonce: u64) -> String {
        Self::compute_hash(self.timestamp, &self.merkle_root, &self.previous_hash, nonce)
    }

    /// Hash recomputed from the stored fields.
    pub fn recompute_hash(&self) -> String {
        self.hash_with_nonce(self.nonce)
    }

    /// Parallel proof-of-work search. Worker `i` scans the disjoint range
    /// `[i * max_nonce, (i + 1) * max_nonce)`; the first hit sets the stop
    /// flag and the remaining workers bail out at their next checkpoint.
    /// Fails with `MiningExhausted` when every worker drains its range.
    pub fn mine(
        &mut self,
        difficulty: u32,
        pool_size: usize,
        max_nonce: u64,
    ) -> Result<(), CoreError> {
        let pool_size = pool_size.max(1);
        let stop = Arc::new(AtomicBool::new(false));
        let (report_tx, report_rx) = mpsc::channel::<WorkerReport>();
        let prefix = format!(
            "{}-{}-{}-",
            self.timestamp, self.merkle_root, self.previous_hash
        );
        let started = Instant::now();

        let mut workers = Vec::with_capacity(pool_size);
        for i in 0..pool_size {
            let lo = i as u64 * max_nonce;
            let hi = lo.saturating_add(max_nonce);
            let stop = Arc::clone(&stop);
            let report = report_tx.clone();
            let prefix = prefix.clone();
            workers.push(thread::spawn(move || {
                let mut nonce = lo;
                while nonce < hi {
                    if nonce % 1024 == 0 && stop.load(Ordering::Relaxed) {
                        return;
                    }
                    let hash = sha256_hex(&format!("{prefix}{nonce}"));
                    if meets_difficulty(&hash, difficulty) {
                        let _ = report.send(WorkerReport::Found { nonce, hash });
                        return;
                    }
                    nonce += 1;
                }
                let _ = report.send(WorkerReport::Exhausted);
            }));
        }
        drop(report_tx);

        let mut exhausted = 0;
        let mut found = None;
        while let Ok(report) = report_rx.recv() {
            match report {
                WorkerReport::Found { nonce, hash } => {
                    stop.store(true, Ordering::Relaxed);
                    found = Some((nonce, hash));
                    break;
                }
                WorkerReport::Exhausted => {
                    exhausted += 1;
                    if exhausted == pool_size {
                        break;
                    }
                }
            }
        }
        stop.store(true, Ordering::Relaxed);
        for worker in workers {
            let _ = worker.join();
        }

        match found {
            Some((nonce, hash)) => {
                self.nonce = nonce;
                self.hash = hash;
                self.difficulty = Some(difficulty);
                self.mine_time_ms = Some(started.elapsed().as_millis() as u64);
                self.created = true;
                Ok(())
            }
            None => Err(CoreError::MiningExhausted),
        }
    }

    /// PoS seal: the validator signs the block hash.
    pub fn sign(&mut self, validator: &Wallet) {
        self.validator = Some(validator.address().clone());
        self.signature = Some(validator.sign(&self.hash));
    }

    /// Check the validator signature over the block hash.
    pub fn verify_seal_signature(&self) -> bool {
        let (Some(validator), Some(signature)) = (self.validator.as_ref(), self.signature.as_ref())
        else {
            return false;
        };
        let Ok(public_key) = address_to_public_key(validator) else {
            return false;
        };
        let Ok(sig_bytes) = hex::decode(signature) else {
            return false;
        };
        verify_signature(self.hash.as_bytes(), &sig_bytes, &public_key)
    }
}
