// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - PROOF OF WORK
//
// Blocks (genesis included) are sealed by the parallel nonce search in
// aula-core; validation recomputes the hash and checks the difficulty
// target. Auto-block rewards default to the drain.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::{ChainError, Consensus, ConsensusKind, Sealer};
use aula_core::block::meets_difficulty;
use aula_core::{Block, ChainConfig, Wallet};
use aula_crypto::Address;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ProofOfWork;

impl ProofOfWork {
    pub fn new() -> Self {
        ProofOfWork
    }
}

impl Consensus for ProofOfWork {
    fn kind(&self) -> ConsensusKind {
        ConsensusKind::ProofOfWork
    }

    fn seal_genesis(&self, block: &mut Block, cfg: &ChainConfig) -> Result<(), ChainError> {
        block
            .mine(cfg.difficulty, cfg.miner_pool_size, cfg.max_block_nonce)
            .map_err(Into::into)
    }

    fn choose_sealer(&self, _faucet: &Arc<Wallet>) -> Sealer {
        Sealer::Work
    }

    fn seal(
        &self,
        block: &mut Block,
        sealer: &Sealer,
        cfg: &ChainConfig,
    ) -> Result<(), ChainError> {
        match sealer {
            Sealer::Work => block
                .mine(cfg.difficulty, cfg.miner_pool_size, cfg.max_block_nonce)
                .map_err(Into::into),
            Sealer::Signer(_) => Err(ChainError::InvariantViolation(
                "proof-of-work blocks are sealed by mining".to_string(),
            )),
        }
    }

    fn validate_block(
        &self,
        block: &Block,
        _height: usize,
        cfg: &ChainConfig,
    ) -> Result<(), ChainError> {
        if block.recompute_hash() != block.hash {
            return Err(ChainError::InvariantViolation(format!(
                "block {} hash does not match its contents",
                block.hash
            )));
        }
        if !block.created {
            return Err(ChainError::InvariantViolation(format!(
                "block {} was never sealed",
                block.hash
            )));
        }
        let difficulty = block.difficulty.unwrap_or(cfg.difficulty);
        if !meets_difficulty(&block.hash, difficulty) {
            return Err(ChainError::InvariantViolation(format!(
                "block {} misses the difficulty target of {difficulty}",
                block.hash
            )));
        }
        Ok(())
    }

    fn default_reward(&self, _sealer: &Sealer, drain: &Address) -> Address {
        drain.clone()
    }

    fn on_commit(&self, _block: &Block) {}
}
