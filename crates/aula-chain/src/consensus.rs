// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - CONSENSUS SEAM
//
// The block-assembly pipeline is consensus-agnostic; everything variant-
// specific goes through this trait: how genesis is anchored, who seals a
// block and how, what a valid seal looks like, and where rewards default.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::ChainError;
use aula_core::{Block, ChainConfig, Wallet};
use aula_crypto::Address;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusKind {
    ProofOfWork,
    ProofOfStake,
}

/// Who seals the block under assembly. Chosen before reward synthesis so
/// the reward transaction can pay a PoS validator.
#[derive(Clone)]
pub enum Sealer {
    /// PoW: the nonce search does the sealing.
    Work,
    /// PoS: this validator signs the block hash.
    Signer(Arc<Wallet>),
}

pub trait Consensus: Send + Sync + 'static {
    fn kind(&self) -> ConsensusKind;

    /// Anchor the genesis block. PoW mines it at chain difficulty; PoS
    /// leaves it unsigned by convention.
    fn seal_genesis(&self, block: &mut Block, cfg: &ChainConfig) -> Result<(), ChainError>;

    /// Pick the sealer for the next block. The faucet stands in when a
    /// PoS chain has no stake yet.
    fn choose_sealer(&self, faucet: &Arc<Wallet>) -> Sealer;

    fn seal(&self, block: &mut Block, sealer: &Sealer, cfg: &ChainConfig)
        -> Result<(), ChainError>;

    /// Per-consensus block validation; `height` 0 is the genesis anchor.
    fn validate_block(&self, block: &Block, height: usize, cfg: &ChainConfig)
        -> Result<(), ChainError>;

    /// Reward recipient when the caller names none (auto blocks).
    fn default_reward(&self, sealer: &Sealer, drain: &Address) -> Address;

    /// Observe a committed block (PoS applies stake deltas here).
    fn on_commit(&self, block: &Block);
}
