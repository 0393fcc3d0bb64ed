// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - PROOF OF STAKE
//
// Stake ledger plus weighted random validator selection. Stake moves
// through ordinary Stake/Unstake transactions and is applied at block
// commit; selection samples r from the OS secure source and walks the
// stakers in address order accumulating stake/total.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::blockchain::Blockchain;
use crate::{ChainError, Consensus, ConsensusKind, Sealer};
use aula_core::{Block, ChainConfig, Transaction, TxDraft, TxType, Wallet};
use aula_crypto::Address;
use log::warn;
use rand::rngs::OsRng;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

struct Staker {
    wallet: Arc<Wallet>,
    staked: u128,
}

#[derive(Default)]
pub struct ProofOfStake {
    stakers: Mutex<BTreeMap<Address, Staker>>,
}

impl ProofOfStake {
    pub fn new() -> Self {
        ProofOfStake::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<Address, Staker>> {
        self.stakers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Track a wallet in the stake ledger. Stake stays zero until a Stake
    /// transaction commits; the wallet handle is needed to seal blocks.
    pub fn register(&self, wallet: Arc<Wallet>) {
        let mut stakers = self.lock();
        stakers
            .entry(wallet.address().clone())
            .or_insert_with(|| Staker { wallet, staked: 0 });
    }

    pub fn staked(&self, address: &Address) -> u128 {
        self.lock().get(address).map_or(0, |s| s.staked)
    }

    pub fn total_stake(&self) -> u128 {
        self.lock().values().map(|s| s.staked).sum()
    }

    /// Weighted selection for a given draw `r ∈ [0, 1)`: walk stakers in
    /// address order accumulating `stake / total`; the first whose
    /// cumulative weight exceeds `r` wins. Rounding at the top of the
    /// range falls back to the heaviest staker. Returns `None` when no
    /// stake is bonded.
    pub fn select_validator(&self, r: f64) -> Option<Arc<Wallet>> {
        let stakers = self.lock();
        let total: u128 = stakers.values().map(|s| s.staked).sum();
        if total == 0 {
            return None;
        }
        let mut cumulative = 0.0_f64;
        let mut heaviest: Option<&Staker> = None;
        for staker in stakers.values().filter(|s| s.staked > 0) {
            if heaviest.map_or(true, |h| staker.staked > h.staked) {
                heaviest = Some(staker);
            }
            cumulative += staker.staked as f64 / total as f64;
            if cumulative > r {
                return Some(Arc::clone(&staker.wallet));
            }
        }
        heaviest.map(|s| Arc::clone(&s.wallet))
    }
}

impl Consensus for ProofOfStake {
    fn kind(&self) -> ConsensusKind {
        ConsensusKind::ProofOfStake
    }

    /// PoS genesis is the unsigned chain anchor.
    fn seal_genesis(&self, _block: &mut Block, _cfg: &ChainConfig) -> Result<(), ChainError> {
        Ok(())
    }

    fn choose_sealer(&self, faucet: &Arc<Wallet>) -> Sealer {
        let r: f64 = OsRng.gen();
        match self.select_validator(r) {
            Some(validator) => Sealer::Signer(validator),
            None => Sealer::Signer(Arc::clone(faucet)),
        }
    }

    fn seal(
        &self,
        block: &mut Block,
        sealer: &Sealer,
        _cfg: &ChainConfig,
    ) -> Result<(), ChainError> {
        match sealer {
            Sealer::Signer(validator) => {
                block.sign(validator);
                Ok(())
            }
            Sealer::Work => Err(ChainError::InvariantViolation(
                "proof-of-stake blocks are sealed by signature".to_string(),
            )),
        }
    }

    fn validate_block(
        &self,
        block: &Block,
        height: usize,
        _cfg: &ChainConfig,
    ) -> Result<(), ChainError> {
        if height == 0 {
            return Ok(());
        }
        if block.recompute_hash() != block.hash {
            return Err(ChainError::InvariantViolation(format!(
                "block {} hash does not match its contents",
                block.hash
            )));
        }
        if !block.verify_seal_signature() {
            return Err(ChainError::InvariantViolation(format!(
                "block {} carries an invalid validator signature",
                block.hash
            )));
        }
        Ok(())
    }

    fn default_reward(&self, sealer: &Sealer, drain: &Address) -> Address {
        match sealer {
            Sealer::Signer(validator) => validator.address().clone(),
            Sealer::Work => drain.clone(),
        }
    }

    /// Apply stake movements from a committed block.
    fn on_commit(&self, block: &Block) {
        let mut stakers = self.lock();
        for tx in &block.data {
            match tx.tx_type {
                TxType::Stake => {
                    let Some(from) = tx.from.as_ref() else { continue };
                    match stakers.get_mut(from) {
                        Some(staker) => staker.staked += tx.amount,
                        None => warn!("stake committed for unregistered wallet {from}"),
                    }
                }
                TxType::Unstake => {
                    if let Some(staker) = stakers.get_mut(&tx.to) {
                        staker.staked = staker.staked.saturating_sub(tx.amount);
                    }
                }
                _ => {}
            }
        }
    }
}

impl Blockchain<ProofOfStake> {
    /// Lock `amount` behind the drain. Applied to the stake ledger when
    /// the Stake transaction commits; the usual percentage fee applies.
    pub fn stake(self: &Arc<Self>, staker: &Arc<Wallet>, amount: u128) -> Result<(), ChainError> {
        if amount == 0 {
            return Err(ChainError::InvalidTransaction(
                "stake amount must be positive".to_string(),
            ));
        }
        let tx = Transaction::build(
            TxDraft::new(
                TxType::Stake,
                Some(staker.address().clone()),
                self.drain().clone(),
                amount,
            )
            .fee_bps(self.config().default_fee_bps),
            Some(staker.as_ref()),
        )?;
        self.consensus().register(Arc::clone(staker));
        self.add_transaction(tx)
    }

    /// Release previously bonded stake back from the drain. Requires the
    /// stake ledger to cover the amount at submission; unsigned by
    /// convention since the drain owns no key.
    pub fn unstake(self: &Arc<Self>, staker: &Wallet, amount: u128) -> Result<(), ChainError> {
        let staked = self.consensus().staked(staker.address());
        if staked < amount {
            return Err(ChainError::InsufficientFunds {
                required: amount,
                available: staked,
            });
        }
        let tx = Transaction::build(
            TxDraft::new(
                TxType::Unstake,
                Some(self.drain().clone()),
                staker.address().clone(),
                amount,
            ),
            None,
        )?;
        self.add_transaction(tx)
    }
}
