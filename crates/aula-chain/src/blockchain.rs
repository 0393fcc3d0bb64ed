// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - BLOCKCHAIN
//
// Chain state and the block-assembly pipeline. Admission and assembly are
// mutually exclusive; all state lives behind one lock and PoW workers
// never touch it. The pipeline preflights contract calls, walks running
// balances in mempool order, downgrades underfunded calls to gas-only,
// synthesizes reward/fees/withdrawal transactions, seals and commits.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::consensus::{Consensus, Sealer};
use crate::error::ChainError;
use crate::mempool::{Mempool, MempoolStats};
use aula_core::{
    timestamp_micros, Block, CallResult, ChainConfig, Recipient, Transaction, TxDraft, TxType,
    Wallet,
};
use aula_crypto::{burn_address, Address};
use aula_vm::{CallOutcome, CallParams, Contract, ContractCode, ContractRuntime, GasCosts};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Options for a contract call submission.
#[derive(Debug, Clone, Default)]
pub struct CallOpts {
    /// Units attached to the call (payable), credited to the contract.
    pub value: u128,
    /// Defaults to the chain's `default_gas_limit`.
    pub gas_limit: Option<u64>,
}

/// Point-in-time snapshot of chain health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStats {
    pub blocks: usize,
    pub contracts: usize,
    pub mempool: MempoolStats,
    pub total_supply: u128,
    pub drained: u128,
    pub circulating: u128,
}

struct ChainState {
    blocks: Vec<Block>,
    mempool: Mempool,
    contracts: BTreeMap<Address, Contract>,
    /// Contracts whose deploy transaction has not committed yet, keyed by
    /// that transaction's hash.
    pending_deploys: HashMap<String, Contract>,
}

/// Clears the assembly flag however assembly ends.
struct AssemblyGuard<'a>(&'a AtomicBool);

impl Drop for AssemblyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Blockchain<C: Consensus> {
    config: ChainConfig,
    consensus: C,
    faucet: Arc<Wallet>,
    drain: Address,
    runtime: ContractRuntime,
    state: Mutex<ChainState>,
    creating: AtomicBool,
    auto_task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Consensus> Blockchain<C> {
    /// Build a chain anchored by a genesis block crediting the faucet.
    pub fn init(config: ChainConfig, consensus: C) -> Result<Arc<Self>, ChainError> {
        let faucet = Arc::new(Wallet::with_format(&config.faucet_name, config.address_format));
        let drain = burn_address(&config.drain_name);
        let genesis_tx = Transaction::build(
            TxDraft::new(
                TxType::Genesis,
                None,
                faucet.address().clone(),
                config.genesis_coins,
            ),
            None,
        )?;
        let mut genesis = Block::new("0".to_string(), vec![genesis_tx])?;
        consensus.seal_genesis(&mut genesis, &config)?;
        info!(
            "genesis {} credits {} units to the faucet",
            genesis.hash, config.genesis_coins
        );
        let runtime = ContractRuntime::new(GasCosts::from_config(&config));
        Ok(Arc::new(Blockchain {
            config,
            consensus,
            faucet,
            drain,
            runtime,
            state: Mutex::new(ChainState {
                blocks: vec![genesis],
                mempool: Mempool::new(),
                contracts: BTreeMap::new(),
                pending_deploys: HashMap::new(),
            }),
            creating: AtomicBool::new(false),
            auto_task: Mutex::new(None),
        }))
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn consensus(&self) -> &C {
        &self.consensus
    }

    /// The faucet wallet holding the genesis supply.
    pub fn faucet(&self) -> &Arc<Wallet> {
        &self.faucet
    }

    /// The burn sink address.
    pub fn drain(&self) -> &Address {
        &self.drain
    }

    fn lock_state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ─────────────────────────────────────────────────────────────────
    // ADMISSION
    // ─────────────────────────────────────────────────────────────────

    /// Validate and append to the mempool. Hitting the pending threshold
    /// arms the auto-create timer; the reward then defaults per consensus
    /// (PoW: drain, PoS: the selected validator).
    pub fn add_transaction(self: &Arc<Self>, tx: Transaction) -> Result<(), ChainError> {
        if matches!(
            tx.tx_type,
            TxType::Genesis | TxType::Reward | TxType::Fees | TxType::Withdrawal | TxType::GasOnly
        ) {
            return Err(ChainError::InvalidTransaction(format!(
                "type [{}] is synthesized by the chain",
                tx.tx_type.code()
            )));
        }
        let Some(from) = tx.from.as_ref() else {
            return Err(ChainError::InvalidTransaction(
                "transaction has no sender".to_string(),
            ));
        };
        if from == &tx.to {
            return Err(ChainError::InvalidTransaction(
                "sender and recipient must differ".to_string(),
            ));
        }
        if tx.tx_type == TxType::Transaction && tx.amount == 0 {
            return Err(ChainError::InvalidTransaction(
                "amount must be positive".to_string(),
            ));
        }
        if !tx.verify() {
            return Err(ChainError::InvalidTransaction(
                "signature verification failed".to_string(),
            ));
        }

        let should_schedule = {
            let mut state = self.lock_state();
            let expired = state
                .mempool
                .prune_expired(timestamp_micros(), self.config.mempool_tx_ttl_secs);
            if expired > 0 {
                debug!("pruned {expired} expired mempool transactions");
            }
            debug!(
                "admitted [{}] {} -> {} ({} units)",
                tx.tx_type.code(),
                from,
                tx.to,
                tx.amount
            );
            state.mempool.push(tx)?;
            state.mempool.len() >= self.config.max_pending_transactions
        };
        if should_schedule {
            self.schedule_auto_block();
        }
        Ok(())
    }

    fn schedule_auto_block(self: &Arc<Self>) {
        let mut slot = self
            .auto_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }
        let chain = Arc::clone(self);
        let delay = Duration::from_secs(self.config.auto_block_delay_secs);
        info!(
            "mempool reached {}; auto block in {}s",
            self.config.max_pending_transactions, self.config.auto_block_delay_secs
        );
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match chain.create_block(None) {
                Ok(Some(block)) => info!("auto block {} committed", block.hash),
                Ok(None) => info!("auto block skipped: nothing eligible"),
                Err(err) => warn!("auto block failed: {err}"),
            }
        }));
    }

    /// Submit a contract deployment: a signed ContractDeploy paying
    /// `base + per_byte * code_size` to the drain. The contract is only
    /// registered when that transaction commits.
    pub fn deploy_contract(
        self: &Arc<Self>,
        code: ContractCode,
        creator: &Wallet,
    ) -> Result<Address, ChainError> {
        let contract = Contract::new(code, creator, timestamp_micros());
        let fee = self.config.contract_deploy_base_fee
            + self.config.contract_deploy_per_byte_fee * contract.code_size() as u128;
        let tx = Transaction::build(
            TxDraft::new(
                TxType::ContractDeploy,
                Some(creator.address().clone()),
                self.drain.clone(),
                fee,
            )
            .contract(contract.address().clone()),
            Some(creator),
        )?;
        let address = contract.address().clone();
        let tx_hash = tx.hash.clone();
        self.lock_state().pending_deploys.insert(tx_hash.clone(), contract);
        if let Err(err) = self.add_transaction(tx) {
            self.lock_state().pending_deploys.remove(&tx_hash);
            return Err(err);
        }
        info!("deploy of {address} submitted (fee {fee} units)");
        Ok(address)
    }

    /// Submit a signed contract call. Returns the transaction hash so the
    /// caller can look up its CallResult after commit.
    pub fn call_contract(
        self: &Arc<Self>,
        sender: &Wallet,
        contract: &Address,
        function: &str,
        args: Vec<String>,
        opts: CallOpts,
    ) -> Result<String, ChainError> {
        let gas_limit = opts.gas_limit.unwrap_or(self.config.default_gas_limit);
        if gas_limit > self.config.max_gas_limit {
            return Err(ChainError::GasLimitTooHigh {
                requested: gas_limit,
                max: self.config.max_gas_limit,
            });
        }
        let tx = Transaction::build(
            TxDraft::new(
                TxType::ContractCall,
                Some(sender.address().clone()),
                contract.clone(),
                opts.value,
            )
            .contract(contract.clone())
            .call(function, args, gas_limit),
            Some(sender),
        )?;
        let hash = tx.hash.clone();
        self.add_transaction(tx)?;
        Ok(hash)
    }

    // ─────────────────────────────────────────────────────────────────
    // BLOCK ASSEMBLY
    // ─────────────────────────────────────────────────────────────────

    /// Assemble, seal and append a block from the mempool. Returns
    /// `Ok(None)` when nothing is eligible. Transactions that fail
    /// re-verification or balance checks stay in the mempool for the next
    /// attempt. Concurrent invocations fail with `AlreadyMining`.
    pub fn create_block(&self, reward_to: Option<&Address>) -> Result<Option<Block>, ChainError> {
        if self.creating.swap(true, Ordering::SeqCst) {
            return Err(ChainError::AlreadyMining);
        }
        let _guard = AssemblyGuard(&self.creating);

        // A voluntary block supersedes any pending auto block.
        if let Some(handle) = self
            .auto_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            handle.abort();
        }

        let sealer = self.consensus.choose_sealer(&self.faucet);
        let reward_addr = match reward_to {
            Some(address) => address.clone(),
            None => self.consensus.default_reward(&sealer, &self.drain),
        };
        let mut state = self.lock_state();
        self.assemble(&mut state, &sealer, &reward_addr)
    }

    fn assemble(
        &self,
        state: &mut ChainState,
        sealer: &Sealer,
        reward_addr: &Address,
    ) -> Result<Option<Block>, ChainError> {
        let cfg = &self.config;
        let ChainState {
            blocks,
            mempool,
            contracts,
            pending_deploys,
        } = state;

        let mut running: HashMap<Address, i128> = HashMap::new();
        let mut kept: Vec<Transaction> = Vec::new();
        let mut outcomes: HashMap<String, CallOutcome> = HashMap::new();

        for mut tx in mempool.snapshot() {
            if !tx.verify() {
                warn!("dropping {}: signature no longer verifies", tx.hash);
                continue;
            }
            let Some(from_addr) = tx.from.clone() else {
                continue;
            };

            // Preflight contract calls against the live registry.
            let mut outcome: Option<CallOutcome> = None;
            if tx.tx_type == TxType::ContractCall {
                if !contracts.contains_key(&tx.to) {
                    debug!("dropping call {}: contract not yet registered", tx.hash);
                    continue;
                }
                let contract_balance =
                    running_balance(&mut running, blocks, cfg, &tx.to).max(0) as u128;
                let Some(contract) = contracts.get_mut(&tx.to) else {
                    continue;
                };
                let params = CallParams {
                    caller: from_addr.clone(),
                    function: tx.function.clone().unwrap_or_default(),
                    args: tx.args.clone(),
                    value: tx.amount,
                    gas_limit: tx.gas_limit,
                    contract_balance,
                    drain: self.drain.clone(),
                };
                let result = self.runtime.call(contract, &params);
                tx.gas_used = result.gas_used;
                tx.call_result = Some(CallResult {
                    success: result.success,
                    result: result.result.clone(),
                    error: result.error.clone(),
                    gas_used: result.gas_used,
                });
                outcome = Some(result);
            }

            // Tentative balance application, rolled back when it sinks
            // the sender below zero.
            let spending = tx.total_spend(cfg) as i128;
            let from_before = running_balance(&mut running, blocks, cfg, &from_addr);
            running_balance(&mut running, blocks, cfg, &tx.to);
            adjust(&mut running, &from_addr, -spending);
            adjust(&mut running, &tx.to, tx.amount as i128);

            if from_before - spending < 0 {
                adjust(&mut running, &from_addr, spending);
                adjust(&mut running, &tx.to, -(tx.amount as i128));

                if tx.tx_type == TxType::ContractCall {
                    // The preflight already ran; its storage mutation
                    // cannot stand without the payment.
                    revert_preflight(contracts, &tx.to, outcome.as_ref());
                    let gas_cost = tx.gas_charge(cfg) as i128;
                    if from_before >= gas_cost {
                        tx.downgrade_to_gas_only();
                        adjust(&mut running, &from_addr, -gas_cost);
                        info!(
                            "downgraded {} to gas-only ({} units of gas)",
                            tx.hash, gas_cost
                        );
                        kept.push(tx);
                    } else {
                        warn!("dropping call {}: cannot even cover gas", tx.hash);
                    }
                } else {
                    warn!(
                        "dropping {}: needs {} units, has {}",
                        tx.hash, spending, from_before
                    );
                }
                continue;
            }

            if let Some(result) = outcome {
                outcomes.insert(tx.hash.clone(), result);
            }
            kept.push(tx);
        }

        if kept.is_empty() {
            info!("no eligible transactions; no block produced");
            return Ok(None);
        }

        // Side effects: register deploys, pay out contract transfers.
        let mut withdrawals: Vec<Transaction> = Vec::new();
        for tx in &kept {
            match tx.tx_type {
                TxType::ContractDeploy => {
                    let Some(mut contract) = pending_deploys.remove(&tx.hash) else {
                        return Err(ChainError::InvariantViolation(format!(
                            "deploy {} has no pending contract",
                            tx.hash
                        )));
                    };
                    let Some(creator) = tx.from.as_ref() else {
                        return Err(ChainError::InvariantViolation(
                            "deploy transaction without a creator".to_string(),
                        ));
                    };
                    match self.runtime.init(&mut contract, creator, &tx.args, &self.drain) {
                        Ok(()) => {
                            info!("contract {} registered", contract.address());
                            contracts.insert(contract.address().clone(), contract);
                        }
                        Err(err) => {
                            warn!(
                                "contract {} init failed ({err}); deployment discarded",
                                contract.address()
                            );
                        }
                    }
                }
                TxType::ContractCall => {
                    let Some(result) = outcomes.get(&tx.hash) else {
                        return Err(ChainError::InvariantViolation(format!(
                            "call {} kept without a preflight outcome",
                            tx.hash
                        )));
                    };
                    if !result.success {
                        continue; // storage already reverted by the runtime
                    }
                    let requested: u128 = result.transfers.iter().map(|(_, amount)| amount).sum();
                    let contract_balance = running_balance(&mut running, blocks, cfg, &tx.to);
                    if requested as i128 > contract_balance {
                        warn!(
                            "contract {} cannot cover {requested} requested units; call {} reverted",
                            tx.to, tx.hash
                        );
                        revert_preflight(contracts, &tx.to, Some(result));
                        continue;
                    }
                    for (payee, amount) in &result.transfers {
                        let withdrawal = Transaction::build(
                            TxDraft::new(
                                TxType::Withdrawal,
                                Some(tx.to.clone()),
                                payee.clone(),
                                *amount,
                            ),
                            None,
                        )?;
                        running_balance(&mut running, blocks, cfg, payee);
                        adjust(&mut running, &tx.to, -(*amount as i128));
                        adjust(&mut running, payee, *amount as i128);
                        withdrawals.push(withdrawal);
                    }
                    for event in &result.events {
                        debug!("event {} from {}", event.event_type, event.contract);
                    }
                }
                _ => {}
            }
        }

        // Reward and fees synthesis.
        let reward_amount = kept.len() as u128 * cfg.reward_per_mined_tx;
        let reward = Transaction::build(
            TxDraft::new(TxType::Reward, None, reward_addr.clone(), reward_amount),
            None,
        )?;
        let fees_amount: u128 = kept
            .iter()
            .map(|tx| tx.fee_amount(cfg) + tx.gas_charge(cfg))
            .sum();
        let fees = Transaction::build(
            TxDraft::new(TxType::Fees, None, reward_addr.clone(), fees_amount),
            None,
        )?;

        let kept_hashes: Vec<String> = kept.iter().map(|tx| tx.hash.clone()).collect();
        let mut data = Vec::with_capacity(2 + kept.len() + withdrawals.len());
        data.push(reward);
        data.push(fees);
        data.extend(kept);
        data.extend(withdrawals);

        let previous_hash = blocks
            .last()
            .map(|block| block.hash.clone())
            .ok_or_else(|| ChainError::InvariantViolation("chain has no genesis".to_string()))?;
        let mut block = Block::new(previous_hash, data)?;
        self.consensus.seal(&mut block, sealer, cfg)?;
        self.consensus.validate_block(&block, blocks.len(), cfg)?;

        mempool.remove_committed(&kept_hashes);
        blocks.push(block.clone());
        self.consensus.on_commit(&block);
        info!(
            "block #{} committed: {} transactions, {} left pending",
            blocks.len() - 1,
            block.data.len(),
            mempool.len()
        );
        Ok(Some(block))
    }

    // ─────────────────────────────────────────────────────────────────
    // QUERIES
    // ─────────────────────────────────────────────────────────────────

    /// Authoritative balance: full-ledger replay.
    pub fn get_balance(&self, who: &dyn Recipient) -> u128 {
        self.balance_of(who.address())
    }

    pub fn balance_of(&self, address: &Address) -> u128 {
        let state = self.lock_state();
        ledger_balance(&state.blocks, &self.config, address)
    }

    /// Sum of all minted amounts (Genesis + Reward).
    pub fn get_total_supply(&self) -> u128 {
        let state = self.lock_state();
        total_supply(&state.blocks)
    }

    /// Units parked at the drain, considered out of circulation.
    pub fn get_drained_amount(&self) -> u128 {
        self.balance_of(&self.drain)
    }

    pub fn get_circulating_supply(&self) -> u128 {
        self.get_total_supply()
            .saturating_sub(self.get_drained_amount())
    }

    pub fn chain_len(&self) -> usize {
        self.lock_state().blocks.len()
    }

    pub fn latest_block(&self) -> Block {
        let state = self.lock_state();
        state.blocks.last().cloned().expect("genesis always present")
    }

    pub fn block_at(&self, index: usize) -> Option<Block> {
        self.lock_state().blocks.get(index).cloned()
    }

    pub fn mempool_len(&self) -> usize {
        self.lock_state().mempool.len()
    }

    pub fn mempool_contains(&self, hash: &str) -> bool {
        self.lock_state().mempool.contains(hash)
    }

    pub fn contract_registered(&self, address: &Address) -> bool {
        self.lock_state().contracts.contains_key(address)
    }

    /// Run a registered contract's view off-chain (free, read-only).
    pub fn contract_view(
        &self,
        address: &Address,
        view: &str,
        args: &[String],
    ) -> Result<Option<String>, ChainError> {
        let state = self.lock_state();
        let Some(contract) = state.contracts.get(address) else {
            return Err(ChainError::UnknownContract(address.to_string()));
        };
        contract.view(view, args).map_err(Into::into)
    }

    /// Find a committed transaction by hash.
    pub fn find_committed(&self, hash: &str) -> Option<Transaction> {
        let state = self.lock_state();
        state
            .blocks
            .iter()
            .flat_map(|block| block.data.iter())
            .find(|tx| tx.hash == hash)
            .cloned()
    }

    pub fn stats(&self) -> ChainStats {
        let state = self.lock_state();
        let total = total_supply(&state.blocks);
        let drained = ledger_balance(&state.blocks, &self.config, &self.drain);
        ChainStats {
            blocks: state.blocks.len(),
            contracts: state.contracts.len(),
            mempool: state.mempool.stats(),
            total_supply: total,
            drained,
            circulating: total.saturating_sub(drained),
        }
    }

    /// Re-validate the whole chain: linkage, Merkle roots, seals and
    /// committed signatures. Any failure is an invariant violation.
    pub fn validate_integrity(&self) -> Result<(), ChainError> {
        let state = self.lock_state();
        for (height, block) in state.blocks.iter().enumerate() {
            if block.data.is_empty() {
                return Err(ChainError::InvariantViolation(format!(
                    "block #{height} is empty"
                )));
            }
            if height > 0 {
                let previous = &state.blocks[height - 1];
                if block.previous_hash != previous.hash {
                    return Err(ChainError::InvariantViolation(format!(
                        "block #{height} does not link to its predecessor"
                    )));
                }
            }
            let hashes: Vec<String> = block.data.iter().map(|tx| tx.hash.clone()).collect();
            if aula_core::merkle::merkle_root(&hashes) != block.merkle_root {
                return Err(ChainError::InvariantViolation(format!(
                    "block #{height} has a stale Merkle root"
                )));
            }
            self.consensus.validate_block(block, height, &self.config)?;
            for tx in &block.data {
                if !tx.verify() {
                    return Err(ChainError::InvariantViolation(format!(
                        "committed transaction {} fails verification",
                        tx.hash
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Apply a delta to an already-loaded running balance.
fn adjust(running: &mut HashMap<Address, i128>, address: &Address, delta: i128) {
    if let Some(balance) = running.get_mut(address) {
        *balance += delta;
    }
}

/// Lazily load an address into the running-balance map from the ledger.
fn running_balance(
    running: &mut HashMap<Address, i128>,
    blocks: &[Block],
    cfg: &ChainConfig,
    address: &Address,
) -> i128 {
    if let Some(balance) = running.get(address) {
        return *balance;
    }
    let balance = ledger_balance(blocks, cfg, address) as i128;
    running.insert(address.clone(), balance);
    balance
}

fn revert_preflight(
    contracts: &mut BTreeMap<Address, Contract>,
    address: &Address,
    outcome: Option<&CallOutcome>,
) {
    if let (Some(outcome), Some(contract)) = (outcome, contracts.get_mut(address)) {
        if let Some(snapshot) = outcome.snapshot.as_ref() {
            contract.storage = snapshot.clone();
        }
    }
}

/// Replay the ledger for one address: credit incoming amounts, debit the
/// full spend (amount + fees + gas) of outgoing ones. GasOnly entries
/// only ever charge gas.
fn ledger_balance(blocks: &[Block], cfg: &ChainConfig, address: &Address) -> u128 {
    let mut balance: i128 = 0;
    for block in blocks {
        for tx in &block.data {
            if tx.tx_type == TxType::GasOnly {
                if tx.from.as_ref() == Some(address) {
                    balance -= tx.gas_charge(cfg) as i128;
                }
                continue;
            }
            if &tx.to == address {
                balance += tx.amount as i128;
            }
            if tx.from.as_ref() == Some(address) {
                balance -= tx.total_spend(cfg) as i128;
            }
        }
    }
    balance.max(0) as u128
}

fn total_supply(blocks: &[Block]) -> u128 {
    blocks
        .iter()
        .flat_map(|block| block.data.iter())
        .filter(|tx| tx.tx_type.is_minted())
        .map(|tx| tx.amount)
        .sum()
}
