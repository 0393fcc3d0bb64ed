// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - CONTRACT RUNTIME
//
// Sandboxed execution of native contract functions over key/value storage.
// - Gas metering on every storage access (base cost + read/write costs)
// - Preflight with snapshot/revert: failed calls leave storage untouched,
//   successful calls hand the pre-call snapshot to the chain pipeline so
//   commit can still discard the mutation
// - Outgoing value leaves contracts only through collected transfers; the
//   pipeline turns them into internal Withdrawal transactions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use aula_core::{ChainConfig, Recipient};
use aula_crypto::{sha256_hex, Address};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub mod context;

pub use context::{CallCtx, Env, GasMeter, Msg, ViewCtx};

/// Reserved constructor name. Runs exactly once, at deploy commit, by the
/// creator, directly against real storage.
pub const INIT_FUNCTION: &str = "__init__";

/// Flat size contribution of each function or view in `code_size`.
/// Native fn pointers have no serialized body; this stands in for one.
pub const FUNCTION_SIZE_WEIGHT: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("out of gas: used {used} of limit {limit}")]
    OutOfGas { used: u64, limit: u64 },
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("caller is not authorized: {0}")]
    Ownership(String),
    #[error("duplicated token: {0}")]
    DuplicatedToken(String),
    #[error("non-existent token: {0}")]
    NonExistentToken(String),
    #[error("missing data: {0}")]
    MissingData(String),
    #[error("contract aborted: {0}")]
    Aborted(String),
    #[error("contract already initialized")]
    AlreadyInitialized,
}

/// State-mutating contract function: executes over a metered storage view.
pub type ContractFn = fn(&mut CallCtx<'_>, &[String]) -> Result<Option<String>, VmError>;

/// Read-only view function: executes over a frozen storage snapshot, free
/// of gas.
pub type ViewFn = fn(&ViewCtx<'_>, &[String]) -> Result<Option<String>, VmError>;

/// Deployable contract package: initial storage plus the function tables.
#[derive(Clone)]
pub struct ContractCode {
    pub name: String,
    pub storage: BTreeMap<String, String>,
    pub views: BTreeMap<String, ViewFn>,
    pub functions: BTreeMap<String, ContractFn>,
}

impl ContractCode {
    /// Deterministic size approximation used to price deployment:
    /// every function and view contributes its name length plus a flat
    /// body weight; initial storage contributes its key and value lengths.
    pub fn code_size(&self) -> usize {
        let fns: usize = self
            .functions
            .keys()
            .chain(self.views.keys())
            .map(|name| name.len() + FUNCTION_SIZE_WEIGHT)
            .sum();
        let storage: usize = self
            .storage
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum();
        fns + storage
    }
}

impl fmt::Debug for ContractCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractCode")
            .field("name", &self.name)
            .field("storage_keys", &self.storage.len())
            .field("views", &self.views.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A contract registered on (or pending registration to) the chain.
#[derive(Debug, Clone)]
pub struct Contract {
    name: String,
    creator: Address,
    creator_name: String,
    address: Address,
    deployed_at: u64,
    pub storage: BTreeMap<String, String>,
    pub initialized: bool,
    code: ContractCode,
}

impl Contract {
    pub fn new(code: ContractCode, creator: &dyn Recipient, deployed_at: u64) -> Self {
        let address = Address::new(sha256_hex(&format!(
            "{}-{}-{}",
            deployed_at,
            creator.address(),
            code.name
        )));
        Contract {
            name: code.name.clone(),
            creator: creator.address().clone(),
            creator_name: creator.name().to_string(),
            address,
            deployed_at,
            storage: code.storage.clone(),
            initialized: false,
            code,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn creator(&self) -> &Address {
        &self.creator
    }

    pub fn creator_name(&self) -> &str {
        &self.creator_name
    }

    pub fn deployed_at(&self) -> u64 {
        self.deployed_at
    }

    pub fn code_size(&self) -> usize {
        self.code.code_size()
    }

    /// Off-chain read: runs a view over a deep-frozen clone of storage.
    /// Consumes no gas and cannot mutate chain state.
    pub fn view(&self, name: &str, args: &[String]) -> Result<Option<String>, VmError> {
        let Some(function) = self.code.views.get(name).copied() else {
            return Err(VmError::UnknownFunction(name.to_string()));
        };
        let frozen = self.storage.clone();
        let ctx = ViewCtx::new(&frozen, self.address.clone(), self.creator.clone());
        function(&ctx, args)
    }
}

impl Recipient for Contract {
    fn address(&self) -> &Address {
        &self.address
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Event emitted during a call, recorded on the outcome for indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractEvent {
    pub contract: Address,
    pub event_type: String,
    pub data: BTreeMap<String, String>,
    pub timestamp: u64,
}

/// Per-access gas prices, lifted out of the chain config.
#[derive(Debug, Clone, Copy)]
pub struct GasCosts {
    pub call_base: u64,
    pub storage_read: u64,
    pub storage_write: u64,
}

impl GasCosts {
    pub fn from_config(cfg: &ChainConfig) -> Self {
        GasCosts {
            call_base: cfg.gas_cost_contract_call,
            storage_read: cfg.gas_cost_storage_read,
            storage_write: cfg.gas_cost_storage_write,
        }
    }

    fn free() -> Self {
        GasCosts {
            call_base: 0,
            storage_read: 0,
            storage_write: 0,
        }
    }
}

/// Everything a single call needs from the outside world.
#[derive(Debug, Clone)]
pub struct CallParams {
    pub caller: Address,
    pub function: String,
    pub args: Vec<String>,
    /// Value attached to the call, credited to the contract on commit.
    pub value: u128,
    pub gas_limit: u64,
    /// Contract balance as seen by the assembling block.
    pub contract_balance: u128,
    /// Burn sink address, exposed to contract code.
    pub drain: Address,
}

/// Result of a preflight execution.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub success: bool,
    pub result: Option<String>,
    pub error: Option<String>,
    pub gas_used: u64,
    /// Transfers the contract requested; the pipeline pays them out as
    /// Withdrawal transactions if the contract balance covers them.
    pub transfers: Vec<(Address, u128)>,
    pub events: Vec<ContractEvent>,
    /// Pre-call storage, present on success so commit can still revert.
    pub snapshot: Option<BTreeMap<String, String>>,
}

impl CallOutcome {
    fn failure(error: VmError, gas_used: u64) -> Self {
        CallOutcome {
            success: false,
            result: None,
            error: Some(error.to_string()),
            gas_used,
            transfers: Vec::new(),
            events: Vec::new(),
            snapshot: None,
        }
    }
}

/// Executes contract functions with metering and snapshot/revert.
#[derive(Debug, Clone)]
pub struct ContractRuntime {
    costs: GasCosts,
}

impl ContractRuntime {
    pub fn new(costs: GasCosts) -> Self {
        ContractRuntime { costs }
    }

    /// Preflight a call. Storage is mutated in place through the meter;
    /// on any error the pre-call snapshot is restored and the outcome
    /// carries the error. An out-of-gas trap charges the full gas limit
    /// no matter where it fired.
    pub fn call(&self, contract: &mut Contract, params: &CallParams) -> CallOutcome {
        let mut meter = GasMeter::new(params.gas_limit, self.costs);
        if let Err(err) = meter.charge_base() {
            return CallOutcome::failure(err, params.gas_limit);
        }

        if params.function == INIT_FUNCTION {
            // The constructor is not callable; it runs once at deploy.
            return CallOutcome::failure(
                VmError::UnknownFunction(params.function.clone()),
                meter.used(),
            );
        }
        let Some(function) = contract.code.functions.get(&params.function).copied() else {
            return CallOutcome::failure(
                VmError::UnknownFunction(params.function.clone()),
                meter.used(),
            );
        };

        let snapshot = contract.storage.clone();
        let mut ctx = CallCtx::new(
            &mut contract.storage,
            snapshot.clone(),
            contract.code.views.clone(),
            meter,
            Msg {
                sender: params.caller.clone(),
                value: params.value,
            },
            contract.creator.clone(),
            contract.address.clone(),
            Env {
                contract_balance: params.contract_balance,
                drain: params.drain.clone(),
            },
        );

        match function(&mut ctx, &params.args) {
            Ok(result) => {
                let (gas_used, transfers, events) = ctx.finish();
                CallOutcome {
                    success: true,
                    result,
                    error: None,
                    gas_used,
                    transfers,
                    events,
                    snapshot: Some(snapshot),
                }
            }
            Err(err) => {
                let gas_used = if matches!(err, VmError::OutOfGas { .. }) {
                    params.gas_limit
                } else {
                    ctx.gas_used()
                };
                drop(ctx);
                contract.storage = snapshot;
                debug!(
                    "call {}::{} reverted: {err}",
                    contract.name, params.function
                );
                CallOutcome::failure(err, gas_used)
            }
        }
    }

    /// Run `__init__` at deploy commit: exactly once, creator only,
    /// unmetered, writing directly to real storage. Deployment is atomic
    /// with initialization, so there is no snapshot to revert to.
    pub fn init(
        &self,
        contract: &mut Contract,
        initiator: &Address,
        args: &[String],
        drain: &Address,
    ) -> Result<(), VmError> {
        if contract.initialized {
            return Err(VmError::AlreadyInitialized);
        }
        if initiator != &contract.creator {
            return Err(VmError::Ownership(format!(
                "only the creator may initialize {}",
                contract.name
            )));
        }
        if let Some(init) = contract.code.functions.get(INIT_FUNCTION).copied() {
            let snapshot = contract.storage.clone();
            let mut ctx = CallCtx::new(
                &mut contract.storage,
                snapshot,
                contract.code.views.clone(),
                GasMeter::unmetered(),
                Msg {
                    sender: initiator.clone(),
                    value: 0,
                },
                contract.creator.clone(),
                contract.address.clone(),
                Env {
                    contract_balance: 0,
                    drain: drain.clone(),
                },
            );
            init(&mut ctx, args)?;
        }
        contract.initialized = true;
        Ok(())
    }
}
