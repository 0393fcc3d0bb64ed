// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - CALL CONTEXT
//
// What a contract function sees while it runs: metered storage accessors,
// message metadata, views over a frozen snapshot, and collectors for
// transfers and events. Storage never escapes unmetered.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::{ContractEvent, GasCosts, ViewFn, VmError};
use aula_core::timestamp_micros;
use aula_crypto::Address;
use std::collections::BTreeMap;

/// Per-call gas accounting. Every call starts at the base cost; each
/// storage access adds its price. Crossing the limit traps.
#[derive(Debug, Clone, Copy)]
pub struct GasMeter {
    used: u64,
    limit: u64,
    costs: GasCosts,
}

impl GasMeter {
    pub(crate) fn new(limit: u64, costs: GasCosts) -> Self {
        GasMeter {
            used: 0,
            limit,
            costs,
        }
    }

    /// Meter that never traps, for `__init__` at deploy commit.
    pub(crate) fn unmetered() -> Self {
        GasMeter {
            used: 0,
            limit: u64::MAX,
            costs: GasCosts::free(),
        }
    }

    fn charge(&mut self, amount: u64) -> Result<(), VmError> {
        self.used = self.used.saturating_add(amount);
        if self.used > self.limit {
            return Err(VmError::OutOfGas {
                used: self.used,
                limit: self.limit,
            });
        }
        Ok(())
    }

    pub(crate) fn charge_base(&mut self) -> Result<(), VmError> {
        let base = self.costs.call_base;
        self.charge(base)
    }

    fn charge_read(&mut self) -> Result<(), VmError> {
        let cost = self.costs.storage_read;
        self.charge(cost)
    }

    fn charge_write(&mut self) -> Result<(), VmError> {
        let cost = self.costs.storage_write;
        self.charge(cost)
    }

    pub fn used(&self) -> u64 {
        self.used
    }
}

/// Caller metadata, mirroring `msg` in the usual contract idiom.
#[derive(Debug, Clone)]
pub struct Msg {
    pub sender: Address,
    /// Units attached to the call, credited to the contract on commit.
    pub value: u128,
}

/// Chain environment visible to the contract.
#[derive(Debug, Clone)]
pub struct Env {
    pub contract_balance: u128,
    pub drain: Address,
}

/// Mutable execution context handed to contract functions.
pub struct CallCtx<'a> {
    storage: &'a mut BTreeMap<String, String>,
    /// Deep-frozen copy of storage taken at call start; views read this.
    view_snapshot: BTreeMap<String, String>,
    views: BTreeMap<String, ViewFn>,
    meter: GasMeter,
    pub msg: Msg,
    pub creator: Address,
    pub address: Address,
    pub env: Env,
    transfers: Vec<(Address, u128)>,
    events: Vec<ContractEvent>,
}

impl<'a> CallCtx<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        storage: &'a mut BTreeMap<String, String>,
        view_snapshot: BTreeMap<String, String>,
        views: BTreeMap<String, ViewFn>,
        meter: GasMeter,
        msg: Msg,
        creator: Address,
        address: Address,
        env: Env,
    ) -> Self {
        CallCtx {
            storage,
            view_snapshot,
            views,
            meter,
            msg,
            creator,
            address,
            env,
            transfers: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Metered storage read.
    pub fn get(&mut self, key: &str) -> Result<Option<String>, VmError> {
        self.meter.charge_read()?;
        Ok(self.storage.get(key).cloned())
    }

    /// Metered storage write.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), VmError> {
        self.meter.charge_write()?;
        self.storage.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Metered storage delete (priced as a write).
    pub fn remove(&mut self, key: &str) -> Result<Option<String>, VmError> {
        self.meter.charge_write()?;
        Ok(self.storage.remove(key))
    }

    /// Request a payout from the contract balance. Collected per call; the
    /// chain pays them out as Withdrawal transactions if the contract can
    /// cover the total.
    pub fn transfer(&mut self, to: Address, amount: u128) {
        self.transfers.push((to, amount));
    }

    /// Emit an event for off-chain indexing. Free of gas.
    pub fn emit(&mut self, event_type: &str, data: BTreeMap<String, String>) {
        self.events.push(ContractEvent {
            contract: self.address.clone(),
            event_type: event_type.to_string(),
            data,
            timestamp: timestamp_micros(),
        });
    }

    /// Run one of the contract's views against the call-start snapshot.
    /// Unmetered and blind to writes made during this call.
    pub fn view(&self, name: &str, args: &[String]) -> Result<Option<String>, VmError> {
        let Some(function) = self.views.get(name).copied() else {
            return Err(VmError::UnknownFunction(name.to_string()));
        };
        let ctx = ViewCtx::new(&self.view_snapshot, self.address.clone(), self.creator.clone());
        function(&ctx, args)
    }

    pub fn gas_used(&self) -> u64 {
        self.meter.used()
    }

    /// Tear down the context, releasing what the pipeline needs.
    pub(crate) fn finish(self) -> (u64, Vec<(Address, u128)>, Vec<ContractEvent>) {
        let CallCtx {
            meter,
            transfers,
            events,
            ..
        } = self;
        (meter.used(), transfers, events)
    }
}

/// Read-only context for views. Reads are free and nothing can mutate.
pub struct ViewCtx<'a> {
    storage: &'a BTreeMap<String, String>,
    pub contract: Address,
    pub creator: Address,
}

impl<'a> ViewCtx<'a> {
    pub(crate) fn new(
        storage: &'a BTreeMap<String, String>,
        contract: Address,
        creator: Address,
    ) -> Self {
        ViewCtx {
            storage,
            contract,
            creator,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.storage.get(key).cloned()
    }
}
