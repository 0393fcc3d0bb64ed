// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA SAMPLE CONTRACT - COUNTER
//
// Owner-gated counter. __init__ records the owner (first argument, or the
// deployer); only the owner may increment.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::{parse_units, units_to_string};
use aula_vm::{CallCtx, ContractCode, ContractFn, ViewCtx, ViewFn, VmError, INIT_FUNCTION};
use std::collections::BTreeMap;

/// Build the counter contract package.
pub fn counter() -> ContractCode {
    let mut functions: BTreeMap<String, ContractFn> = BTreeMap::new();
    functions.insert(INIT_FUNCTION.to_string(), init);
    functions.insert("increment".to_string(), increment);
    functions.insert("reset".to_string(), reset);

    let mut views: BTreeMap<String, ViewFn> = BTreeMap::new();
    views.insert("get_count".to_string(), get_count);
    views.insert("get_owner".to_string(), get_owner);

    let mut storage = BTreeMap::new();
    storage.insert("count".to_string(), "0".to_string());

    ContractCode {
        name: "counter".to_string(),
        storage,
        views,
        functions,
    }
}

fn init(ctx: &mut CallCtx<'_>, args: &[String]) -> Result<Option<String>, VmError> {
    let owner = args
        .first()
        .cloned()
        .unwrap_or_else(|| ctx.msg.sender.to_string());
    ctx.set("owner", owner)?;
    Ok(None)
}

fn require_owner(ctx: &mut CallCtx<'_>) -> Result<(), VmError> {
    let owner = ctx
        .get("owner")?
        .ok_or_else(|| VmError::MissingData("owner".to_string()))?;
    if owner != ctx.msg.sender.as_str() {
        return Err(VmError::Ownership(format!(
            "{} does not own this counter",
            ctx.msg.sender
        )));
    }
    Ok(())
}

fn increment(ctx: &mut CallCtx<'_>, args: &[String]) -> Result<Option<String>, VmError> {
    require_owner(ctx)?;
    let step = args.first().map(|s| parse_units(s)).unwrap_or(1).max(1);
    let count = parse_units(&ctx.get("count")?.unwrap_or_default());
    let next = count.saturating_add(step);
    ctx.set("count", units_to_string(next))?;
    Ok(Some(units_to_string(next)))
}

fn reset(ctx: &mut CallCtx<'_>, _args: &[String]) -> Result<Option<String>, VmError> {
    require_owner(ctx)?;
    ctx.set("count", "0")?;
    Ok(None)
}

fn get_count(ctx: &ViewCtx<'_>, _args: &[String]) -> Result<Option<String>, VmError> {
    Ok(Some(ctx.get("count").unwrap_or_else(|| "0".to_string())))
}

fn get_owner(ctx: &ViewCtx<'_>, _args: &[String]) -> Result<Option<String>, VmError> {
    Ok(ctx.get("owner"))
}
