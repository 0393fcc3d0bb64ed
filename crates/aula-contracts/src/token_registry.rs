// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA SAMPLE CONTRACT - TOKEN REGISTRY
//
// Named tokens owned by addresses, plus a payable deposit/withdraw pair.
// Storage layout:
//   token:{id}     -> owner address
//   deposit:{addr} -> units held for addr inside the contract balance
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::{parse_units, units_to_string};
use aula_vm::{CallCtx, ContractCode, ContractFn, ViewCtx, ViewFn, VmError, INIT_FUNCTION};
use std::collections::BTreeMap;

/// Build the token registry contract package.
pub fn token_registry() -> ContractCode {
    let mut functions: BTreeMap<String, ContractFn> = BTreeMap::new();
    functions.insert(INIT_FUNCTION.to_string(), init);
    functions.insert("mint".to_string(), mint);
    functions.insert("transfer_token".to_string(), transfer_token);
    functions.insert("deposit".to_string(), deposit);
    functions.insert("withdraw".to_string(), withdraw);

    let mut views: BTreeMap<String, ViewFn> = BTreeMap::new();
    views.insert("owner_of".to_string(), owner_of);
    views.insert("deposit_of".to_string(), deposit_of);

    ContractCode {
        name: "token_registry".to_string(),
        storage: BTreeMap::new(),
        views,
        functions,
    }
}

fn token_key(id: &str) -> String {
    format!("token:{id}")
}

fn deposit_key(addr: &str) -> String {
    format!("deposit:{addr}")
}

fn init(ctx: &mut CallCtx<'_>, _args: &[String]) -> Result<Option<String>, VmError> {
    let registrar = ctx.msg.sender.to_string();
    ctx.set("registrar", registrar)?;
    Ok(None)
}

/// Mint a fresh token to the caller. Fails if the id is taken.
fn mint(ctx: &mut CallCtx<'_>, args: &[String]) -> Result<Option<String>, VmError> {
    let id = args
        .first()
        .ok_or_else(|| VmError::MissingData("token id".to_string()))?;
    let key = token_key(id);
    if ctx.get(&key)?.is_some() {
        return Err(VmError::DuplicatedToken(id.clone()));
    }
    let owner = ctx.msg.sender.to_string();
    ctx.set(&key, owner)?;

    let mut data = BTreeMap::new();
    data.insert("id".to_string(), id.clone());
    data.insert("owner".to_string(), ctx.msg.sender.to_string());
    ctx.emit("Mint", data);
    Ok(Some(id.clone()))
}

/// Hand a token to another address. Only the current owner may transfer.
fn transfer_token(ctx: &mut CallCtx<'_>, args: &[String]) -> Result<Option<String>, VmError> {
    let id = args
        .first()
        .ok_or_else(|| VmError::MissingData("token id".to_string()))?;
    let to = args
        .get(1)
        .ok_or_else(|| VmError::MissingData("recipient".to_string()))?;
    let key = token_key(id);
    let owner = ctx
        .get(&key)?
        .ok_or_else(|| VmError::NonExistentToken(id.clone()))?;
    if owner != ctx.msg.sender.as_str() {
        return Err(VmError::Ownership(format!(
            "{} does not own token {id}",
            ctx.msg.sender
        )));
    }
    ctx.set(&key, to.clone())?;
    Ok(None)
}

/// Payable: book the attached value against the caller.
fn deposit(ctx: &mut CallCtx<'_>, _args: &[String]) -> Result<Option<String>, VmError> {
    if ctx.msg.value == 0 {
        return Err(VmError::MissingData("attached value".to_string()));
    }
    let key = deposit_key(ctx.msg.sender.as_str());
    let held = parse_units(&ctx.get(&key)?.unwrap_or_default());
    let next = held.saturating_add(ctx.msg.value);
    ctx.set(&key, units_to_string(next))?;
    Ok(Some(units_to_string(next)))
}

/// Pay booked units back out to the caller via an internal withdrawal.
fn withdraw(ctx: &mut CallCtx<'_>, args: &[String]) -> Result<Option<String>, VmError> {
    let amount = args
        .first()
        .map(|s| parse_units(s))
        .ok_or_else(|| VmError::MissingData("amount".to_string()))?;
    let key = deposit_key(ctx.msg.sender.as_str());
    let held = parse_units(&ctx.get(&key)?.unwrap_or_default());
    if amount == 0 || amount > held {
        return Err(VmError::Aborted(format!(
            "cannot withdraw {amount} of {held} held"
        )));
    }
    ctx.set(&key, units_to_string(held - amount))?;
    let to = ctx.msg.sender.clone();
    ctx.transfer(to, amount);
    Ok(Some(units_to_string(held - amount)))
}

fn owner_of(ctx: &ViewCtx<'_>, args: &[String]) -> Result<Option<String>, VmError> {
    let id = args
        .first()
        .ok_or_else(|| VmError::MissingData("token id".to_string()))?;
    Ok(ctx.get(&token_key(id)))
}

fn deposit_of(ctx: &ViewCtx<'_>, args: &[String]) -> Result<Option<String>, VmError> {
    let addr = args
        .first()
        .ok_or_else(|| VmError::MissingData("address".to_string()))?;
    Ok(Some(
        ctx.get(&deposit_key(addr)).unwrap_or_else(|| "0".to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aula_core::Wallet;
    use aula_crypto::burn_address;
    use aula_vm::{CallParams, Contract, ContractRuntime, GasCosts};

    fn runtime() -> ContractRuntime {
        ContractRuntime::new(GasCosts {
            call_base: 100,
            storage_read: 10,
            storage_write: 50,
        })
    }

    fn call(caller: &Wallet, function: &str, args: Vec<String>, value: u128) -> CallParams {
        CallParams {
            caller: caller.address().clone(),
            function: function.to_string(),
            args,
            value,
            gas_limit: 100_000,
            contract_balance: 0,
            drain: burn_address("Drain"),
        }
    }

    fn deployed(creator: &Wallet) -> Contract {
        let mut contract = Contract::new(token_registry(), creator, 1);
        runtime()
            .init(&mut contract, creator.address(), &[], &burn_address("Drain"))
            .unwrap();
        contract
    }

    #[test]
    fn test_mint_and_owner_view() {
        let alice = Wallet::new("Alice");
        let mut contract = deployed(&alice);
        let outcome = runtime().call(
            &mut contract,
            &call(&alice, "mint", vec!["sword".to_string()], 0),
        );
        assert!(outcome.success);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].event_type, "Mint");
        assert_eq!(
            contract
                .view("owner_of", &["sword".to_string()])
                .unwrap()
                .as_deref(),
            Some(alice.address().as_str())
        );
    }

    #[test]
    fn test_duplicate_mint_fails() {
        let alice = Wallet::new("Alice");
        let mut contract = deployed(&alice);
        runtime().call(
            &mut contract,
            &call(&alice, "mint", vec!["sword".to_string()], 0),
        );
        let outcome = runtime().call(
            &mut contract,
            &call(&alice, "mint", vec!["sword".to_string()], 0),
        );
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("duplicated token"));
    }

    #[test]
    fn test_transfer_requires_ownership() {
        let alice = Wallet::new("Alice");
        let bob = Wallet::new("Bob");
        let mut contract = deployed(&alice);
        runtime().call(
            &mut contract,
            &call(&alice, "mint", vec!["sword".to_string()], 0),
        );

        let stolen = runtime().call(
            &mut contract,
            &call(
                &bob,
                "transfer_token",
                vec!["sword".to_string(), bob.address().to_string()],
                0,
            ),
        );
        assert!(!stolen.success);

        let given = runtime().call(
            &mut contract,
            &call(
                &alice,
                "transfer_token",
                vec!["sword".to_string(), bob.address().to_string()],
                0,
            ),
        );
        assert!(given.success);
        assert_eq!(
            contract
                .view("owner_of", &["sword".to_string()])
                .unwrap()
                .as_deref(),
            Some(bob.address().as_str())
        );
    }

    #[test]
    fn test_transfer_of_missing_token_fails() {
        let alice = Wallet::new("Alice");
        let mut contract = deployed(&alice);
        let outcome = runtime().call(
            &mut contract,
            &call(
                &alice,
                "transfer_token",
                vec!["ghost".to_string(), alice.address().to_string()],
                0,
            ),
        );
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("non-existent token"));
    }

    #[test]
    fn test_deposit_then_withdraw_emits_transfer() {
        let alice = Wallet::new("Alice");
        let mut contract = deployed(&alice);
        let deposited = runtime().call(&mut contract, &call(&alice, "deposit", vec![], 500));
        assert!(deposited.success);
        assert_eq!(
            contract
                .view("deposit_of", &[alice.address().to_string()])
                .unwrap()
                .as_deref(),
            Some("500")
        );

        let withdrawn = runtime().call(
            &mut contract,
            &call(&alice, "withdraw", vec!["200".to_string()], 0),
        );
        assert!(withdrawn.success);
        assert_eq!(
            withdrawn.transfers,
            vec![(alice.address().clone(), 200u128)]
        );
        assert_eq!(
            contract
                .view("deposit_of", &[alice.address().to_string()])
                .unwrap()
                .as_deref(),
            Some("300")
        );
    }

    #[test]
    fn test_overdraw_fails_and_reverts() {
        let alice = Wallet::new("Alice");
        let mut contract = deployed(&alice);
        runtime().call(&mut contract, &call(&alice, "deposit", vec![], 100));
        let outcome = runtime().call(
            &mut contract,
            &call(&alice, "withdraw", vec!["9999".to_string()], 0),
        );
        assert!(!outcome.success);
        assert!(outcome.transfers.is_empty());
        assert_eq!(
            contract
                .view("deposit_of", &[alice.address().to_string()])
                .unwrap()
                .as_deref(),
            Some("100")
        );
    }
}
