// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// INTEGRATION TESTS — block assembly pipeline (proof of work)
//
// Exercises admission, preflight, balance-aware selection, gas-only
// downgrade, withdrawal synthesis and the replay-based queries end to end.
// Run: cargo test -p aula-chain --test chain_pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use aula_chain::{Blockchain, CallOpts, ChainError, PowBlockchain, ProofOfWork};
use aula_contracts::{counter, token_registry};
use aula_core::{coins, ChainConfig, Transaction, TxType, Wallet};
use aula_crypto::burn_address;
use std::sync::Arc;

fn test_config() -> ChainConfig {
    ChainConfig {
        difficulty: 2,
        max_pending_transactions: 64, // keep the auto timer out of the way
        ..ChainConfig::default()
    }
}

fn pow_chain() -> Arc<PowBlockchain> {
    Blockchain::init(test_config(), ProofOfWork::new()).unwrap()
}

fn fund(chain: &Arc<PowBlockchain>, who: &Wallet, amount: u128) {
    let tx = Transaction::transfer(chain.faucet(), who.address(), amount, chain.config()).unwrap();
    chain.add_transaction(tx).unwrap();
    chain.create_block(None).unwrap().unwrap();
}

#[test]
fn test_fund_and_mine_pays_reward_and_fees() {
    let chain = pow_chain();
    let alice = Wallet::new("Alice");
    let bob = Wallet::new("Bob");

    let tx =
        Transaction::transfer(chain.faucet(), alice.address(), coins(100), chain.config()).unwrap();
    chain.add_transaction(tx).unwrap();
    let block = chain.create_block(Some(bob.address())).unwrap().unwrap();

    assert_eq!(chain.chain_len(), 2);
    // [Reward, Fees, transfer]
    assert_eq!(block.data.len(), 3);
    assert_eq!(block.data[0].tx_type, TxType::Reward);
    assert_eq!(block.data[1].tx_type, TxType::Fees);

    assert_eq!(chain.get_balance(&alice), coins(100));
    // reward 0.10 + fees (0.05 fixed + 1% of 100) = 1.15
    assert_eq!(chain.get_balance(&bob), 115_000_000);
    // 1000 - (100 + 1.05) = 898.95
    assert_eq!(chain.get_balance(chain.faucet().as_ref()), 89_895_000_000);
    chain.validate_integrity().unwrap();
}

#[test]
fn test_insufficient_funds_drops_but_retains_in_mempool() {
    let chain = pow_chain();
    let alice = Wallet::new("Alice");
    let bob = Wallet::new("Bob");
    fund(&chain, &alice, coins(1));

    let doomed = Transaction::transfer(&alice, bob.address(), coins(2), chain.config()).unwrap();
    chain.add_transaction(doomed.clone()).unwrap();
    let produced = chain.create_block(None).unwrap();

    assert!(produced.is_none(), "nothing eligible, no block");
    assert_eq!(chain.get_balance(&alice), coins(1));
    assert_eq!(chain.get_balance(&bob), 0);
    assert!(chain.mempool_contains(&doomed.hash));
}

#[test]
fn test_fifo_priority_when_balance_is_tight() {
    let chain = pow_chain();
    let alice = Wallet::new("Alice");
    let bob = Wallet::new("Bob");
    let carol = Wallet::new("Carol");
    fund(&chain, &alice, coins(10));

    let first = Transaction::transfer(&alice, bob.address(), coins(6), chain.config()).unwrap();
    let second = Transaction::transfer(&alice, carol.address(), coins(6), chain.config()).unwrap();
    chain.add_transaction(first.clone()).unwrap();
    chain.add_transaction(second.clone()).unwrap();
    chain.create_block(None).unwrap().unwrap();

    // Earlier submission wins; the later one waits in the mempool.
    assert_eq!(chain.get_balance(&bob), coins(6));
    assert_eq!(chain.get_balance(&carol), 0);
    assert!(!chain.mempool_contains(&first.hash));
    assert!(chain.mempool_contains(&second.hash));
}

#[test]
fn test_duplicate_admission_is_rejected() {
    let chain = pow_chain();
    let alice = Wallet::new("Alice");
    let tx =
        Transaction::transfer(chain.faucet(), alice.address(), coins(1), chain.config()).unwrap();
    chain.add_transaction(tx.clone()).unwrap();
    assert!(matches!(
        chain.add_transaction(tx),
        Err(ChainError::DuplicateTransaction(_))
    ));
}

#[test]
fn test_self_transfer_is_rejected() {
    let chain = pow_chain();
    let faucet_addr = chain.faucet().address().clone();
    let tx =
        Transaction::transfer(chain.faucet(), &faucet_addr, coins(1), chain.config()).unwrap();
    assert!(matches!(
        chain.add_transaction(tx),
        Err(ChainError::InvalidTransaction(_))
    ));
}

#[test]
fn test_call_to_unregistered_contract_stays_pending() {
    let chain = pow_chain();
    let alice = Wallet::new("Alice");
    fund(&chain, &alice, coins(10));

    let ghost = burn_address("no such contract");
    let hash = chain
        .call_contract(&alice, &ghost, "increment", vec![], CallOpts::default())
        .unwrap();
    assert!(chain.create_block(None).unwrap().is_none());
    assert!(chain.mempool_contains(&hash));
}

#[test]
fn test_deploy_then_call_counter() {
    let chain = pow_chain();
    let alice = Wallet::new("Alice");
    fund(&chain, &alice, coins(10));

    let address = chain.deploy_contract(counter(), &alice).unwrap();
    assert!(!chain.contract_registered(&address));
    chain.create_block(None).unwrap().unwrap();
    assert!(chain.contract_registered(&address));

    // __init__ ran with the creator as sender: alice owns the counter.
    assert_eq!(
        chain
            .contract_view(&address, "get_owner", &[])
            .unwrap()
            .as_deref(),
        Some(alice.address().as_str())
    );

    let hash = chain
        .call_contract(
            &alice,
            &address,
            "increment",
            vec!["5".to_string()],
            CallOpts::default(),
        )
        .unwrap();
    chain.create_block(None).unwrap().unwrap();

    assert_eq!(
        chain
            .contract_view(&address, "get_count", &[])
            .unwrap()
            .as_deref(),
        Some("5")
    );
    let committed = chain.find_committed(&hash).unwrap();
    assert_eq!(committed.tx_type, TxType::ContractCall);
    let call_result = committed.call_result.unwrap();
    assert!(call_result.success);
    assert!(call_result.gas_used <= committed.gas_limit);
    chain.validate_integrity().unwrap();
}

#[test]
fn test_deploy_fee_reaches_the_drain() {
    let chain = pow_chain();
    let alice = Wallet::new("Alice");
    fund(&chain, &alice, coins(10));
    let drained_before = chain.get_drained_amount();

    chain.deploy_contract(counter(), &alice).unwrap();
    chain.create_block(None).unwrap().unwrap();

    let cfg = chain.config();
    let code_size = counter().code_size() as u128;
    let fee = cfg.contract_deploy_base_fee + cfg.contract_deploy_per_byte_fee * code_size;
    assert_eq!(chain.get_drained_amount(), drained_before + fee);
    assert_eq!(chain.get_balance(&alice), coins(10) - fee);
}

#[test]
fn test_out_of_gas_charges_full_limit_and_reverts() {
    let chain = pow_chain();
    let alice = Wallet::new("Alice");
    fund(&chain, &alice, coins(10));

    let address = chain.deploy_contract(counter(), &alice).unwrap();
    chain.create_block(None).unwrap().unwrap();
    let balance_before = chain.get_balance(&alice);

    // Base cost fits exactly; the first storage access traps.
    let gas_limit = chain.config().gas_cost_contract_call;
    let hash = chain
        .call_contract(
            &alice,
            &address,
            "increment",
            vec!["5".to_string()],
            CallOpts {
                value: 0,
                gas_limit: Some(gas_limit),
            },
        )
        .unwrap();
    chain.create_block(None).unwrap().unwrap();

    let committed = chain.find_committed(&hash).unwrap();
    let call_result = committed.call_result.unwrap();
    assert!(!call_result.success);
    assert_eq!(call_result.gas_used, gas_limit);
    // Storage untouched, caller charged the full limit.
    assert_eq!(
        chain
            .contract_view(&address, "get_count", &[])
            .unwrap()
            .as_deref(),
        Some("0")
    );
    assert_eq!(
        chain.get_balance(&alice),
        balance_before - gas_limit as u128 * chain.config().gas_price
    );
}

#[test]
fn test_gas_limit_cap_is_enforced() {
    let chain = pow_chain();
    let alice = Wallet::new("Alice");
    let target = burn_address("whatever");
    let result = chain.call_contract(
        &alice,
        &target,
        "noop",
        vec![],
        CallOpts {
            value: 0,
            gas_limit: Some(chain.config().max_gas_limit + 1),
        },
    );
    assert!(matches!(result, Err(ChainError::GasLimitTooHigh { .. })));
}

#[test]
fn test_underfunded_call_downgrades_to_gas_only() {
    let chain = pow_chain();
    let alice = Wallet::new("Alice");
    fund(&chain, &alice, coins(20));

    let address = chain.deploy_contract(token_registry(), &alice).unwrap();
    chain.create_block(None).unwrap().unwrap();
    let balance_before = chain.get_balance(&alice);

    // Attach more value than alice holds; she can still pay for gas.
    let hash = chain
        .call_contract(
            &alice,
            &address,
            "deposit",
            vec![],
            CallOpts {
                value: coins(1_000),
                gas_limit: None,
            },
        )
        .unwrap();
    chain.create_block(None).unwrap().unwrap();

    let committed = chain.find_committed(&hash).unwrap();
    assert_eq!(committed.tx_type, TxType::GasOnly);
    // No deposit was booked and no value moved; only gas was charged.
    assert_eq!(
        chain
            .contract_view(&address, "deposit_of", &[alice.address().to_string()])
            .unwrap()
            .as_deref(),
        Some("0")
    );
    assert_eq!(chain.balance_of(&address), 0);
    assert_eq!(
        chain.get_balance(&alice),
        balance_before - committed.gas_used as u128 * chain.config().gas_price
    );
    chain.validate_integrity().unwrap();
}

#[test]
fn test_withdrawal_synthesis_pays_from_contract_balance() {
    let chain = pow_chain();
    let alice = Wallet::new("Alice");
    fund(&chain, &alice, coins(20));

    let address = chain.deploy_contract(token_registry(), &alice).unwrap();
    chain.create_block(None).unwrap().unwrap();

    chain
        .call_contract(
            &alice,
            &address,
            "deposit",
            vec![],
            CallOpts {
                value: coins(2),
                gas_limit: None,
            },
        )
        .unwrap();
    chain.create_block(None).unwrap().unwrap();
    assert_eq!(chain.balance_of(&address), coins(2));
    let balance_before = chain.get_balance(&alice);

    let hash = chain
        .call_contract(
            &alice,
            &address,
            "withdraw",
            vec![coins(1).to_string()],
            CallOpts::default(),
        )
        .unwrap();
    let block = chain.create_block(None).unwrap().unwrap();

    let withdrawal = block
        .data
        .iter()
        .find(|tx| tx.tx_type == TxType::Withdrawal)
        .expect("withdrawal synthesized");
    assert_eq!(withdrawal.from.as_ref(), Some(&address));
    assert_eq!(withdrawal.to, *alice.address());
    assert_eq!(withdrawal.amount, coins(1));

    assert_eq!(chain.balance_of(&address), coins(1));
    let committed = chain.find_committed(&hash).unwrap();
    let gas_paid = committed.gas_used as u128 * chain.config().gas_price;
    assert_eq!(chain.get_balance(&alice), balance_before + coins(1) - gas_paid);
    assert_eq!(
        chain
            .contract_view(&address, "deposit_of", &[alice.address().to_string()])
            .unwrap()
            .as_deref(),
        Some(&coins(1).to_string()[..])
    );
    chain.validate_integrity().unwrap();
}

#[test]
fn test_failed_call_reverts_storage_but_still_commits() {
    let chain = pow_chain();
    let alice = Wallet::new("Alice");
    let mallory = Wallet::new("Mallory");
    fund(&chain, &alice, coins(10));
    fund(&chain, &mallory, coins(10));

    let address = chain.deploy_contract(counter(), &alice).unwrap();
    chain.create_block(None).unwrap().unwrap();

    // Mallory is not the owner; the call reverts but is still committed
    // for accounting and charges her gas.
    let hash = chain
        .call_contract(&mallory, &address, "increment", vec![], CallOpts::default())
        .unwrap();
    chain.create_block(None).unwrap().unwrap();

    let committed = chain.find_committed(&hash).unwrap();
    let call_result = committed.call_result.unwrap();
    assert!(!call_result.success);
    assert!(call_result.error.unwrap().contains("not authorized"));
    assert_eq!(
        chain
            .contract_view(&address, "get_count", &[])
            .unwrap()
            .as_deref(),
        Some("0")
    );
}

#[test]
fn test_supply_accounting_and_conservation() {
    let chain = pow_chain();
    let alice = Wallet::new("Alice");
    let bob = Wallet::new("Bob");
    let miner = Wallet::new("Miner");

    let tx =
        Transaction::transfer(chain.faucet(), alice.address(), coins(50), chain.config()).unwrap();
    chain.add_transaction(tx).unwrap();
    chain.create_block(Some(miner.address())).unwrap().unwrap();

    let tx = Transaction::transfer(&alice, bob.address(), coins(5), chain.config()).unwrap();
    chain.add_transaction(tx).unwrap();
    chain.create_block(Some(miner.address())).unwrap().unwrap();

    let total = chain.get_total_supply();
    assert_eq!(
        total,
        chain.config().genesis_coins + 2 * chain.config().reward_per_mined_tx
    );

    // Every minted unit is attributable to a known holder.
    let holders: u128 = [
        chain.get_balance(chain.faucet().as_ref()),
        chain.get_balance(&alice),
        chain.get_balance(&bob),
        chain.get_balance(&miner),
        chain.get_drained_amount(),
    ]
    .iter()
    .sum();
    assert_eq!(holders, total);
    assert_eq!(
        chain.get_circulating_supply(),
        total - chain.get_drained_amount()
    );

    let stats = chain.stats();
    assert_eq!(stats.blocks, 3);
    assert_eq!(stats.total_supply, total);
}

#[test]
fn test_block_linkage_and_seal_survive_validation() {
    let chain = pow_chain();
    let alice = Wallet::new("Alice");
    fund(&chain, &alice, coins(3));
    fund(&chain, &alice, coins(3));

    let genesis = chain.block_at(0).unwrap();
    assert!(genesis.created, "PoW genesis is mined");
    let b1 = chain.block_at(1).unwrap();
    let b2 = chain.block_at(2).unwrap();
    assert_eq!(b1.previous_hash, genesis.hash);
    assert_eq!(b2.previous_hash, b1.hash);
    chain.validate_integrity().unwrap();
}
