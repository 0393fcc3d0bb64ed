// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - CHAIN CONFIGURATION
//
// Every economic and operational parameter of a chain instance.
// Monetary fields are u128 base units; percentages are basis points.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::UNITS_PER_COIN;
use aula_crypto::AddressFormat;
use serde::{Deserialize, Serialize};

/// Full parameter set for one chain instance. `Default` carries the
/// reference values; tests and demos override individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub currency_name: String,
    pub currency_code: String,
    pub currency_symbol: String,
    /// Decimal places of one coin: 1 coin = 10^decimals units.
    pub decimals: u32,
    pub faucet_name: String,
    pub drain_name: String,
    /// Credited to the faucet by the genesis transaction.
    pub genesis_coins: u128,
    /// Mempool length that arms the auto-create-block timer.
    pub max_pending_transactions: usize,
    pub auto_block_delay_secs: u64,
    /// PoW target: leading hex zeros of the block hash.
    pub difficulty: u32,
    pub reward_per_mined_tx: u128,
    pub fixed_tx_fee: u128,
    /// Percentage fee on Transaction/Stake amounts, in basis points
    /// (100 = 1%).
    pub default_fee_bps: u64,
    /// Worker threads per PoW mining attempt.
    pub miner_pool_size: usize,
    /// Nonce range width assigned to each worker.
    pub max_block_nonce: u64,
    pub contract_deploy_base_fee: u128,
    /// Multiplied by the contract's code size.
    pub contract_deploy_per_byte_fee: u128,
    /// Units charged per gas unit.
    pub gas_price: u128,
    pub default_gas_limit: u64,
    pub max_gas_limit: u64,
    /// Base gas for any contract call.
    pub gas_cost_contract_call: u64,
    pub gas_cost_storage_read: u64,
    pub gas_cost_storage_write: u64,
    pub address_format: AddressFormat,
    /// Mempool entries older than this are pruned on admission.
    pub mempool_tx_ttl_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            currency_name: "Aulacoin".to_string(),
            currency_code: "AULA".to_string(),
            currency_symbol: "ꜛ".to_string(),
            decimals: 8,
            faucet_name: "Faucet".to_string(),
            drain_name: "Drain".to_string(),
            genesis_coins: 1_000 * UNITS_PER_COIN,
            max_pending_transactions: 10,
            auto_block_delay_secs: 2,
            difficulty: 3,
            reward_per_mined_tx: UNITS_PER_COIN / 10, // 0.10
            fixed_tx_fee: UNITS_PER_COIN / 20,        // 0.05
            default_fee_bps: 100,                     // 1%
            miner_pool_size: 4,
            max_block_nonce: 100_000_000,
            contract_deploy_base_fee: UNITS_PER_COIN / 2, // 0.50
            contract_deploy_per_byte_fee: UNITS_PER_COIN / 10_000, // 0.0001 per byte
            gas_price: 1_000,
            default_gas_limit: 1_000_000,
            max_gas_limit: 10_000_000,
            gas_cost_contract_call: 100,
            gas_cost_storage_read: 10,
            gas_cost_storage_write: 50,
            address_format: AddressFormat::Hex,
            mempool_tx_ttl_secs: 3_600,
        }
    }
}
