// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - CORE MODULE
//
// Blockchain primitives: Wallet, Transaction, Merkle tree, Block and the
// proof-of-work nonce search. All financial arithmetic uses u128 base
// units (no floating-point); 1 coin = 10^8 units.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use aula_crypto::{Address, CryptoError};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub mod block;
pub mod config;
pub mod merkle;
pub mod transaction;
pub mod wallet;

pub use block::{leading_hex_zeros, meets_difficulty, Block};
pub use config::ChainConfig;
pub use transaction::{CallResult, Transaction, TxDraft, TxType};
pub use wallet::Wallet;

/// 1 coin = 100_000_000 units (10^8 precision, Bitcoin-style).
/// All amounts, fees and gas prices in this workspace are u128 unit counts,
/// so derived sums compare exactly.
pub const UNITS_PER_COIN: u128 = 100_000_000;

/// Whole coins to base units.
pub const fn coins(n: u128) -> u128 {
    n * UNITS_PER_COIN
}

/// Current unix time in microseconds. Microsecond granularity keeps hash
/// inputs of back-to-back transactions distinct.
pub fn timestamp_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("block must contain at least one transaction")]
    EmptyBlock,
    #[error("mining exhausted the nonce space")]
    MiningExhausted,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Anything that can sit on either end of a transaction: a wallet or a
/// deployed contract. The name is for logs and debugging only.
pub trait Recipient {
    fn address(&self) -> &Address;
    fn name(&self) -> &str;
}
