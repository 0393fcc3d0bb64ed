//! # Aula
//!
//! An in-memory educational blockchain: cryptographically signed
//! transactions in proof-of-work or proof-of-stake blocks, a FIFO mempool
//! with balance-aware block assembly, and a gas-metered native contract
//! runtime with preflight-then-commit semantics.
//!
//! This crate re-exports the workspace surface:
//! - [`aula_core`] — config, wallets, transactions, Merkle tree, blocks
//! - [`aula_crypto`] — secp256k1 keys and address derivation
//! - [`aula_vm`] — the contract runtime
//! - [`aula_chain`] — the ledger engine and consensus variants

pub use aula_chain::{
    Blockchain, CallOpts, ChainError, ChainStats, Consensus, ConsensusKind, Mempool, MempoolStats,
    PosBlockchain, PowBlockchain, ProofOfStake, ProofOfWork, Sealer,
};
pub use aula_core::{
    coins, timestamp_micros, Block, CallResult, ChainConfig, CoreError, Recipient, Transaction,
    TxDraft, TxType, Wallet, UNITS_PER_COIN,
};
pub use aula_crypto::{
    burn_address, public_key_to_address, validate_address, Address, AddressFormat, CryptoError,
    Keypair,
};
pub use aula_vm::{
    CallCtx, CallOutcome, CallParams, Contract, ContractCode, ContractEvent, ContractRuntime,
    GasCosts, ViewCtx, VmError, INIT_FUNCTION,
};
