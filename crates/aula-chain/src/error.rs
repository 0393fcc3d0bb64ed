use aula_core::CoreError;
use aula_vm::VmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// A block is already being assembled; concurrent attempts fail fast.
    #[error("a block is already being created")]
    AlreadyMining,
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("transaction {0} is already in the mempool")]
    DuplicateTransaction(String),
    #[error("insufficient funds: need {required} units, have {available}")]
    InsufficientFunds { required: u128, available: u128 },
    #[error("unknown contract {0}")]
    UnknownContract(String),
    #[error("gas limit {requested} exceeds the maximum of {max}")]
    GasLimitTooHigh { requested: u64, max: u64 },
    /// Broken internal assumptions: bad linkage, unsealed blocks,
    /// missing preflight state. These abort the current operation.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Vm(#[from] VmError),
}
