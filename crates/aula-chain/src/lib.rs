// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - LEDGER ENGINE
//
// The blockchain proper: transaction admission into a FIFO mempool, the
// block-assembly pipeline (preflight, running balances, reward and fee
// synthesis, sealing), replay-based balance queries, and the consensus
// seam with proof-of-work and proof-of-stake implementations.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod blockchain;
pub mod consensus;
pub mod error;
pub mod mempool;
pub mod pos;
pub mod pow;

pub use blockchain::{Blockchain, CallOpts, ChainStats};
pub use consensus::{Consensus, ConsensusKind, Sealer};
pub use error::ChainError;
pub use mempool::{Mempool, MempoolStats};
pub use pos::ProofOfStake;
pub use pow::ProofOfWork;

/// Chain sealed by mining.
pub type PowBlockchain = Blockchain<ProofOfWork>;
/// Chain sealed by validator signatures.
pub type PosBlockchain = Blockchain<ProofOfStake>;
