// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - TRANSACTION
//
// Immutable value-transfer / contract-action record. Hash is SHA-256 over
// the `-`-joined ASCII fields; wallet-sender types are signed over that
// hash at construction. The block pipeline may later downgrade a
// ContractCall to GasOnly and fill in gas_used / call_result — everything
// else stays frozen.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::{timestamp_micros, ChainConfig, CoreError, Wallet};
use aula_crypto::{address_to_public_key, sha256_hex, verify_signature, Address};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxType {
    Genesis,
    Transaction,
    Reward,
    Fees,
    ContractDeploy,
    ContractCall,
    Withdrawal,
    GasOnly,
    Stake,
    Unstake,
}

impl TxType {
    /// Single-char code for compact logging and hash inputs.
    pub fn code(self) -> char {
        match self {
            TxType::Genesis => '_',
            TxType::Transaction => 'T',
            TxType::Reward => 'R',
            TxType::Fees => 'F',
            TxType::ContractDeploy => 'D',
            TxType::ContractCall => 'C',
            TxType::Withdrawal => 'W',
            TxType::GasOnly => 'G',
            TxType::Stake => 'S',
            TxType::Unstake => 'U',
        }
    }

    /// Types whose sender is a wallet and must sign the hash.
    ///
    /// Unstake is excluded by convention: its sender is the drain, which
    /// has no key. Synthesized types (Genesis, Reward, Fees, Withdrawal)
    /// have no wallet sender either. GasOnly keeps the signature it was
    /// given as a ContractCall and is checked separately.
    pub fn requires_signature(self) -> bool {
        matches!(
            self,
            TxType::Transaction | TxType::ContractDeploy | TxType::ContractCall | TxType::Stake
        )
    }

    /// Types minted out of thin air (counted by total supply).
    pub fn is_minted(self) -> bool {
        matches!(self, TxType::Genesis | TxType::Reward)
    }
}

/// Outcome of a contract-call preflight, recorded on the transaction for
/// anyone inspecting the committed block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResult {
    pub success: bool,
    pub result: Option<String>,
    pub error: Option<String>,
    pub gas_used: u64,
}

/// Construction parameters for [`Transaction::build`].
#[derive(Debug, Clone)]
pub struct TxDraft {
    pub tx_type: TxType,
    pub from: Option<Address>,
    pub to: Address,
    pub amount: u128,
    pub fee_bps: u64,
    pub contract: Option<Address>,
    pub function: Option<String>,
    pub args: Vec<String>,
    pub gas_limit: u64,
}

impl TxDraft {
    pub fn new(tx_type: TxType, from: Option<Address>, to: Address, amount: u128) -> Self {
        TxDraft {
            tx_type,
            from,
            to,
            amount,
            fee_bps: 0,
            contract: None,
            function: None,
            args: Vec::new(),
            gas_limit: 0,
        }
    }

    pub fn fee_bps(mut self, fee_bps: u64) -> Self {
        self.fee_bps = fee_bps;
        self
    }

    pub fn contract(mut self, contract: Address) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn call(mut self, function: &str, args: Vec<String>, gas_limit: u64) -> Self {
        self.function = Some(function.to_string());
        self.args = args;
        self.gas_limit = gas_limit;
        self
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_type: TxType,
    pub from: Option<Address>,
    pub to: Address,
    pub amount: u128,
    /// Percentage fee in basis points; 0 unless type is Transaction or Stake.
    pub fee_bps: u64,
    /// Unix microseconds at construction.
    pub timestamp: u64,
    pub hash: String,
    pub signature: Option<String>,
    /// Contract address for ContractDeploy / ContractCall.
    pub contract: Option<Address>,
    pub function: Option<String>,
    pub args: Vec<String>,
    pub gas_limit: u64,
    /// Written by preflight.
    pub gas_used: u64,
    pub call_result: Option<CallResult>,
}

impl Transaction {
    /// Validate the draft, compute the hash and sign it when the type
    /// requires a wallet sender. The signer must own the `from` address.
    pub fn build(draft: TxDraft, signer: Option<&Wallet>) -> Result<Self, CoreError> {
        match draft.tx_type {
            TxType::Transaction if draft.from.is_none() => {
                return Err(CoreError::InvalidTransaction(
                    "transfer requires a sender".to_string(),
                ));
            }
            TxType::ContractDeploy if draft.contract.is_none() => {
                return Err(CoreError::InvalidTransaction(
                    "contract deploy requires a contract".to_string(),
                ));
            }
            TxType::ContractCall if draft.contract.is_none() || draft.function.is_none() => {
                return Err(CoreError::InvalidTransaction(
                    "contract call requires a contract and a function".to_string(),
                ));
            }
            _ => {}
        }

        let timestamp = timestamp_micros();
        let hash = Self::compute_hash(
            timestamp,
            draft.tx_type,
            draft.from.as_ref(),
            &draft.to,
            draft.amount,
            draft.fee_bps,
        );

        let signature = if draft.tx_type.requires_signature() {
            match (signer, draft.from.as_ref()) {
                (Some(wallet), Some(from)) if wallet.address() == from => {
                    Some(wallet.sign(&hash))
                }
                (Some(_), _) => {
                    return Err(CoreError::InvalidTransaction(
                        "signer does not own the sender address".to_string(),
                    ));
                }
                (None, _) => None, // unsigned; verify() rejects it at admission
            }
        } else {
            None
        };

        Ok(Transaction {
            tx_type: draft.tx_type,
            from: draft.from,
            to: draft.to,
            amount: draft.amount,
            fee_bps: draft.fee_bps,
            timestamp,
            hash,
            signature,
            contract: draft.contract,
            function: draft.function,
            args: draft.args,
            gas_limit: draft.gas_limit,
            gas_used: 0,
            call_result: None,
        })
    }

    /// Signed wallet-to-recipient transfer with the chain's default fees.
    pub fn transfer(
        from: &Wallet,
        to: &Address,
        amount: u128,
        cfg: &ChainConfig,
    ) -> Result<Self, CoreError> {
        Self::build(
            TxDraft::new(
                TxType::Transaction,
                Some(from.address().clone()),
                to.clone(),
                amount,
            )
            .fee_bps(cfg.default_fee_bps),
            Some(from),
        )
    }

    fn compute_hash(
        timestamp: u64,
        tx_type: TxType,
        from: Option<&Address>,
        to: &Address,
        amount: u128,
        fee_bps: u64,
    ) -> String {
        let from_part = from.map(Address::as_str).unwrap_or("0");
        sha256_hex(&format!(
            "{}-{}-{}-{}-{}-{}",
            timestamp,
            tx_type.code(),
            from_part,
            to,
            amount,
            fee_bps
        ))
    }

    /// Check the attached signature against the stored hash using the key
    /// recovered from the sender address. Types without a wallet sender
    /// pass by convention. A GasOnly transaction verifies with the
    /// signature it carried as a ContractCall (its hash is not recomputed
    /// on downgrade).
    pub fn verify(&self) -> bool {
        if matches!(
            self.tx_type,
            TxType::Genesis | TxType::Reward | TxType::Fees | TxType::Withdrawal | TxType::Unstake
        ) {
            return true;
        }
        let (Some(signature), Some(from)) = (self.signature.as_ref(), self.from.as_ref()) else {
            return false;
        };
        let Ok(public_key) = address_to_public_key(from) else {
            return false;
        };
        let Ok(sig_bytes) = hex::decode(signature) else {
            return false;
        };
        verify_signature(self.hash.as_bytes(), &sig_bytes, &public_key)
    }

    /// Percentage-plus-fixed fee; only Transaction and Stake carry fees.
    pub fn fee_amount(&self, cfg: &ChainConfig) -> u128 {
        match self.tx_type {
            TxType::Transaction | TxType::Stake => {
                cfg.fixed_tx_fee + self.amount * self.fee_bps as u128 / 10_000
            }
            _ => 0,
        }
    }

    /// Units charged for gas; nonzero only after preflight wrote gas_used.
    pub fn gas_charge(&self, cfg: &ChainConfig) -> u128 {
        match self.tx_type {
            TxType::ContractCall | TxType::GasOnly => self.gas_used as u128 * cfg.gas_price,
            _ => 0,
        }
    }

    /// Everything the sender pays if this transaction commits.
    pub fn total_spend(&self, cfg: &ChainConfig) -> u128 {
        match self.tx_type {
            TxType::ContractDeploy => self.amount,
            TxType::ContractCall => self.amount + self.gas_charge(cfg),
            TxType::GasOnly => self.gas_charge(cfg),
            _ => self.amount + self.fee_amount(cfg),
        }
    }

    /// Keep the call on-chain for the gas charge only; no value moves and
    /// no contract state survives. Hash and signature stay as issued.
    pub fn downgrade_to_gas_only(&mut self) {
        self.tx_type = TxType::GasOnly;
    }
}
