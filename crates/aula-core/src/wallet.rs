// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - WALLET
//
// A named secp256k1 keypair plus its derived address. The wallet signs
// transaction and block hashes; the balance field is a display cache only —
// the ledger replay in the chain crate is always authoritative.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::Recipient;
use aula_crypto::{public_key_to_address, Address, AddressFormat, Keypair};
use std::fmt;

pub struct Wallet {
    name: String,
    keypair: Keypair,
    address: Address,
    balance_cache: i128,
}

impl Wallet {
    /// Generate a wallet with a fresh keypair and a hex address.
    pub fn new(name: &str) -> Self {
        Self::with_format(name, AddressFormat::Hex)
    }

    pub fn with_format(name: &str, format: AddressFormat) -> Self {
        let keypair = Keypair::generate();
        let address = public_key_to_address(&keypair.public_key_bytes(), format);
        Wallet {
            name: name.to_string(),
            keypair,
            address,
            balance_cache: 0,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.keypair.public_key_bytes()
    }

    /// Sign an ASCII hash string, returning the hex-encoded signature.
    pub fn sign(&self, payload: &str) -> String {
        hex::encode(self.keypair.sign(payload.as_bytes()))
    }

    /// Adjust the advisory balance cache. Display only; never consulted by
    /// admission or block assembly.
    pub fn update_balance(&mut self, delta: i128) {
        self.balance_cache += delta;
    }

    pub fn cached_balance(&self) -> i128 {
        self.balance_cache
    }
}

impl Recipient for Wallet {
    fn address(&self) -> &Address {
        &self.address
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("balance_cache", &self.balance_cache)
            .finish_non_exhaustive()
    }
}
