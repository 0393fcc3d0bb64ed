// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - CRYPTOGRAPHY MODULE
//
// ECDSA over secp256k1 (RFC 6979 deterministic signing).
// - Keypair generation from the OS secure random source
// - Message signing and verification
// - Address derivation: the address IS an encoding of the compressed
//   public key, so verification can recover the key from a sender address
// - Burn addresses (SHA-256 of a label) for system sinks that never sign
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Byte length of a compressed SEC1 secp256k1 public key.
pub const COMPRESSED_PUBLIC_KEY_LEN: usize = 33;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key material")]
    InvalidKey,
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Wire encoding used for wallet addresses.
///
/// Both encodings carry the full compressed public key, so either can be
/// decoded back to the key for signature verification. Pick one per chain
/// and use it everywhere — hashes embed address strings verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AddressFormat {
    /// Lowercase hex of the compressed SEC1 point (66 chars).
    #[default]
    Hex,
    /// Base58 of the compressed SEC1 point.
    Base58,
}

/// Textual account identifier.
///
/// Wallet addresses decode to a secp256k1 public key; burn addresses are
/// SHA-256 digests of a label and have no key behind them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Address(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// secp256k1 keypair. The secret half never leaves this struct.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS secure random source.
    pub fn generate() -> Self {
        Keypair {
            signing: SigningKey::random(&mut OsRng),
        }
    }

    /// Compressed SEC1 encoding of the public key (33 bytes).
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signing
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    /// Sign a message. ECDSA with RFC 6979 nonces — same input, same
    /// signature. Returns the 64-byte fixed encoding.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing.sign(message);
        signature.to_bytes().to_vec()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

/// Verify a 64-byte signature against a compressed SEC1 public key.
/// Returns false on any decode or crypto error.
pub fn verify_signature(message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}

/// Derive an address from a compressed public key.
pub fn public_key_to_address(public_key: &[u8], format: AddressFormat) -> Address {
    match format {
        AddressFormat::Hex => Address(hex::encode(public_key)),
        AddressFormat::Base58 => Address(bs58::encode(public_key).into_string()),
    }
}

/// Recover the compressed public key from a wallet address.
///
/// The encoding is detected from the address shape: a 66-char lowercase hex
/// string is the hex form, anything else is tried as Base58. Burn addresses
/// fail here — there is no key to recover.
pub fn address_to_public_key(address: &Address) -> Result<Vec<u8>, CryptoError> {
    let raw = address.as_str();
    let bytes = if raw.len() == 2 * COMPRESSED_PUBLIC_KEY_LEN
        && raw.bytes().all(|b| b.is_ascii_hexdigit())
    {
        hex::decode(raw).map_err(|_| CryptoError::InvalidAddress(raw.to_string()))?
    } else {
        bs58::decode(raw)
            .into_vec()
            .map_err(|_| CryptoError::InvalidAddress(raw.to_string()))?
    };
    if bytes.len() != COMPRESSED_PUBLIC_KEY_LEN {
        return Err(CryptoError::InvalidAddress(raw.to_string()));
    }
    Ok(bytes)
}

/// True if the address decodes to a parseable public key.
pub fn validate_address(address: &Address) -> bool {
    match address_to_public_key(address) {
        Ok(bytes) => VerifyingKey::from_sec1_bytes(&bytes).is_ok(),
        Err(_) => false,
    }
}

/// Derive a keyless system address from a label (e.g. the drain).
/// These are SHA-256 digests — nothing can ever sign for them.
pub fn burn_address(label: &str) -> Address {
    Address(hex::encode(Sha256::digest(label.as_bytes())))
}

/// SHA-256 of an ASCII payload, lowercase hex. The chain builds all of its
/// hash inputs as `-`-joined ASCII fields and feeds them through here.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_round_trip() {
        let keys = Keypair::generate();
        let msg = b"aula block payload";
        let sig = keys.sign(msg);
        assert!(verify_signature(msg, &sig, &keys.public_key_bytes()));
    }

    #[test]
    fn test_tampered_message_fails() {
        let keys = Keypair::generate();
        let sig = keys.sign(b"original");
        assert!(!verify_signature(b"tampered", &sig, &keys.public_key_bytes()));
    }

    #[test]
    fn test_wrong_key_fails() {
        let keys = Keypair::generate();
        let other = Keypair::generate();
        let sig = keys.sign(b"payload");
        assert!(!verify_signature(b"payload", &sig, &other.public_key_bytes()));
    }

    #[test]
    fn test_garbage_signature_fails() {
        let keys = Keypair::generate();
        assert!(!verify_signature(b"payload", &[0u8; 64], &keys.public_key_bytes()));
        assert!(!verify_signature(b"payload", b"short", &keys.public_key_bytes()));
    }

    #[test]
    fn test_hex_address_round_trip() {
        let keys = Keypair::generate();
        let addr = public_key_to_address(&keys.public_key_bytes(), AddressFormat::Hex);
        assert_eq!(addr.as_str().len(), 66);
        assert!(validate_address(&addr));
        assert_eq!(address_to_public_key(&addr).unwrap(), keys.public_key_bytes());
    }

    #[test]
    fn test_base58_address_round_trip() {
        let keys = Keypair::generate();
        let addr = public_key_to_address(&keys.public_key_bytes(), AddressFormat::Base58);
        assert!(validate_address(&addr));
        assert_eq!(address_to_public_key(&addr).unwrap(), keys.public_key_bytes());
    }

    #[test]
    fn test_burn_address_has_no_key() {
        let drain = burn_address("Drain");
        assert!(!validate_address(&drain));
        // Deterministic: same label, same address.
        assert_eq!(drain, burn_address("Drain"));
        assert_ne!(drain, burn_address("Faucet"));
    }

    #[test]
    fn test_address_verifies_signature_end_to_end() {
        // The address alone must be enough to verify a signature.
        let keys = Keypair::generate();
        let addr = public_key_to_address(&keys.public_key_bytes(), AddressFormat::Hex);
        let sig = keys.sign(b"spend 42");
        let recovered = address_to_public_key(&addr).unwrap();
        assert!(verify_signature(b"spend 42", &sig, &recovered));
    }
}
