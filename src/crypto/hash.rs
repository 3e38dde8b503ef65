//! SHA-256 hashing utilities
//!
//! Used for principal address derivation and transaction identifiers.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Base58Check-encode a payload with the given version byte
///
/// Checksum is the first 4 bytes of double SHA-256 over version || payload.
pub fn base58check(version: u8, payload: &[u8]) -> String {
    let mut bytes = vec![version];
    bytes.extend_from_slice(payload);

    let checksum = sha256(&sha256(&bytes));
    bytes.extend_from_slice(&checksum[..4]);

    bs58::encode(bytes).into_string()
}
