//! Principal identity primitives
//!
//! Owners and call targets are identified by Bitcoin-style Base58Check
//! addresses derived from secp256k1 public keys. Signing infrastructure is
//! deliberately absent: callers of the engine are assumed to already be
//! authenticated principals.

pub mod hash;
pub mod keys;

pub use hash::{sha256, sha256_hex};
pub use keys::{public_key_to_address, KeyError, KeyPair};
