//! Wallet state persistence
//!
//! JSON snapshots of the full engine state: owner set, ledger, and audit
//! log in one file.

pub mod persistence;

pub use persistence::{StorageConfig, StorageError, WalletStorage};
