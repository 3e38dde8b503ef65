//! Quorum-Wallet: a tiered-quorum multi-signature authorization engine
//!
//! This crate provides a self-governing multi-signature wallet featuring:
//! - Tiered security levels with live-recomputed quorum thresholds
//! - An append-only transaction ledger with per-owner confirmations
//! - Quorum-gated owner management (adds/removes are themselves transactions)
//! - A self-escalation guard against smuggling governance changes through
//!   the generic submission path
//! - Structured audit events for every state transition
//! - JSON persistence for the full engine state
//!
//! # Example
//!
//! ```rust
//! use quorum_wallet::crypto::KeyPair;
//! use quorum_wallet::engine::{MultisigWallet, NullDispatcher};
//!
//! // Provision a wallet with two owners and a floor of one
//! let alice = KeyPair::generate().address();
//! let bob = KeyPair::generate().address();
//! let mut wallet = MultisigWallet::new(vec![alice.clone(), bob.clone()], 1).unwrap();
//!
//! // Alice proposes an ordinary transfer; Bob's confirmation executes it
//! let mut dispatcher = NullDispatcher;
//! let tx_id = wallet
//!     .submit_transaction(&alice, "recipient", 500, vec![], true)
//!     .unwrap();
//! wallet.confirm_transaction(&bob, tx_id, &mut dispatcher).unwrap();
//!
//! assert!(wallet.get_transaction(tx_id).unwrap().executed);
//! ```

pub mod crypto;
pub mod engine;
pub mod storage;
pub mod token;

// Re-export commonly used types
pub use crypto::KeyPair;
pub use engine::{
    DispatchError, Dispatcher, MultisigWallet, NullDispatcher, OwnerAction, QuorumPolicy,
    SecurityLevel, Transaction, WalletError, WalletEvent, WalletEventKind,
};
pub use storage::{StorageConfig, WalletStorage};
pub use token::{Token, TokenCall, TokenError};
