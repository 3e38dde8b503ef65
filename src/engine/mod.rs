//! Tiered-quorum authorization engine
//!
//! Provides a self-governing multi-signature wallet where a proposed action
//! must collect confirmations from distinct owners before it executes. The
//! number of confirmations required depends on the action's security level
//! and is recomputed from the live owner set on every query.
//!
//! # Example
//!
//! ```ignore
//! use quorum_wallet::engine::{MultisigWallet, NullDispatcher};
//!
//! let mut wallet = MultisigWallet::new(vec![alice, bob, carol], 2)?;
//! let mut dispatcher = NullDispatcher;
//!
//! // Propose a transfer (auto-confirmed by the submitter)
//! let tx_id = wallet.submit_transaction(&alice, &recipient, 100, vec![], true)?;
//!
//! // Second confirmation reaches quorum and executes the transaction
//! wallet.confirm_transaction(&bob, tx_id, &mut dispatcher)?;
//! ```

pub mod dispatch;
pub mod events;
pub mod policy;
pub mod transaction;
pub mod wallet;

pub use dispatch::{DispatchError, Dispatcher, DispatchedCall, NullDispatcher, RecordingDispatcher};
pub use events::{WalletEvent, WalletEventKind};
pub use policy::{QuorumPolicy, SecurityLevel};
pub use transaction::{classify, OwnerAction, Transaction};
pub use wallet::{MultisigWallet, WalletError};
