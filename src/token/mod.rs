//! Fungible-token collaborator
//!
//! A minimal ERC-20 style ledger used as a dispatch target for the engine:
//! wallet transactions carry a serialized [`TokenCall`] payload, and the
//! token applies it with the wallet's address as the acting principal.
//!
//! # Example
//!
//! ```ignore
//! use quorum_wallet::token::{Token, TokenCall};
//!
//! let mut token = Token::new("treasury", 1_000_000);
//!
//! // Fund the wallet, then let the wallet spend via an executed transaction
//! token.transfer("treasury", wallet.address(), 5_000)?;
//! let payload = TokenCall::Transfer { to: recipient, amount: 1_000 }.encode();
//! wallet.submit_transaction(&alice, token.address(), 0, payload, true)?;
//! ```

pub mod token;

pub use token::{Token, TokenCall, TokenError};
