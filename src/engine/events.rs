//! Audit events
//!
//! Every state transition appends a structured event naming the actor and
//! the affected transaction or owner. The engine keeps the log in memory;
//! how events are stored or displayed is the consumer's concern.

use crate::engine::policy::SecurityLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum WalletEventKind {
    TransactionSubmitted { tx_id: u64, level: SecurityLevel },
    TransactionConfirmed { tx_id: u64, confirmations: usize },
    ConfirmationRevoked { tx_id: u64 },
    TransactionExecuted { tx_id: u64 },
    OwnerAdded { owner: String },
    OwnerRemoved { owner: String },
}

/// One audit log entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletEvent {
    /// What happened
    pub kind: WalletEventKind,
    /// Principal whose call caused the transition
    pub actor: String,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

impl WalletEvent {
    /// Create an event stamped with the current time
    pub fn new(actor: &str, kind: WalletEventKind) -> Self {
        Self {
            kind,
            actor: actor.to_string(),
            timestamp: Utc::now(),
        }
    }
}
