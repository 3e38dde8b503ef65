//! Transaction records and payload classification
//!
//! A transaction is one proposed action: a target principal, a native value,
//! and an opaque payload. Records live in an append-only ledger and are only
//! ever mutated by confirmation changes and the one-shot executed flag.

use crate::engine::policy::SecurityLevel;
use crate::engine::wallet::WalletError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A governance payload carried by an owner-management transaction
///
/// Encoded into the transaction's `data` field so that owner changes flow
/// through the same ledger as every other action. The tagged representation
/// makes classification at submission deterministic.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OwnerAction {
    AddOwner { address: String },
    RemoveOwner { address: String },
}

impl OwnerAction {
    /// Serialize the action into a transaction payload
    pub fn encode(&self) -> Vec<u8> {
        // A two-variant enum over strings cannot fail to serialize
        serde_json::to_vec(self).expect("owner action payload is always serializable")
    }

    /// Try to interpret a payload as a governance action
    pub fn decode(data: &[u8]) -> Option<Self> {
        serde_json::from_slice(data).ok()
    }
}

/// Classify a submission into a security tier
///
/// Self-targeted payloads that decode as an [`OwnerAction`] are
/// owner-management; any other self-call is maximal sensitivity; everything
/// else is an ordinary external action.
pub fn classify(target: &str, data: &[u8], engine_address: &str) -> SecurityLevel {
    if target == engine_address {
        if OwnerAction::decode(data).is_some() {
            SecurityLevel::OwnerManagement
        } else {
            SecurityLevel::Critical
        }
    } else {
        SecurityLevel::Normal
    }
}

/// One proposed action awaiting (or past) quorum
///
/// The required confirmation count is deliberately absent: it is recomputed
/// from the live owner set every time it is needed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// Ledger index, assigned at submission
    pub id: u64,
    /// Destination principal
    pub target: String,
    /// Native asset amount to transfer alongside the call
    pub value: u128,
    /// Opaque payload (empty = plain transfer)
    pub data: Vec<u8>,
    /// Tier assigned at submission time
    pub security_level: SecurityLevel,
    /// Set exactly once, false -> true
    pub executed: bool,
    /// Owners who approved, in confirmation order
    pub confirmations: Vec<String>,
    /// Submission timestamp
    pub created_at: DateTime<Utc>,
    /// Execution timestamp, if terminal
    pub executed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Create a new pending transaction
    pub fn new(
        id: u64,
        target: String,
        value: u128,
        data: Vec<u8>,
        security_level: SecurityLevel,
    ) -> Self {
        Self {
            id,
            target,
            value,
            data,
            security_level,
            executed: false,
            confirmations: Vec::new(),
            created_at: Utc::now(),
            executed_at: None,
        }
    }

    /// Whether the payload is empty (plain native transfer)
    pub fn is_plain_transfer(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of standing confirmations
    pub fn confirmation_count(&self) -> usize {
        self.confirmations.len()
    }

    /// Whether the given owner has a standing confirmation
    pub fn is_confirmed_by(&self, owner: &str) -> bool {
        self.confirmations.iter().any(|c| c == owner)
    }

    /// Record a confirmation from an owner
    pub fn confirm(&mut self, owner: &str) -> Result<(), WalletError> {
        if self.executed {
            return Err(WalletError::AlreadyExecuted);
        }
        if self.is_confirmed_by(owner) {
            return Err(WalletError::AlreadyConfirmed(owner.to_string()));
        }
        self.confirmations.push(owner.to_string());
        Ok(())
    }

    /// Withdraw a confirmation previously given by this owner
    pub fn revoke(&mut self, owner: &str) -> Result<(), WalletError> {
        if self.executed {
            return Err(WalletError::AlreadyExecuted);
        }
        let position = self
            .confirmations
            .iter()
            .position(|c| c == owner)
            .ok_or_else(|| WalletError::NotConfirmed(owner.to_string()))?;
        self.confirmations.remove(position);
        Ok(())
    }

    /// Drop a confirmation without ceremony
    ///
    /// Used when the confirming owner is removed from the wallet: their
    /// standing approvals on pending transactions no longer count.
    pub fn prune_confirmation(&mut self, owner: &str) {
        self.confirmations.retain(|c| c != owner);
    }
}
