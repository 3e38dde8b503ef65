//! Quorum threshold policy
//!
//! Maps (security level, current owner count) to the number of distinct
//! confirmations required. Thresholds are a pure function of the live owner
//! count and are never stored on a transaction record: caching them would
//! reintroduce the staleness the tiered design exists to avoid.

use serde::{Deserialize, Serialize};

/// Sensitivity classification of a transaction
///
/// Higher levels require a larger share of the owner set, so a minority that
/// could move funds still cannot quietly reconfigure trust.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SecurityLevel {
    /// Ordinary external call or plain transfer
    Normal,
    /// Owner-management action (add/remove owner) via the governance path
    OwnerManagement,
    /// Self-call with an opaque payload; requires unanimity
    Critical,
}

impl SecurityLevel {
    /// Numeric tier, lowest sensitivity first
    pub fn tier(&self) -> u8 {
        match self {
            SecurityLevel::Normal => 1,
            SecurityLevel::OwnerManagement => 2,
            SecurityLevel::Critical => 3,
        }
    }
}

/// Threshold policy for a wallet
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuorumPolicy {
    /// Base confirmation count for ordinary transactions
    pub base_quorum: usize,
}

impl Default for QuorumPolicy {
    fn default() -> Self {
        Self { base_quorum: 2 }
    }
}

impl QuorumPolicy {
    /// Create a policy with the given base quorum
    pub fn new(base_quorum: usize) -> Self {
        Self {
            base_quorum: base_quorum.max(1),
        }
    }

    /// Confirmations required for a security level at the current owner count
    ///
    /// Recomputed on demand; monotonic non-increasing as the owner set
    /// shrinks, for every level. With a single owner every level degrades to
    /// one confirmation, which is the bootstrap path.
    pub fn required_confirmations(&self, level: SecurityLevel, owner_count: usize) -> usize {
        if owner_count == 0 {
            return 0;
        }
        match level {
            SecurityLevel::Normal => self.base_quorum.min(owner_count),
            SecurityLevel::OwnerManagement => (owner_count - 1)
                .max(self.base_quorum)
                .min(owner_count),
            SecurityLevel::Critical => owner_count,
        }
    }
}
