//! The authorization engine state machine
//!
//! One struct owns the owner registry, the quorum policy, the append-only
//! transaction ledger, and the audit log. Every operation takes `&mut self`,
//! so the borrow checker provides the call serialization the design assumes;
//! there is no internal locking, queuing, or retry.

use crate::crypto::hash::{base58check, sha256};
use crate::engine::dispatch::{DispatchError, Dispatcher};
use crate::engine::events::{WalletEvent, WalletEventKind};
use crate::engine::policy::{QuorumPolicy, SecurityLevel};
use crate::engine::transaction::{classify, OwnerAction, Transaction};
use chrono::Utc;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised by engine operations
///
/// Every error aborts the offending call with no partial mutation, except
/// where [`MultisigWallet::confirm_transaction`] documents otherwise.
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("not owner: {0}")]
    NotOwner(String),
    #[error("duplicate owner: {0}")]
    DuplicateOwner(String),
    #[error("reached minimum owners: have {have}, floor is {floor}")]
    BelowMinimum { have: usize, floor: usize },
    #[error("tx already confirmed by {0}")]
    AlreadyConfirmed(String),
    #[error("tx not confirmed by {0}")]
    NotConfirmed(String),
    #[error("tx already executed")]
    AlreadyExecuted,
    #[error("cannot execute tx: have {have} confirmations, need {need}")]
    QuorumNotMet { have: usize, need: usize },
    #[error("not allowed to do this: owner management must use the governance path")]
    DowngradeNotAllowed,
    #[error("transaction not found: {0}")]
    TransactionNotFound(u64),
    #[error("no initial owners provided")]
    EmptyOwnerSet,
    #[error("dispatch failed: {0}")]
    DispatchFailed(#[from] DispatchError),
}

/// A tiered-quorum multi-signature wallet
///
/// Owners jointly authorize transactions; the confirmation count a
/// transaction needs is a live function of its security level and the
/// current owner count. Owner-set changes are themselves transactions on
/// the same ledger, gated at the stricter owner-management tier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MultisigWallet {
    /// The engine's own principal address, derived from the initial owners
    address: String,
    /// Current owners, in insertion order
    owners: Vec<String>,
    /// The owner set may never shrink below this floor
    min_owners: usize,
    /// Threshold policy
    policy: QuorumPolicy,
    /// Append-only ledger; a transaction's id is its index
    transactions: Vec<Transaction>,
    /// Audit log
    events: Vec<WalletEvent>,
}

impl MultisigWallet {
    /// Provision a wallet with its initial owner set
    ///
    /// This is the one-time construction path; afterwards the owner set only
    /// changes through quorum-gated transactions.
    pub fn new(initial_owners: Vec<String>, min_owners: usize) -> Result<Self, WalletError> {
        Self::with_policy(initial_owners, min_owners, QuorumPolicy::default())
    }

    /// Provision a wallet with an explicit quorum policy
    pub fn with_policy(
        initial_owners: Vec<String>,
        min_owners: usize,
        policy: QuorumPolicy,
    ) -> Result<Self, WalletError> {
        if initial_owners.is_empty() {
            return Err(WalletError::EmptyOwnerSet);
        }

        let mut seen = HashSet::new();
        for owner in &initial_owners {
            if !seen.insert(owner.as_str()) {
                return Err(WalletError::DuplicateOwner(owner.clone()));
            }
        }

        if initial_owners.len() < min_owners {
            return Err(WalletError::BelowMinimum {
                have: initial_owners.len(),
                floor: min_owners,
            });
        }

        let address = Self::generate_address(&initial_owners, min_owners);
        log::info!(
            "provisioned wallet {} with {} owners (floor {})",
            address,
            initial_owners.len(),
            min_owners
        );

        Ok(Self {
            address,
            owners: initial_owners,
            min_owners,
            policy,
            transactions: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Derive the engine address from the initial owner set
    ///
    /// Base58Check(0x05 || RIPEMD160(SHA256(floor || sorted owners)))
    fn generate_address(owners: &[String], min_owners: usize) -> String {
        let mut sorted_owners = owners.to_vec();
        sorted_owners.sort();

        // The full floor width goes into the preimage; a narrowing cast
        // would collide floors 256 apart
        let mut script_data = (min_owners as u64).to_be_bytes().to_vec();
        for owner in &sorted_owners {
            script_data.extend_from_slice(owner.as_bytes());
        }

        let sha256_hash = sha256(&script_data);
        let mut ripemd = Ripemd160::new();
        ripemd.update(&sha256_hash);
        let ripemd_hash = ripemd.finalize();

        // Version byte 0x05: engine addresses start with '3'
        base58check(0x05, &ripemd_hash)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The engine's own address (the target of governance transactions)
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current owners in insertion order
    pub fn owners(&self) -> &[String] {
        &self.owners
    }

    /// Number of current owners
    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    /// Whether a principal is currently an owner
    pub fn is_owner(&self, principal: &str) -> bool {
        self.owners.iter().any(|o| o == principal)
    }

    /// The configured owner-count floor
    pub fn min_owners(&self) -> usize {
        self.min_owners
    }

    /// The threshold policy
    pub fn policy(&self) -> &QuorumPolicy {
        &self.policy
    }

    /// Total number of transactions ever submitted
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Look up a transaction by id
    pub fn get_transaction(&self, tx_id: u64) -> Option<&Transaction> {
        self.transactions.get(tx_id as usize)
    }

    /// The full ledger, oldest first
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Transactions that have not executed
    pub fn pending_transactions(&self) -> Vec<&Transaction> {
        self.transactions.iter().filter(|tx| !tx.executed).collect()
    }

    /// The audit log, oldest first
    pub fn events(&self) -> &[WalletEvent] {
        &self.events
    }

    /// Confirmations required for a level at the current owner count
    pub fn required_for_level(&self, level: SecurityLevel) -> usize {
        self.policy.required_confirmations(level, self.owners.len())
    }

    /// Confirmations a transaction needs right now
    ///
    /// Live-recomputed: the answer moves with the owner set while the
    /// transaction is pending.
    pub fn required_confirmations(&self, tx_id: u64) -> Result<usize, WalletError> {
        let tx = self.tx(tx_id)?;
        Ok(self.required_for_level(tx.security_level))
    }

    /// Standing confirmation count for a transaction
    pub fn confirmation_count(&self, tx_id: u64) -> Result<usize, WalletError> {
        Ok(self.tx(tx_id)?.confirmation_count())
    }

    /// Whether an owner has a standing confirmation on a transaction
    pub fn is_confirmed_by(&self, tx_id: u64, owner: &str) -> Result<bool, WalletError> {
        Ok(self.tx(tx_id)?.is_confirmed_by(owner))
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit an action targeting an external principal
    ///
    /// The transaction is classified from its target and payload. A
    /// governance payload aimed at the engine itself is refused here with
    /// [`WalletError::DowngradeNotAllowed`]: owner management must go through
    /// [`Self::submit_add_owner`] / [`Self::submit_remove_owner`] so it
    /// cannot ride in under a weaker tier. Submission never executes, even
    /// when `auto_confirm` already satisfies the threshold.
    pub fn submit_transaction(
        &mut self,
        caller: &str,
        target: &str,
        value: u128,
        data: Vec<u8>,
        auto_confirm: bool,
    ) -> Result<u64, WalletError> {
        self.require_owner(caller)?;

        let level = classify(target, &data, &self.address);
        if level == SecurityLevel::OwnerManagement {
            return Err(WalletError::DowngradeNotAllowed);
        }

        self.push_transaction(caller, target.to_string(), value, data, level, auto_confirm)
    }

    /// Propose adding an owner (governance path)
    ///
    /// Submits an owner-management transaction targeting the engine itself,
    /// auto-confirmed by the submitter. The duplicate check runs again at
    /// execution time.
    pub fn submit_add_owner(&mut self, caller: &str, address: &str) -> Result<u64, WalletError> {
        self.require_owner(caller)?;
        if self.is_owner(address) {
            return Err(WalletError::DuplicateOwner(address.to_string()));
        }

        let data = OwnerAction::AddOwner {
            address: address.to_string(),
        }
        .encode();
        let target = self.address.clone();
        self.push_transaction(
            caller,
            target,
            0,
            data,
            SecurityLevel::OwnerManagement,
            true,
        )
    }

    /// Propose removing an owner (governance path)
    ///
    /// Fails if the named principal is not an owner or if removal would drop
    /// the set below the floor; both checks run again at execution time
    /// against the then-current owner set.
    pub fn submit_remove_owner(&mut self, caller: &str, address: &str) -> Result<u64, WalletError> {
        self.require_owner(caller)?;
        if !self.is_owner(address) {
            return Err(WalletError::NotOwner(address.to_string()));
        }
        if self.owners.len() - 1 < self.min_owners {
            return Err(WalletError::BelowMinimum {
                have: self.owners.len(),
                floor: self.min_owners,
            });
        }

        let data = OwnerAction::RemoveOwner {
            address: address.to_string(),
        }
        .encode();
        let target = self.address.clone();
        self.push_transaction(
            caller,
            target,
            0,
            data,
            SecurityLevel::OwnerManagement,
            true,
        )
    }

    // =========================================================================
    // Confirmation lifecycle
    // =========================================================================

    /// Confirm a pending transaction
    ///
    /// The instant the live threshold is reached the transaction executes
    /// through `dispatcher` and `Ok(true)` is returned. If that execution
    /// fails, the confirmation itself is kept, the executed flag is rolled
    /// back, and the error is returned; the transaction stays pending.
    pub fn confirm_transaction(
        &mut self,
        caller: &str,
        tx_id: u64,
        dispatcher: &mut dyn Dispatcher,
    ) -> Result<bool, WalletError> {
        self.require_owner(caller)?;
        self.tx_mut(tx_id)?.confirm(caller)?;

        let confirmations = self.tx(tx_id)?.confirmation_count();
        self.record(
            caller,
            WalletEventKind::TransactionConfirmed {
                tx_id,
                confirmations,
            },
        );
        log::debug!("tx {} confirmed by {} ({} total)", tx_id, caller, confirmations);

        if confirmations >= self.required_confirmations(tx_id)? {
            self.try_execute(caller, tx_id, dispatcher)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Withdraw the caller's confirmation from a pending transaction
    pub fn revoke_confirmation(&mut self, caller: &str, tx_id: u64) -> Result<(), WalletError> {
        self.require_owner(caller)?;
        self.tx_mut(tx_id)?.revoke(caller)?;

        self.record(caller, WalletEventKind::ConfirmationRevoked { tx_id });
        log::debug!("tx {} confirmation revoked by {}", tx_id, caller);
        Ok(())
    }

    /// Execute a transaction whose quorum is already satisfied
    ///
    /// The threshold is recomputed fresh against the current owner set, so a
    /// transaction that once had enough confirmations can be unexecutable
    /// here, and vice versa.
    pub fn execute_transaction(
        &mut self,
        caller: &str,
        tx_id: u64,
        dispatcher: &mut dyn Dispatcher,
    ) -> Result<(), WalletError> {
        self.require_owner(caller)?;
        self.try_execute(caller, tx_id, dispatcher)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn tx(&self, tx_id: u64) -> Result<&Transaction, WalletError> {
        self.transactions
            .get(tx_id as usize)
            .ok_or(WalletError::TransactionNotFound(tx_id))
    }

    fn tx_mut(&mut self, tx_id: u64) -> Result<&mut Transaction, WalletError> {
        self.transactions
            .get_mut(tx_id as usize)
            .ok_or(WalletError::TransactionNotFound(tx_id))
    }

    fn require_owner(&self, caller: &str) -> Result<(), WalletError> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(WalletError::NotOwner(caller.to_string()))
        }
    }

    fn record(&mut self, actor: &str, kind: WalletEventKind) {
        self.events.push(WalletEvent::new(actor, kind));
    }

    fn push_transaction(
        &mut self,
        caller: &str,
        target: String,
        value: u128,
        data: Vec<u8>,
        level: SecurityLevel,
        auto_confirm: bool,
    ) -> Result<u64, WalletError> {
        let tx_id = self.transactions.len() as u64;
        let mut tx = Transaction::new(tx_id, target, value, data, level);
        if auto_confirm {
            tx.confirm(caller)?;
        }
        self.transactions.push(tx);

        self.record(caller, WalletEventKind::TransactionSubmitted { tx_id, level });
        if auto_confirm {
            self.record(
                caller,
                WalletEventKind::TransactionConfirmed {
                    tx_id,
                    confirmations: 1,
                },
            );
        }
        log::info!("tx {} submitted by {} at tier {}", tx_id, caller, level.tier());
        Ok(tx_id)
    }

    fn try_execute(
        &mut self,
        actor: &str,
        tx_id: u64,
        dispatcher: &mut dyn Dispatcher,
    ) -> Result<(), WalletError> {
        let (target, value, data, level, have) = {
            let tx = self.tx(tx_id)?;
            if tx.executed {
                return Err(WalletError::AlreadyExecuted);
            }
            (
                tx.target.clone(),
                tx.value,
                tx.data.clone(),
                tx.security_level,
                tx.confirmation_count(),
            )
        };

        let need = self.required_for_level(level);
        if have < need {
            return Err(WalletError::QuorumNotMet { have, need });
        }

        // Lock the record before any externally observable effect so a
        // reentrant call cannot re-trigger execution.
        {
            let tx = self.tx_mut(tx_id)?;
            tx.executed = true;
            tx.executed_at = Some(Utc::now());
        }

        let outcome = if target == self.address {
            self.apply_self_call(actor, level, &data)
        } else {
            let from = self.address.clone();
            dispatcher
                .dispatch(&from, &target, value, &data)
                .map_err(WalletError::from)
        };

        if let Err(err) = outcome {
            let tx = self.tx_mut(tx_id)?;
            tx.executed = false;
            tx.executed_at = None;
            log::warn!("tx {} execution rolled back: {}", tx_id, err);
            return Err(err);
        }

        self.record(actor, WalletEventKind::TransactionExecuted { tx_id });
        log::info!("tx {} executed by {}", tx_id, actor);
        Ok(())
    }

    /// Apply a transaction whose target is the engine itself
    ///
    /// The tier check runs again here: a governance payload that reached the
    /// ledger under any tier other than owner-management must not touch the
    /// owner set.
    fn apply_self_call(
        &mut self,
        actor: &str,
        level: SecurityLevel,
        data: &[u8],
    ) -> Result<(), WalletError> {
        match level {
            SecurityLevel::OwnerManagement => {
                let action = OwnerAction::decode(data).ok_or_else(|| {
                    WalletError::DispatchFailed(DispatchError::MalformedPayload(
                        "owner-management payload did not decode".to_string(),
                    ))
                })?;
                self.apply_owner_action(actor, action)
            }
            _ => {
                if OwnerAction::decode(data).is_some() {
                    return Err(WalletError::DowngradeNotAllowed);
                }
                // Opaque self-call: nothing for the engine to apply
                Ok(())
            }
        }
    }

    fn apply_owner_action(&mut self, actor: &str, action: OwnerAction) -> Result<(), WalletError> {
        match action {
            OwnerAction::AddOwner { address } => {
                if self.is_owner(&address) {
                    return Err(WalletError::DuplicateOwner(address));
                }
                self.owners.push(address.clone());
                self.record(actor, WalletEventKind::OwnerAdded { owner: address.clone() });
                log::info!("owner {} added ({} total)", address, self.owners.len());
                Ok(())
            }
            OwnerAction::RemoveOwner { address } => {
                if !self.is_owner(&address) {
                    return Err(WalletError::NotOwner(address));
                }
                if self.owners.len() - 1 < self.min_owners {
                    return Err(WalletError::BelowMinimum {
                        have: self.owners.len(),
                        floor: self.min_owners,
                    });
                }

                self.owners.retain(|o| o != &address);
                // A removed owner's standing approvals no longer count
                for tx in self.transactions.iter_mut().filter(|t| !t.executed) {
                    tx.prune_confirmation(&address);
                }
                self.record(
                    actor,
                    WalletEventKind::OwnerRemoved { owner: address.clone() },
                );
                log::info!("owner {} removed ({} remain)", address, self.owners.len());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::engine::dispatch::{NullDispatcher, RecordingDispatcher};

    fn addresses(n: usize) -> Vec<String> {
        (0..n).map(|_| KeyPair::generate().address()).collect()
    }

    fn wallet_with(n: usize, floor: usize) -> (MultisigWallet, Vec<String>) {
        let owners = addresses(n);
        let wallet = MultisigWallet::new(owners.clone(), floor).unwrap();
        (wallet, owners)
    }

    /// Dispatcher that rejects every call
    struct FailingDispatcher;

    impl Dispatcher for FailingDispatcher {
        fn dispatch(
            &mut self,
            _from: &str,
            _target: &str,
            _value: u128,
            _data: &[u8],
        ) -> Result<(), DispatchError> {
            Err(DispatchError::CallRejected("target offline".to_string()))
        }
    }

    #[test]
    fn test_wallet_creation() {
        let (wallet, owners) = wallet_with(3, 2);

        assert!(wallet.address().starts_with('3'));
        assert_eq!(wallet.owners(), owners.as_slice());
        assert_eq!(wallet.owner_count(), 3);
        assert_eq!(wallet.min_owners(), 2);
        assert_eq!(wallet.policy().base_quorum, 2);
        assert_eq!(wallet.transaction_count(), 0);
        assert!(wallet.is_owner(&owners[0]));
        assert!(!wallet.is_owner("1Stranger"));
    }

    #[test]
    fn test_creation_validation() {
        assert!(matches!(
            MultisigWallet::new(vec![], 1),
            Err(WalletError::EmptyOwnerSet)
        ));

        let owner = KeyPair::generate().address();
        assert!(matches!(
            MultisigWallet::new(vec![owner.clone(), owner.clone()], 1),
            Err(WalletError::DuplicateOwner(_))
        ));

        assert!(matches!(
            MultisigWallet::new(vec![owner], 2),
            Err(WalletError::BelowMinimum { .. })
        ));
    }

    #[test]
    fn test_address_deterministic_and_order_independent() {
        let owners = addresses(3);
        let mut shuffled = owners.clone();
        shuffled.rotate_left(1);

        let a = MultisigWallet::new(owners, 2).unwrap();
        let b = MultisigWallet::new(shuffled, 2).unwrap();
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn test_address_encodes_full_floor() {
        let owners = vec!["1Alpha".to_string(), "1Beta".to_string()];

        // Floors 256 apart must not collide
        let low = MultisigWallet::generate_address(&owners, 1);
        let high = MultisigWallet::generate_address(&owners, 257);
        assert_ne!(low, high);
    }

    #[test]
    fn test_non_owner_calls_rejected_without_mutation() {
        let (mut wallet, owners) = wallet_with(3, 1);
        let stranger = KeyPair::generate().address();
        let mut dispatcher = NullDispatcher;

        let tx_id = wallet
            .submit_transaction(&owners[0], "1Recipient", 10, vec![], true)
            .unwrap();

        assert!(matches!(
            wallet.submit_transaction(&stranger, "1Recipient", 10, vec![], true),
            Err(WalletError::NotOwner(_))
        ));
        assert!(matches!(
            wallet.confirm_transaction(&stranger, tx_id, &mut dispatcher),
            Err(WalletError::NotOwner(_))
        ));
        assert!(matches!(
            wallet.submit_remove_owner(&stranger, &owners[1]),
            Err(WalletError::NotOwner(_))
        ));
        assert!(matches!(
            wallet.execute_transaction(&stranger, tx_id, &mut dispatcher),
            Err(WalletError::NotOwner(_))
        ));

        assert_eq!(wallet.transaction_count(), 1);
        assert_eq!(wallet.confirmation_count(tx_id).unwrap(), 1);
        assert_eq!(wallet.owner_count(), 3);
    }

    #[test]
    fn test_transaction_not_found() {
        let (mut wallet, owners) = wallet_with(2, 1);
        let mut dispatcher = NullDispatcher;

        assert!(matches!(
            wallet.confirm_transaction(&owners[0], 7, &mut dispatcher),
            Err(WalletError::TransactionNotFound(7))
        ));
        assert!(wallet.get_transaction(7).is_none());
    }

    #[test]
    fn test_bootstrap_single_owner_add() {
        let founder = KeyPair::generate().address();
        let second = KeyPair::generate().address();
        let mut wallet = MultisigWallet::new(vec![founder.clone()], 1).unwrap();
        let mut dispatcher = NullDispatcher;

        // With one owner the governance threshold degrades to one, but
        // submission never executes by itself.
        let tx_id = wallet.submit_add_owner(&founder, &second).unwrap();
        assert!(!wallet.get_transaction(tx_id).unwrap().executed);

        wallet
            .execute_transaction(&founder, tx_id, &mut dispatcher)
            .unwrap();
        assert_eq!(wallet.owners(), &[founder, second]);
    }

    #[test]
    fn test_two_owner_add_requires_second_confirmation() {
        let (mut wallet, owners) = wallet_with(2, 1);
        let carol = KeyPair::generate().address();
        let mut dispatcher = NullDispatcher;

        let tx_id = wallet.submit_add_owner(&owners[0], &carol).unwrap();
        assert_eq!(wallet.transaction_count(), 1);
        assert_eq!(wallet.confirmation_count(tx_id).unwrap(), 1);
        assert_eq!(wallet.required_confirmations(tx_id).unwrap(), 2);

        // The submitter's auto-confirmation alone is not enough
        assert!(matches!(
            wallet.execute_transaction(&owners[0], tx_id, &mut dispatcher),
            Err(WalletError::QuorumNotMet { have: 1, need: 2 })
        ));
        assert!(matches!(
            wallet.confirm_transaction(&owners[0], tx_id, &mut dispatcher),
            Err(WalletError::AlreadyConfirmed(_))
        ));

        // The second owner's confirmation reaches quorum and executes
        assert!(wallet
            .confirm_transaction(&owners[1], tx_id, &mut dispatcher)
            .unwrap());
        assert_eq!(
            wallet.owners(),
            &[owners[0].clone(), owners[1].clone(), carol.clone()]
        );
        assert!(wallet.is_owner(&carol));
        assert_eq!(wallet.transaction_count(), 1);
    }

    #[test]
    fn test_confirm_auto_executes_at_quorum() {
        let (mut wallet, owners) = wallet_with(5, 1);
        let mut dispatcher = RecordingDispatcher::new();

        let tx_id = wallet
            .submit_transaction(&owners[0], "1Recipient", 500, vec![], true)
            .unwrap();
        assert_eq!(wallet.required_confirmations(tx_id).unwrap(), 2);

        let executed = wallet
            .confirm_transaction(&owners[1], tx_id, &mut dispatcher)
            .unwrap();
        assert!(executed);
        assert!(wallet.get_transaction(tx_id).unwrap().executed);
        assert_eq!(dispatcher.calls.len(), 1);
        assert_eq!(dispatcher.calls[0].from, wallet.address());
        assert_eq!(dispatcher.calls[0].target, "1Recipient");
        assert_eq!(dispatcher.calls[0].value, 500);
    }

    #[test]
    fn test_execute_twice_rejected() {
        let (mut wallet, owners) = wallet_with(3, 1);
        let mut dispatcher = NullDispatcher;

        let tx_id = wallet
            .submit_transaction(&owners[0], "1Recipient", 5, vec![], true)
            .unwrap();
        wallet
            .confirm_transaction(&owners[1], tx_id, &mut dispatcher)
            .unwrap();

        assert!(matches!(
            wallet.execute_transaction(&owners[0], tx_id, &mut dispatcher),
            Err(WalletError::AlreadyExecuted)
        ));
        assert!(matches!(
            wallet.confirm_transaction(&owners[2], tx_id, &mut dispatcher),
            Err(WalletError::AlreadyExecuted)
        ));
        assert!(matches!(
            wallet.revoke_confirmation(&owners[0], tx_id),
            Err(WalletError::AlreadyExecuted)
        ));
    }

    #[test]
    fn test_revoke_round_trip() {
        let (mut wallet, owners) = wallet_with(5, 1);
        let mut dispatcher = NullDispatcher;

        // Governance tx so that two confirmations stay below quorum
        let victim = owners[4].clone();
        let tx_id = wallet.submit_remove_owner(&owners[0], &victim).unwrap();
        wallet
            .confirm_transaction(&owners[1], tx_id, &mut dispatcher)
            .unwrap();

        let before: Vec<String> = wallet.get_transaction(tx_id).unwrap().confirmations.clone();

        wallet.revoke_confirmation(&owners[1], tx_id).unwrap();
        assert!(!wallet.is_confirmed_by(tx_id, &owners[1]).unwrap());
        assert!(matches!(
            wallet.revoke_confirmation(&owners[1], tx_id),
            Err(WalletError::NotConfirmed(_))
        ));
        assert!(matches!(
            wallet.revoke_confirmation(&owners[2], tx_id),
            Err(WalletError::NotConfirmed(_))
        ));

        wallet
            .confirm_transaction(&owners[1], tx_id, &mut dispatcher)
            .unwrap();
        let after: Vec<String> = wallet.get_transaction(tx_id).unwrap().confirmations.clone();
        assert_eq!(before, after);
    }

    #[test]
    fn test_remove_owner_five_owner_flow() {
        let (mut wallet, owners) = wallet_with(5, 1);
        let mut dispatcher = NullDispatcher;

        assert_eq!(wallet.required_for_level(SecurityLevel::Normal), 2);
        assert_eq!(wallet.required_for_level(SecurityLevel::OwnerManagement), 4);

        let tx_id = wallet.submit_remove_owner(&owners[0], &owners[1]).unwrap();
        wallet.revoke_confirmation(&owners[0], tx_id).unwrap();
        assert_eq!(wallet.confirmation_count(tx_id).unwrap(), 0);

        // The owner being removed may still confirm while the removal is
        // pending
        for owner in &owners[1..4] {
            let executed = wallet
                .confirm_transaction(owner, tx_id, &mut dispatcher)
                .unwrap();
            assert!(!executed);
        }
        assert!(matches!(
            wallet.execute_transaction(&owners[0], tx_id, &mut dispatcher),
            Err(WalletError::QuorumNotMet { have: 3, need: 4 })
        ));
        assert!(wallet.is_owner(&owners[1]));

        // The fourth confirmation reaches quorum and executes the removal
        assert!(wallet
            .confirm_transaction(&owners[0], tx_id, &mut dispatcher)
            .unwrap());
        assert!(!wallet.is_owner(&owners[1]));
        assert_eq!(wallet.owner_count(), 4);
        assert_eq!(wallet.required_for_level(SecurityLevel::Normal), 2);
        assert_eq!(wallet.required_for_level(SecurityLevel::OwnerManagement), 3);
        assert!(wallet.owners().iter().all(|o| o != &owners[1]));
    }

    #[test]
    fn test_removal_makes_pending_transaction_executable() {
        let (mut wallet, owners) = wallet_with(5, 1);
        let newcomer = KeyPair::generate().address();
        let mut dispatcher = NullDispatcher;

        // Governance tx stuck at 3 of 4 required confirmations
        let add_tx = wallet.submit_add_owner(&owners[0], &newcomer).unwrap();
        wallet
            .confirm_transaction(&owners[1], add_tx, &mut dispatcher)
            .unwrap();
        wallet
            .confirm_transaction(&owners[2], add_tx, &mut dispatcher)
            .unwrap();
        assert!(matches!(
            wallet.execute_transaction(&owners[0], add_tx, &mut dispatcher),
            Err(WalletError::QuorumNotMet { have: 3, need: 4 })
        ));

        // Remove a non-confirming owner; the pending tx's threshold drops
        // from 4 to 3 while its confirmation count stays 3
        let remove_tx = wallet.submit_remove_owner(&owners[0], &owners[4]).unwrap();
        for owner in &owners[1..4] {
            wallet
                .confirm_transaction(owner, remove_tx, &mut dispatcher)
                .unwrap();
        }
        assert_eq!(wallet.owner_count(), 4);
        assert_eq!(wallet.confirmation_count(add_tx).unwrap(), 3);
        assert_eq!(wallet.required_confirmations(add_tx).unwrap(), 3);

        // Executable now, with no new confirmation
        wallet
            .execute_transaction(&owners[0], add_tx, &mut dispatcher)
            .unwrap();
        assert!(wallet.is_owner(&newcomer));
    }

    #[test]
    fn test_removed_owner_confirmations_are_pruned() {
        let (mut wallet, owners) = wallet_with(5, 1);
        let mut dispatcher = NullDispatcher;

        // A governance tx confirmed by the soon-to-be-removed owner
        let newcomer = KeyPair::generate().address();
        let add_tx = wallet.submit_add_owner(&owners[0], &newcomer).unwrap();
        wallet
            .confirm_transaction(&owners[4], add_tx, &mut dispatcher)
            .unwrap();
        assert_eq!(wallet.confirmation_count(add_tx).unwrap(), 2);

        let remove_tx = wallet.submit_remove_owner(&owners[0], &owners[4]).unwrap();
        for owner in &owners[1..4] {
            wallet
                .confirm_transaction(owner, remove_tx, &mut dispatcher)
                .unwrap();
        }
        assert!(!wallet.is_owner(&owners[4]));

        // The removed owner's approval no longer counts
        assert_eq!(wallet.confirmation_count(add_tx).unwrap(), 1);
        assert!(!wallet.is_confirmed_by(add_tx, &owners[4]).unwrap());
    }

    #[test]
    fn test_minimum_floor_at_submission() {
        let (mut wallet, owners) = wallet_with(2, 2);

        assert!(matches!(
            wallet.submit_remove_owner(&owners[0], &owners[1]),
            Err(WalletError::BelowMinimum { have: 2, floor: 2 })
        ));
        assert_eq!(wallet.transaction_count(), 0);
    }

    #[test]
    fn test_minimum_floor_rechecked_at_execution() {
        let (mut wallet, owners) = wallet_with(5, 4);
        let mut dispatcher = NullDispatcher;

        // Both removals are legal at five owners
        let first = wallet.submit_remove_owner(&owners[0], &owners[1]).unwrap();
        let second = wallet.submit_remove_owner(&owners[0], &owners[2]).unwrap();

        for owner in &owners[1..4] {
            wallet
                .confirm_transaction(owner, first, &mut dispatcher)
                .unwrap();
        }
        assert_eq!(wallet.owner_count(), 4);

        // The second removal reaches its (recomputed) quorum, but executing
        // it now would breach the floor; the auto-execution rolls back and
        // the transaction stays pending with its confirmations intact.
        wallet
            .confirm_transaction(&owners[2], second, &mut dispatcher)
            .unwrap();
        let result = wallet.confirm_transaction(&owners[3], second, &mut dispatcher);
        assert!(matches!(result, Err(WalletError::BelowMinimum { .. })));

        let tx = wallet.get_transaction(second).unwrap();
        assert!(!tx.executed);
        assert_eq!(tx.confirmation_count(), 3);
        assert_eq!(wallet.owner_count(), 4);
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let (mut wallet, owners) = wallet_with(3, 1);

        assert!(matches!(
            wallet.submit_add_owner(&owners[0], &owners[1]),
            Err(WalletError::DuplicateOwner(_))
        ));
        assert_eq!(wallet.transaction_count(), 0);
    }

    #[test]
    fn test_downgrade_guard_at_submission() {
        let (mut wallet, owners) = wallet_with(5, 1);
        let intruder = KeyPair::generate().address();

        let payload = OwnerAction::AddOwner {
            address: intruder.clone(),
        }
        .encode();
        let target = wallet.address().to_string();

        let result = wallet.submit_transaction(&owners[0], &target, 0, payload, true);
        assert!(matches!(result, Err(WalletError::DowngradeNotAllowed)));
        assert_eq!(wallet.transaction_count(), 0);
        assert!(!wallet.is_owner(&intruder));
    }

    #[test]
    fn test_opaque_self_call_requires_unanimity() {
        let (mut wallet, owners) = wallet_with(3, 1);
        let target = wallet.address().to_string();
        let mut dispatcher = NullDispatcher;

        let tx_id = wallet
            .submit_transaction(&owners[0], &target, 0, b"opaque".to_vec(), true)
            .unwrap();
        assert_eq!(
            wallet.get_transaction(tx_id).unwrap().security_level,
            SecurityLevel::Critical
        );
        assert_eq!(wallet.required_confirmations(tx_id).unwrap(), 3);

        wallet
            .confirm_transaction(&owners[1], tx_id, &mut dispatcher)
            .unwrap();
        assert!(!wallet.get_transaction(tx_id).unwrap().executed);
        assert!(wallet
            .confirm_transaction(&owners[2], tx_id, &mut dispatcher)
            .unwrap());
    }

    #[test]
    fn test_downgrade_guard_enforced_at_execution() {
        let (wallet, owners) = wallet_with(3, 1);
        let intruder = KeyPair::generate().address();

        // Craft a ledger entry carrying a governance payload under the wrong
        // tier, as if the submission-time guard had been bypassed, then
        // reload the engine from that snapshot.
        let payload = OwnerAction::AddOwner {
            address: intruder.clone(),
        }
        .encode();
        let mut state = serde_json::to_value(&wallet).unwrap();
        state["transactions"] = serde_json::json!([{
            "id": 0,
            "target": wallet.address(),
            "value": 0,
            "data": payload,
            "security_level": "Critical",
            "executed": false,
            "confirmations": [],
            "created_at": Utc::now(),
            "executed_at": null,
        }]);
        let mut wallet: MultisigWallet = serde_json::from_value(state).unwrap();

        let mut dispatcher = NullDispatcher;
        wallet
            .confirm_transaction(&owners[0], 0, &mut dispatcher)
            .unwrap();
        wallet
            .confirm_transaction(&owners[1], 0, &mut dispatcher)
            .unwrap();

        // Unanimity is reached on the last confirmation, but the
        // execution-time guard refuses to touch the owner set
        let result = wallet.confirm_transaction(&owners[2], 0, &mut dispatcher);
        assert!(matches!(result, Err(WalletError::DowngradeNotAllowed)));
        assert!(!wallet.is_owner(&intruder));
        assert_eq!(wallet.owner_count(), 3);
        assert!(!wallet.get_transaction(0).unwrap().executed);
    }

    #[test]
    fn test_dispatch_failure_rolls_back_execution() {
        let (mut wallet, owners) = wallet_with(3, 1);
        let mut failing = FailingDispatcher;

        let tx_id = wallet
            .submit_transaction(&owners[0], "1Recipient", 42, vec![], true)
            .unwrap();
        let result = wallet.confirm_transaction(&owners[1], tx_id, &mut failing);
        assert!(matches!(result, Err(WalletError::DispatchFailed(_))));

        // The confirmation was kept; the execution was rolled back
        let tx = wallet.get_transaction(tx_id).unwrap();
        assert!(!tx.executed);
        assert!(tx.executed_at.is_none());
        assert_eq!(tx.confirmation_count(), 2);

        // No automatic retry: the caller re-executes once the target recovers
        let mut working = RecordingDispatcher::new();
        wallet
            .execute_transaction(&owners[0], tx_id, &mut working)
            .unwrap();
        assert!(wallet.get_transaction(tx_id).unwrap().executed);
        assert_eq!(working.calls.len(), 1);
    }

    #[test]
    fn test_required_confirmations_track_owner_set_both_ways() {
        let (mut wallet, owners) = wallet_with(5, 1);
        let newcomer = KeyPair::generate().address();
        let mut dispatcher = NullDispatcher;

        let watched = wallet.submit_remove_owner(&owners[0], &owners[4]).unwrap();
        assert_eq!(wallet.required_confirmations(watched).unwrap(), 4);

        // Growing the owner set raises the pending tx's live threshold
        let add_tx = wallet.submit_add_owner(&owners[0], &newcomer).unwrap();
        for owner in &owners[1..4] {
            wallet
                .confirm_transaction(owner, add_tx, &mut dispatcher)
                .unwrap();
        }
        assert_eq!(wallet.owner_count(), 6);
        assert_eq!(wallet.required_confirmations(watched).unwrap(), 5);
    }

    #[test]
    fn test_audit_events() {
        let (mut wallet, owners) = wallet_with(3, 1);
        let mut dispatcher = NullDispatcher;

        let tx_id = wallet
            .submit_transaction(&owners[0], "1Recipient", 9, vec![], true)
            .unwrap();
        wallet
            .confirm_transaction(&owners[1], tx_id, &mut dispatcher)
            .unwrap();

        let kinds: Vec<&WalletEventKind> = wallet.events().iter().map(|e| &e.kind).collect();
        assert!(kinds.contains(&&WalletEventKind::TransactionSubmitted {
            tx_id,
            level: SecurityLevel::Normal
        }));
        assert!(kinds.contains(&&WalletEventKind::TransactionConfirmed {
            tx_id,
            confirmations: 2
        }));
        assert!(kinds.contains(&&WalletEventKind::TransactionExecuted { tx_id }));

        let submitted = wallet
            .events()
            .iter()
            .find(|e| matches!(e.kind, WalletEventKind::TransactionSubmitted { .. }))
            .unwrap();
        assert_eq!(submitted.actor, owners[0]);
    }

    #[test]
    fn test_pending_transactions_view() {
        let (mut wallet, owners) = wallet_with(3, 1);
        let mut dispatcher = NullDispatcher;

        let done = wallet
            .submit_transaction(&owners[0], "1A", 1, vec![], true)
            .unwrap();
        wallet
            .confirm_transaction(&owners[1], done, &mut dispatcher)
            .unwrap();
        let open = wallet
            .submit_transaction(&owners[0], "1B", 2, vec![], true)
            .unwrap();

        let pending = wallet.pending_transactions();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, open);
        assert_eq!(wallet.transaction_count(), 2);
    }
}
