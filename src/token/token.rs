//! ERC-20 style token ledger and call payloads

use crate::crypto::sha256_hex;
use crate::engine::dispatch::{DispatchError, Dispatcher};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Token-related errors
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u128, need: u128 },
    #[error("Insufficient allowance: have {have}, need {need}")]
    InsufficientAllowance { have: u128, need: u128 },
    #[error("Invalid amount: amount must be greater than 0")]
    InvalidAmount,
}

/// A call payload the token understands
///
/// Wallet transactions carry the serialized form in their `data` field; the
/// acting principal is supplied at dispatch time, never in the payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
// Adjacently tagged: serde's internally-tagged representation buffers field
// values through a content tree that cannot hold `u128`, so `decode` would
// reject every payload `encode` produces.
#[serde(tag = "call", content = "args", rename_all = "snake_case")]
pub enum TokenCall {
    Transfer { to: String, amount: u128 },
    Approve { spender: String, amount: u128 },
    TransferFrom { from: String, to: String, amount: u128 },
}

impl TokenCall {
    /// Serialize the call into a transaction payload
    pub fn encode(&self) -> Vec<u8> {
        // A three-variant enum over strings and integers cannot fail to
        // serialize
        serde_json::to_vec(self).expect("token call payload is always serializable")
    }

    /// Try to interpret a payload as a token call
    pub fn decode(data: &[u8]) -> Option<Self> {
        serde_json::from_slice(data).ok()
    }
}

/// A fungible token with balances and delegated allowances
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    /// Unique token address, derived from the issuer
    pub address: String,
    /// Balances: holder -> amount
    balances: HashMap<String, u128>,
    /// Allowances: owner -> (spender -> amount)
    allowances: HashMap<String, HashMap<String, u128>>,
}

impl Token {
    /// Issue a token with the full supply allocated to the issuer
    pub fn new(issuer: &str, total_supply: u128) -> Self {
        let address = format!("T{}", &sha256_hex(issuer.as_bytes())[..16]);

        let mut balances = HashMap::new();
        balances.insert(issuer.to_string(), total_supply);

        Self {
            address,
            balances,
            allowances: HashMap::new(),
        }
    }

    /// The token's own address (the target a wallet transaction names)
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Get balance of an address
    pub fn balance_of(&self, address: &str) -> u128 {
        *self.balances.get(address).unwrap_or(&0)
    }

    /// Get allowance for a spender
    pub fn allowance(&self, owner: &str, spender: &str) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Transfer tokens from one address to another
    pub fn transfer(&mut self, from: &str, to: &str, amount: u128) -> Result<(), TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidAmount);
        }

        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance {
                have: from_balance,
                need: amount,
            });
        }

        *self.balances.entry(from.to_string()).or_insert(0) -= amount;
        *self.balances.entry(to.to_string()).or_insert(0) += amount;
        Ok(())
    }

    /// Approve a spender to transfer tokens on behalf of owner
    ///
    /// An amount of zero revokes the approval.
    pub fn approve(&mut self, owner: &str, spender: &str, amount: u128) {
        self.allowances
            .entry(owner.to_string())
            .or_default()
            .insert(spender.to_string(), amount);
    }

    /// Transfer tokens on behalf of an owner (requires prior approval)
    pub fn transfer_from(
        &mut self,
        spender: &str,
        from: &str,
        to: &str,
        amount: u128,
    ) -> Result<(), TokenError> {
        let current_allowance = self.allowance(from, spender);
        if current_allowance < amount {
            return Err(TokenError::InsufficientAllowance {
                have: current_allowance,
                need: amount,
            });
        }

        self.transfer(from, to, amount)?;

        if let Some(spenders) = self.allowances.get_mut(from) {
            if let Some(allowance) = spenders.get_mut(spender) {
                *allowance -= amount;
            }
        }
        Ok(())
    }

    /// Apply a decoded call with `from` as the acting principal
    pub fn apply_call(&mut self, from: &str, call: TokenCall) -> Result<(), TokenError> {
        match call {
            TokenCall::Transfer { to, amount } => self.transfer(from, &to, amount),
            TokenCall::Approve { spender, amount } => {
                self.approve(from, &spender, amount);
                Ok(())
            }
            TokenCall::TransferFrom {
                from: owner,
                to,
                amount,
            } => self.transfer_from(from, &owner, &to, amount),
        }
    }
}

impl Dispatcher for Token {
    fn dispatch(
        &mut self,
        from: &str,
        target: &str,
        _value: u128,
        data: &[u8],
    ) -> Result<(), DispatchError> {
        if target != self.address {
            return Err(DispatchError::UnknownTarget(target.to_string()));
        }

        let call = TokenCall::decode(data).ok_or_else(|| {
            DispatchError::MalformedPayload("payload is not a token call".to_string())
        })?;

        self.apply_call(from, call)
            .map_err(|e| DispatchError::CallRejected(e.to_string()))
    }
}
