//! External dispatch seam
//!
//! The engine is target-agnostic: at execution it hands the transaction's
//! target, value, and opaque payload to a [`Dispatcher`] supplied by the
//! caller. Dispatch failure is surfaced distinctly from quorum failure and
//! rolls the execution back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a dispatch target
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("unknown target: {0}")]
    UnknownTarget(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("target rejected call: {0}")]
    CallRejected(String),
}

/// Delivers an executed transaction's payload to its target
///
/// Implementations serialize no engine state; the engine has already made
/// its transition when dispatch runs and rolls it back if dispatch fails.
pub trait Dispatcher {
    /// Deliver `data` and `value` to `target` on behalf of `from`
    fn dispatch(
        &mut self,
        from: &str,
        target: &str,
        value: u128,
        data: &[u8],
    ) -> Result<(), DispatchError>;
}

/// Dispatcher that accepts every call and does nothing
///
/// Useful when the engine's own bookkeeping is all that matters.
pub struct NullDispatcher;

impl Dispatcher for NullDispatcher {
    fn dispatch(
        &mut self,
        _from: &str,
        _target: &str,
        _value: u128,
        _data: &[u8],
    ) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// A call captured by [`RecordingDispatcher`]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchedCall {
    pub from: String,
    pub target: String,
    pub value: u128,
    pub data: Vec<u8>,
}

/// Dispatcher that records every call it accepts
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    /// Calls in delivery order
    pub calls: Vec<DispatchedCall>,
}

impl RecordingDispatcher {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }
}

impl Dispatcher for RecordingDispatcher {
    fn dispatch(
        &mut self,
        from: &str,
        target: &str,
        value: u128,
        data: &[u8],
    ) -> Result<(), DispatchError> {
        self.calls.push(DispatchedCall {
            from: from.to_string(),
            target: target.to_string(),
            value,
            data: data.to_vec(),
        });
        Ok(())
    }
}
