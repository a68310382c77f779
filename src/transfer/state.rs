//! Transfer lifecycle state machine.
//!
//! # States
//! - Idle: nothing sent yet
//! - Sending: one attempt is building, signing or broadcasting
//! - Completed(hash): the node accepted the attempt
//! - Failed(error): the attempt stopped at some step
//!
//! # State Transitions
//! ```text
//! Idle | Completed | Failed → Sending            (begin)
//! Sending → Completed(hash) | Failed(error)       (settle)
//! ```
//! `begin` from `Sending` is refused; `settle` from anything but `Sending`
//! is refused. Terminal states only move again through a new `begin`.

use std::fmt;

use crate::blockchain::types::{TransactionHash, WalletError, WalletResult};

/// Observable state of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransferState {
    #[default]
    Idle,
    Sending,
    Completed(TransactionHash),
    Failed(WalletError),
}

impl TransferState {
    /// Start a new attempt.
    pub fn begin(&self) -> WalletResult<TransferState> {
        match self {
            TransferState::Sending => Err(WalletError::ConcurrentSendRejected),
            _ => Ok(TransferState::Sending),
        }
    }

    /// Resolve the in-flight attempt. `None` unless currently `Sending`.
    pub fn settle(&self, outcome: WalletResult<TransactionHash>) -> Option<TransferState> {
        if !self.is_sending() {
            return None;
        }
        Some(match outcome {
            Ok(hash) => TransferState::Completed(hash),
            Err(err) => TransferState::Failed(err),
        })
    }

    pub fn is_sending(&self) -> bool {
        matches!(self, TransferState::Sending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Completed(_) | TransferState::Failed(_))
    }

    /// Hash of a completed attempt.
    pub fn hash(&self) -> Option<&TransactionHash> {
        match self {
            TransferState::Completed(hash) => Some(hash),
            _ => None,
        }
    }

    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            TransferState::Idle => "idle",
            TransferState::Sending => "sending",
            TransferState::Completed(_) => "completed",
            TransferState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferState::Completed(hash) => write!(f, "completed ({})", hash),
            TransferState::Failed(err) => write!(f, "failed ({})", err),
            other => f.write_str(other.label()),
        }
    }
}

/// One published transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    /// Attempt this transition belongs to, starting at 1.
    pub attempt: u64,
    pub state: TransferState,
}
