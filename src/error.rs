//! Error types for governance operations.
//!
//! `GovernanceError` is the low-level taxonomy returned by adapters, signers and the
//! waiter. `ActionFailure` is what a caller sees when an orchestrated action ends Fatal:
//! the underlying error tagged with the action kind, the phase and (for ratification)
//! the position of the failing committee member.

use core::fmt;
use thiserror::Error;

use crate::action::ActionKind;
use crate::types::TxHash;

/// Errors that can occur while proposing, ratifying or confirming an action.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// Committee is empty or malformed
    #[error("Invalid committee: {reason}")]
    InvalidCommittee { reason: String },

    /// RPC/network failure talking to the target chain
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// The target chain refused the transaction with a business-rule error
    #[error("Chain rejected transaction: {message}")]
    ChainRejected { message: String },

    /// Accepted by the chain but finality was not observed within the attempt budget
    #[error("Transaction {tx_hash} not confirmed after {attempts} polls")]
    ConfirmationTimeout { tx_hash: TxHash, attempts: u32 },

    /// The local wait was cancelled; the transaction remains outstanding on-chain
    #[error("Wait for transaction {tx_hash} cancelled")]
    Cancelled { tx_hash: TxHash },

    /// Expected notification was not emitted by the transaction
    #[error("Event '{event}' not found in transaction {tx_hash}")]
    EventMissing { tx_hash: TxHash, event: String },

    /// Notification was emitted but its arguments do not match the documented schema
    #[error("Event '{event}' is malformed: {reason}")]
    EventMalformed { event: String, reason: String },

    /// A signer could not produce a signature
    #[error("Signer {signer} failed: {reason}")]
    Signing { signer: String, reason: String },

    /// Keystore could not be read or unlocked
    #[error("Wallet error: {reason}")]
    Wallet { reason: String },

    /// Invalid or incomplete configuration
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Command name not present in the registry
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Action cannot be encoded or is missing required data
    #[error("Invalid action: {reason}")]
    InvalidAction { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GovernanceError {
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport { reason: reason.into() }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::ChainRejected { message: message.into() }
    }

    pub fn invalid_committee(reason: impl Into<String>) -> Self {
        Self::InvalidCommittee { reason: reason.into() }
    }
}

/// Phase of the protocol in which an action failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Propose,
    Ratify,
    Confirm,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Propose => write!(f, "propose"),
            Phase::Ratify => write!(f, "ratify"),
            Phase::Confirm => write!(f, "confirm"),
        }
    }
}

/// A fatal outcome of one orchestrated action.
#[derive(Debug)]
pub struct ActionFailure {
    pub kind: ActionKind,
    pub phase: Phase,
    /// 1-based position of the committee member whose submission failed.
    pub member: Option<usize>,
    pub source: GovernanceError,
}

impl ActionFailure {
    pub fn new(kind: ActionKind, phase: Phase, source: GovernanceError) -> Self {
        Self { kind, phase, member: None, source }
    }

    pub fn at_member(kind: ActionKind, member: usize, source: GovernanceError) -> Self {
        Self { kind, phase: Phase::Ratify, member: Some(member), source }
    }

    /// Whether the failure left a transaction that may still finalize on-chain.
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self.source,
            GovernanceError::ConfirmationTimeout { .. } | GovernanceError::Cancelled { .. }
        )
    }
}

impl fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.member {
            Some(member) => write!(
                f,
                "{} failed during {} at committee member {}: {}",
                self.kind, self.phase, member, self.source
            ),
            None => write!(f, "{} failed during {}: {}", self.kind, self.phase, self.source),
        }
    }
}

impl std::error::Error for ActionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Result type alias for governance operations.
pub type Result<T> = core::result::Result<T, GovernanceError>;
