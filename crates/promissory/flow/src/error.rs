use promissory_contract::ContractViolation;
use promissory_types::{SignatureError, StateRef};
use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::services::{NotaryError, ResponderError, VaultError};
use crate::state::FlowState;

/// Terminal flow failures, one variant per error class.
///
/// Only `Unreachable` is retryable: the checkpoint written at the last
/// suspension point is kept so the flow can be resumed. Every other
/// variant reflects a rejection of this envelope; a new transaction must
/// be built if the caller still intends to proceed.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Structural or business-rule rejection, detected locally before any
    /// network interaction.
    #[error("contract rejected the proposal: {0}")]
    ContractRejected(#[from] ContractViolation),

    /// The counterparty's own validation refused to sign.
    #[error("counterparty refused to sign: {0}")]
    CounterpartyRefused(String),

    /// A genuine double-consumption attempt.
    #[error("notary conflict: input {input} already consumed")]
    NotaryConflict { input: StateRef },

    /// The notary rejected the submission for a non-conflict reason.
    #[error("notary rejected the transaction: {0}")]
    NotaryRejected(String),

    /// Transport or availability failure; retryable by resuming.
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// Signature collection finished without covering the required set.
    #[error("signature set incomplete: {missing} signer(s) missing")]
    IncompleteSignatures { missing: usize },

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("cannot {operation} while flow is in state {state:?}")]
    InvalidTransition {
        state: FlowState,
        operation: &'static str,
    },

    #[error("no checkpoint found for transaction {0}")]
    UnknownCheckpoint(String),

    #[error("resuming identity {0} is not the recorded lender")]
    WrongResumeIdentity(String),
}

impl FlowError {
    /// Whether resuming from the last checkpoint may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlowError::Unreachable(_))
    }
}

impl From<ResponderError> for FlowError {
    fn from(err: ResponderError) -> Self {
        match err {
            ResponderError::Refused(reason) => FlowError::CounterpartyRefused(reason),
            ResponderError::Unreachable(reason) => FlowError::Unreachable(reason),
        }
    }
}

impl From<NotaryError> for FlowError {
    fn from(err: NotaryError) -> Self {
        match err {
            NotaryError::Conflict { input } => FlowError::NotaryConflict { input },
            NotaryError::Unavailable(reason) => FlowError::Unreachable(reason),
            other => FlowError::NotaryRejected(other.to_string()),
        }
    }
}
