use async_trait::async_trait;
use promissory_types::{
    FinalizedTransaction, ObligationState, Party, PartySignature, SignedTransaction, StateRef,
    TxId,
};
use thiserror::Error;

/// The paired protocol participant asked to countersign an issuance.
///
/// A conforming responder re-runs the contract verifier on the received
/// transaction before signing and refuses on any verification failure;
/// it never signs on trust in the proposer.
#[async_trait]
pub trait CounterpartyResponder: Send + Sync {
    /// One message out carrying the self-signed transaction, one reply
    /// back carrying either the counterparty's signature or a refusal.
    async fn request_signature(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<PartySignature, ResponderError>;

    /// Finality distribution: hand the notarized transaction to the
    /// counterparty for durable recording.
    async fn record_finalized(
        &self,
        transaction: &FinalizedTransaction,
    ) -> Result<(), ResponderError>;
}

/// Responder-side failure modes. `Refused` reflects the counterparty's own
/// validation outcome and is never retried; `Unreachable` is a transport
/// failure and may be retried by resuming the flow.
#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("{0}")]
    Refused(String),

    #[error("counterparty unreachable: {0}")]
    Unreachable(String),
}

/// The ordering and uniqueness service.
///
/// Guarantees that no two finalized transactions consume the same input
/// and that finalization is total-order-consistent across everything it
/// notarizes.
#[async_trait]
pub trait Notary: Send + Sync {
    fn identity(&self) -> Party;

    /// One message carrying the fully-signed transaction; one reply
    /// carrying either the finalized transaction or a conflict naming the
    /// already-consumed input.
    async fn notarize(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<FinalizedTransaction, NotaryError>;
}

/// Notary-side failure modes.
#[derive(Debug, Error)]
pub enum NotaryError {
    #[error("input {input} already consumed")]
    Conflict { input: StateRef },

    #[error("signature set incomplete: {missing} signer(s) missing")]
    IncompleteSignatures { missing: usize },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("notary unavailable: {0}")]
    Unavailable(String),
}

/// Durable store of finalized transactions on one participant's node.
pub trait ObligationVault: Send + Sync {
    fn record(&self, transaction: &FinalizedTransaction) -> Result<(), VaultError>;

    fn get(&self, tx_id: &TxId) -> Result<Option<FinalizedTransaction>, VaultError>;

    /// All obligation records held in the vault.
    fn obligations(&self) -> Result<Vec<ObligationState>, VaultError>;
}

/// Vault errors.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("transaction failed finality verification: {0}")]
    InvalidTransaction(String),

    #[error("transaction {0} already recorded")]
    Duplicate(String),

    #[error("lock error")]
    LockError,
}
