use std::sync::Arc;

use chrono::Utc;
use promissory_types::{
    Command, CommandIntent, FinalizedTransaction, ObligationState, Party, PartyIdentity,
    SignedTransaction, TransactionEnvelope, TxId,
};
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointStore, FlowCheckpoint};
use crate::error::FlowError;
use crate::services::{CounterpartyResponder, Notary, ObligationVault, VaultError};
use crate::state::FlowState;

/// The collaborators an issuance flow is constructed with.
#[derive(Clone)]
pub struct FlowServices {
    pub responder: Arc<dyn CounterpartyResponder>,
    pub notary: Arc<dyn Notary>,
    pub vault: Arc<dyn ObligationVault>,
    pub checkpoints: Arc<dyn CheckpointStore>,
}

/// Proposer-side issuance flow.
///
/// Builds the envelope with the proposer as lender and the counterparty as
/// borrower, verifies it against the contract, signs it, collects the
/// counterparty's signature, submits to the notary, and records the
/// finalized transaction. Steps run in strict order; verification must
/// pass before any signature is solicited, the signature set must be
/// complete before notarization, and nothing is written to the vault
/// before the notary's response.
pub struct IssuanceFlow {
    value: i64,
    counterparty: Party,
    proposer: PartyIdentity,
    services: FlowServices,
    state: FlowState,
    transaction: Option<SignedTransaction>,
    finalized: Option<FinalizedTransaction>,
}

// Manual impl: `proposer` holds a private signing key and `services` holds
// trait objects, so neither can be printed.
impl std::fmt::Debug for IssuanceFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceFlow")
            .field("value", &self.value)
            .field("counterparty", &self.counterparty)
            .field("state", &self.state)
            .field("transaction", &self.transaction)
            .field("finalized", &self.finalized)
            .finish_non_exhaustive()
    }
}

impl IssuanceFlow {
    pub fn new(
        value: i64,
        counterparty: Party,
        proposer: PartyIdentity,
        services: FlowServices,
    ) -> Self {
        Self {
            value,
            counterparty,
            proposer,
            services,
            state: FlowState::Init,
            transaction: None,
            finalized: None,
        }
    }

    /// Restore a suspended flow from its checkpoint, keyed by transaction
    /// identifier. The resuming identity must be the lender recorded in
    /// the checkpointed envelope.
    pub fn resume(
        tx_id: &TxId,
        proposer: PartyIdentity,
        services: FlowServices,
    ) -> Result<Self, FlowError> {
        let checkpoint = services
            .checkpoints
            .load(tx_id)?
            .ok_or_else(|| FlowError::UnknownCheckpoint(tx_id.short_id()))?;

        let (value, counterparty) = {
            let output = checkpoint
                .transaction
                .envelope
                .outputs
                .first()
                .ok_or_else(|| FlowError::UnknownCheckpoint(tx_id.short_id()))?;
            if output.lender.owning_key != *proposer.owning_key() {
                return Err(FlowError::WrongResumeIdentity(
                    proposer.owning_key().short_id(),
                ));
            }
            (output.value, output.borrower.clone())
        };

        info!(
            tx_id = %checkpoint.tx_id.short_id(),
            state = ?checkpoint.state,
            "resuming issuance flow from checkpoint"
        );

        Ok(Self {
            value,
            counterparty,
            proposer,
            services,
            state: checkpoint.state,
            transaction: Some(checkpoint.transaction),
            finalized: None,
        })
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn tx_id(&self) -> Option<&TxId> {
        self.transaction.as_ref().map(|tx| &tx.tx_id)
    }

    /// Drive the flow to completion.
    ///
    /// Returns no payload; the durable side effect is the recorded
    /// obligation. On failure the flow transitions to `Failed` with the
    /// reason, and only `Unreachable` errors leave a checkpoint behind for
    /// a later `resume`.
    pub async fn run(&mut self) -> Result<(), FlowError> {
        match self.drive().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    async fn drive(&mut self) -> Result<(), FlowError> {
        loop {
            match self.state.clone() {
                FlowState::Init => self.build()?,
                FlowState::Built => self.verify_locally()?,
                FlowState::LocallyVerified => self.self_sign()?,
                FlowState::SelfSigned => self.collect_countersignature().await?,
                FlowState::Countersigned => self.notarize().await?,
                FlowState::Notarized => self.record().await?,
                FlowState::Done => return Ok(()),
                FlowState::Failed { .. } => {
                    return Err(FlowError::InvalidTransition {
                        state: self.state.clone(),
                        operation: "run",
                    })
                }
            }
        }
    }

    /// INIT -> BUILT: assemble the envelope. Proposer is the lender, the
    /// counterparty the borrower; no inputs; both keys required to sign.
    fn build(&mut self) -> Result<(), FlowError> {
        self.expect(FlowState::Init, "build the envelope")?;

        let output = ObligationState::new(
            self.value,
            self.proposer.party().clone(),
            self.counterparty.clone(),
        );
        let envelope = TransactionEnvelope {
            inputs: vec![],
            outputs: vec![output],
            command: Command {
                intent: CommandIntent::Create,
                required_signers: vec![
                    self.proposer.owning_key().clone(),
                    self.counterparty.owning_key.clone(),
                ],
            },
        };
        let transaction = SignedTransaction::new(envelope);

        debug!(tx_id = %transaction.tx_id.short_id(), value = self.value, "envelope built");
        self.transaction = Some(transaction);
        self.state = FlowState::Built;
        Ok(())
    }

    /// BUILT -> LOCALLY_VERIFIED: run the contract verifier. A rejection
    /// here means no signature is ever solicited for this envelope.
    fn verify_locally(&mut self) -> Result<(), FlowError> {
        self.expect(FlowState::Built, "verify locally")?;

        let transaction = self.transaction()?;
        promissory_contract::verify(&transaction.envelope)?;

        debug!(tx_id = %transaction.tx_id.short_id(), "contract verification passed");
        self.state = FlowState::LocallyVerified;
        Ok(())
    }

    /// LOCALLY_VERIFIED -> SELF_SIGNED: attach the proposer's signature
    /// and checkpoint before the first suspension.
    fn self_sign(&mut self) -> Result<(), FlowError> {
        self.expect(FlowState::LocallyVerified, "self-sign")?;

        let signature = {
            let transaction = self.transaction()?;
            self.proposer.sign(&transaction.tx_id)
        };
        self.transaction_mut()?.add_signature(signature)?;

        self.state = FlowState::SelfSigned;
        self.checkpoint()?;
        Ok(())
    }

    /// SELF_SIGNED -> COUNTERSIGNED: one message to the counterparty, one
    /// reply back. The returned signature is verified before it is merged;
    /// a partial signature set is never carried forward.
    async fn collect_countersignature(&mut self) -> Result<(), FlowError> {
        self.expect(FlowState::SelfSigned, "collect countersignature")?;

        let request = self.transaction()?.clone();
        let signature = self.services.responder.request_signature(&request).await?;

        let transaction = self.transaction_mut()?;
        transaction.add_signature(signature)?;
        let missing = transaction.missing_signers().len();
        if missing > 0 {
            return Err(FlowError::IncompleteSignatures { missing });
        }

        info!(tx_id = %request.tx_id.short_id(), "signature set complete");
        self.state = FlowState::Countersigned;
        self.checkpoint()?;
        Ok(())
    }

    /// COUNTERSIGNED -> NOTARIZED: submit the fully-signed transaction for
    /// uniqueness arbitration and the finality signature.
    async fn notarize(&mut self) -> Result<(), FlowError> {
        self.expect(FlowState::Countersigned, "notarize")?;

        let transaction = self.transaction()?.clone();
        let finalized = self.services.notary.notarize(&transaction).await?;

        info!(
            tx_id = %finalized.tx_id().short_id(),
            sequence = finalized.sequence,
            "transaction notarized"
        );
        self.finalized = Some(finalized);
        self.state = FlowState::Notarized;
        Ok(())
    }

    /// NOTARIZED -> DONE: durably record the finalized transaction on both
    /// participants and drop the checkpoint.
    async fn record(&mut self) -> Result<(), FlowError> {
        self.expect(FlowState::Notarized, "record")?;

        let finalized = self
            .finalized
            .clone()
            .ok_or_else(|| FlowError::InvalidTransition {
                state: self.state.clone(),
                operation: "record without a finalized transaction",
            })?;

        // A resumed flow that already recorded locally but failed to reach
        // the counterparty re-runs this step; the duplicate is not an error.
        match self.services.vault.record(&finalized) {
            Ok(()) | Err(VaultError::Duplicate(_)) => {}
            Err(err) => return Err(err.into()),
        }
        self.services.responder.record_finalized(&finalized).await?;
        self.services.checkpoints.remove(finalized.tx_id())?;

        info!(tx_id = %finalized.tx_id().short_id(), "issuance complete");
        self.state = FlowState::Done;
        Ok(())
    }

    fn fail(&mut self, err: &FlowError) {
        warn!(state = ?self.state, error = %err, "issuance flow failed");
        if !err.is_retryable() {
            // Terminal rejection: nothing was committed, the checkpoint is
            // stale.
            if let Some(transaction) = &self.transaction {
                let _ = self.services.checkpoints.remove(&transaction.tx_id);
            }
        }
        self.state = FlowState::Failed {
            reason: err.to_string(),
        };
    }

    fn expect(&self, expected: FlowState, operation: &'static str) -> Result<(), FlowError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(FlowError::InvalidTransition {
                state: self.state.clone(),
                operation,
            })
        }
    }

    fn checkpoint(&self) -> Result<(), FlowError> {
        let transaction = self.transaction()?;
        self.services.checkpoints.save(FlowCheckpoint {
            tx_id: transaction.tx_id.clone(),
            state: self.state.clone(),
            transaction: transaction.clone(),
            updated_at: Utc::now(),
        })?;
        Ok(())
    }

    fn transaction(&self) -> Result<&SignedTransaction, FlowError> {
        self.transaction
            .as_ref()
            .ok_or_else(|| FlowError::InvalidTransition {
                state: self.state.clone(),
                operation: "access the transaction",
            })
    }

    fn transaction_mut(&mut self) -> Result<&mut SignedTransaction, FlowError> {
        let state = self.state.clone();
        self.transaction
            .as_mut()
            .ok_or(FlowError::InvalidTransition {
                state,
                operation: "access the transaction",
            })
    }
}
