use std::sync::Arc;

use async_trait::async_trait;
use promissory_flow::{CounterpartyResponder, ObligationVault, ResponderError};
use promissory_types::{FinalizedTransaction, Party, PartyIdentity, PartySignature, SignedTransaction};
use tracing::{info, warn};

use crate::vault::InMemoryVault;

/// Counterparty node answering signature requests.
///
/// Independently re-runs the contract verifier on every received
/// transaction and refuses on any failure; it never signs on trust in the
/// proposer. Also receives the finality distribution and records the
/// notarized transaction in its own vault.
pub struct RespondingParty {
    identity: PartyIdentity,
    vault: Arc<InMemoryVault>,
}

impl RespondingParty {
    pub fn new(identity: PartyIdentity) -> Self {
        Self {
            identity,
            vault: Arc::new(InMemoryVault::new()),
        }
    }

    pub fn party(&self) -> &Party {
        self.identity.party()
    }

    pub fn vault(&self) -> &Arc<InMemoryVault> {
        &self.vault
    }

    fn validate(&self, transaction: &SignedTransaction) -> Result<(), ResponderError> {
        // The same verifier the proposer ran; a rejection here terminates
        // the session with the reason.
        promissory_contract::verify(&transaction.envelope)
            .map_err(|violation| ResponderError::Refused(violation.to_string()))?;

        // Every already-collected signature must hold over the exact same
        // envelope bytes.
        transaction.verify_signatures().map_err(|err| {
            ResponderError::Refused(format!("invalid signature set: {err}"))
        })?;

        // Only sign if this identity is the one signer still missing.
        let missing = transaction.missing_signers();
        if missing != vec![self.identity.owning_key().clone()] {
            return Err(ResponderError::Refused(
                "not the outstanding required signer for this transaction".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterpartyResponder for RespondingParty {
    async fn request_signature(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<PartySignature, ResponderError> {
        if let Err(err) = self.validate(transaction) {
            warn!(
                tx_id = %transaction.tx_id.short_id(),
                party = %self.identity.party(),
                error = %err,
                "refusing signature request"
            );
            return Err(err);
        }

        info!(
            tx_id = %transaction.tx_id.short_id(),
            party = %self.identity.party(),
            "countersigning verified transaction"
        );
        Ok(self.identity.sign(&transaction.tx_id))
    }

    async fn record_finalized(
        &self,
        transaction: &FinalizedTransaction,
    ) -> Result<(), ResponderError> {
        transaction
            .verify()
            .map_err(|err| ResponderError::Refused(format!("finality check failed: {err}")))?;
        self.vault
            .record(transaction)
            .map_err(|err| ResponderError::Refused(err.to_string()))?;
        info!(
            tx_id = %transaction.tx_id().short_id(),
            party = %self.identity.party(),
            "finalized transaction recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use promissory_types::{
        Command, CommandIntent, ObligationState, TransactionEnvelope,
    };

    use super::*;

    fn proposal(value: i64, lender: &PartyIdentity, borrower: &PartyIdentity) -> SignedTransaction {
        let envelope = TransactionEnvelope {
            inputs: vec![],
            outputs: vec![ObligationState::new(
                value,
                lender.party().clone(),
                borrower.party().clone(),
            )],
            command: Command {
                intent: CommandIntent::Create,
                required_signers: vec![
                    lender.owning_key().clone(),
                    borrower.owning_key().clone(),
                ],
            },
        };
        let mut stx = SignedTransaction::new(envelope);
        stx.add_signature(lender.sign(&stx.tx_id)).unwrap();
        stx
    }

    #[tokio::test]
    async fn countersigns_valid_self_signed_transaction() {
        let lender = PartyIdentity::generate("lender");
        let responder = RespondingParty::new(PartyIdentity::generate("borrower"));
        let mut stx = proposal(100, &lender, &responder.identity);

        let signature = responder.request_signature(&stx).await.unwrap();
        stx.add_signature(signature).unwrap();
        assert!(stx.is_fully_signed());
    }

    #[tokio::test]
    async fn refuses_contract_violation_with_reason() {
        let lender = PartyIdentity::generate("lender");
        let responder = RespondingParty::new(PartyIdentity::generate("borrower"));
        let mut stx = proposal(100, &lender, &responder.identity);
        // Tamper after signing: the pinned id no longer matches.
        stx.envelope.outputs[0].value = 0;
        stx.tx_id = stx.envelope.id();
        stx.signatures.clear();

        let err = responder.request_signature(&stx).await.unwrap_err();
        match err {
            ResponderError::Refused(reason) => assert_eq!(reason, "value must be positive"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn refuses_when_not_a_required_signer() {
        let lender = PartyIdentity::generate("lender");
        let borrower = PartyIdentity::generate("borrower");
        let bystander = RespondingParty::new(PartyIdentity::generate("bystander"));
        let stx = proposal(100, &lender, &borrower);

        let err = bystander.request_signature(&stx).await.unwrap_err();
        assert!(matches!(err, ResponderError::Refused(_)));
    }

    #[tokio::test]
    async fn refuses_unsigned_proposal() {
        let lender = PartyIdentity::generate("lender");
        let responder = RespondingParty::new(PartyIdentity::generate("borrower"));
        let mut stx = proposal(100, &lender, &responder.identity);
        stx.signatures.clear();

        // Without the proposer's signature the responder is not the only
        // missing signer.
        let err = responder.request_signature(&stx).await.unwrap_err();
        assert!(matches!(err, ResponderError::Refused(_)));
    }
}
