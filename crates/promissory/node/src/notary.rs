use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use promissory_flow::{Notary, NotaryError};
use promissory_types::{
    FinalizedTransaction, Party, PartyIdentity, SignedTransaction, StateRef, TxId,
};
use tracing::{info, warn};

/// In-process notary.
///
/// Serializes conflicting notarization requests behind one mutex: the
/// consumed-input map is the single point of arbitration for
/// cross-transaction races, and the commit sequence gives finalization a
/// total order. Re-submitting an already-finalized transaction returns
/// the recorded finalization rather than committing twice.
pub struct SimpleNotary {
    identity: PartyIdentity,
    inner: Mutex<NotaryLedger>,
}

#[derive(Default)]
struct NotaryLedger {
    consumed: HashMap<StateRef, TxId>,
    finalized: HashMap<TxId, FinalizedTransaction>,
    next_sequence: u64,
}

impl SimpleNotary {
    pub fn new(identity: PartyIdentity) -> Self {
        Self {
            identity,
            inner: Mutex::new(NotaryLedger::default()),
        }
    }
}

#[async_trait]
impl Notary for SimpleNotary {
    fn identity(&self) -> Party {
        self.identity.party().clone()
    }

    async fn notarize(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<FinalizedTransaction, NotaryError> {
        transaction
            .verify_signatures()
            .map_err(|err| NotaryError::InvalidSignature(err.to_string()))?;
        let missing = transaction.missing_signers().len();
        if missing > 0 {
            return Err(NotaryError::IncompleteSignatures { missing });
        }

        let mut ledger = self
            .inner
            .lock()
            .map_err(|_| NotaryError::Unavailable("notary ledger lock poisoned".to_string()))?;

        if let Some(existing) = ledger.finalized.get(&transaction.tx_id) {
            return Ok(existing.clone());
        }

        for input in &transaction.envelope.inputs {
            if ledger.consumed.contains_key(input) {
                warn!(tx_id = %transaction.tx_id.short_id(), input = %input, "notarization conflict");
                return Err(NotaryError::Conflict {
                    input: input.clone(),
                });
            }
        }
        for input in &transaction.envelope.inputs {
            ledger
                .consumed
                .insert(input.clone(), transaction.tx_id.clone());
        }

        let finalized = FinalizedTransaction {
            transaction: transaction.clone(),
            notary: self.identity.party().clone(),
            notary_signature: self.identity.sign(&transaction.tx_id),
            sequence: ledger.next_sequence,
            committed_at: Utc::now(),
        };
        ledger.next_sequence += 1;
        ledger
            .finalized
            .insert(transaction.tx_id.clone(), finalized.clone());

        info!(
            tx_id = %transaction.tx_id.short_id(),
            sequence = finalized.sequence,
            "transaction finalized"
        );
        Ok(finalized)
    }
}
