use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::envelope::{TransactionEnvelope, TxId};
use crate::hex;
use crate::identity::{Party, SignerKey};

/// One signature over a transaction identifier, hex-encoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySignature {
    pub signer: SignerKey,
    pub signature: String,
}

impl PartySignature {
    /// Verify this signature against the given transaction identifier.
    pub fn verify(&self, tx_id: &TxId) -> Result<(), SignatureError> {
        let verifying_key = self
            .signer
            .verifying_key()
            .map_err(|_| SignatureError::MalformedKey(self.signer.short_id()))?;

        let sig_bytes = hex::decode(&self.signature)
            .map_err(|_| SignatureError::MalformedSignature(self.signer.short_id()))?;
        let sig_bytes: [u8; 64] = sig_bytes
            .as_slice()
            .try_into()
            .map_err(|_| SignatureError::MalformedSignature(self.signer.short_id()))?;

        let signature = Signature::from_bytes(&sig_bytes);
        verifying_key
            .verify(tx_id.as_bytes(), &signature)
            .map_err(|_| SignatureError::Invalid(self.signer.short_id()))
    }
}

/// An envelope with its pinned identifier and the signatures collected so
/// far.
///
/// A transaction is fully signed once every key in the envelope's
/// `required_signers` has contributed a valid signature over `tx_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub envelope: TransactionEnvelope,
    pub tx_id: TxId,
    pub signatures: Vec<PartySignature>,
}

impl SignedTransaction {
    /// Wrap an envelope, computing and pinning its identifier.
    pub fn new(envelope: TransactionEnvelope) -> Self {
        let tx_id = envelope.id();
        Self {
            envelope,
            tx_id,
            signatures: Vec::new(),
        }
    }

    /// Merge one signature after verifying it.
    ///
    /// The signer must be in the envelope's required set and must not have
    /// signed already.
    pub fn add_signature(&mut self, signature: PartySignature) -> Result<(), SignatureError> {
        if !self
            .envelope
            .command
            .required_signers
            .contains(&signature.signer)
        {
            return Err(SignatureError::NotARequiredSigner(
                signature.signer.short_id(),
            ));
        }
        if self.signatures.iter().any(|s| s.signer == signature.signer) {
            return Err(SignatureError::DuplicateSigner(signature.signer.short_id()));
        }
        signature.verify(&self.tx_id)?;
        self.signatures.push(signature);
        Ok(())
    }

    /// Required signers that have not yet contributed a signature.
    pub fn missing_signers(&self) -> Vec<SignerKey> {
        let collected: Vec<_> = self.signatures.iter().map(|s| &s.signer).collect();
        self.envelope
            .command
            .required_signers
            .iter()
            .filter(|required| !collected.contains(required))
            .cloned()
            .collect()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.missing_signers().is_empty()
    }

    /// Re-verify every collected signature and that the pinned identifier
    /// still matches the envelope contents.
    pub fn verify_signatures(&self) -> Result<(), SignatureError> {
        if self.envelope.id() != self.tx_id {
            return Err(SignatureError::IdentifierMismatch);
        }
        for signature in &self.signatures {
            signature.verify(&self.tx_id)?;
        }
        Ok(())
    }
}

/// A fully-signed transaction carrying the notary's finality signature and
/// its position in the notary's commit order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedTransaction {
    pub transaction: SignedTransaction,
    pub notary: Party,
    pub notary_signature: PartySignature,
    pub sequence: u64,
    pub committed_at: DateTime<Utc>,
}

impl FinalizedTransaction {
    pub fn tx_id(&self) -> &TxId {
        &self.transaction.tx_id
    }

    /// Check finality: the party signature set is complete and valid and
    /// the notary signature was issued by the named notary over the same
    /// identifier.
    pub fn verify(&self) -> Result<(), SignatureError> {
        self.transaction.verify_signatures()?;
        if !self.transaction.is_fully_signed() {
            return Err(SignatureError::IncompleteSignatureSet {
                missing: self.transaction.missing_signers().len(),
            });
        }
        if self.notary_signature.signer != self.notary.owning_key {
            return Err(SignatureError::NotARequiredSigner(
                self.notary_signature.signer.short_id(),
            ));
        }
        self.notary_signature.verify(&self.transaction.tx_id)
    }
}

/// Signature set errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed signer key: {0}")]
    MalformedKey(String),

    #[error("Malformed signature from signer {0}")]
    MalformedSignature(String),

    #[error("Signature from signer {0} does not verify")]
    Invalid(String),

    #[error("Signer {0} is not in the required signer set")]
    NotARequiredSigner(String),

    #[error("Signer {0} already contributed a signature")]
    DuplicateSigner(String),

    #[error("Transaction identifier does not match envelope contents")]
    IdentifierMismatch,

    #[error("Signature set incomplete: {missing} signer(s) missing")]
    IncompleteSignatureSet { missing: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Command, CommandIntent};
    use crate::identity::PartyIdentity;
    use crate::obligation::ObligationState;

    fn envelope_for(
        lender: &PartyIdentity,
        borrower: &PartyIdentity,
        value: i64,
    ) -> TransactionEnvelope {
        TransactionEnvelope {
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
        }
    }

    #[test]
    fn collects_signatures_until_fully_signed() {
        let lender = PartyIdentity::generate("lender");
        let borrower = PartyIdentity::generate("borrower");
        let mut stx = SignedTransaction::new(envelope_for(&lender, &borrower, 100));

        assert_eq!(stx.missing_signers().len(), 2);

        stx.add_signature(lender.sign(&stx.tx_id)).unwrap();
        assert!(!stx.is_fully_signed());
        assert_eq!(stx.missing_signers(), vec![borrower.owning_key().clone()]);

        stx.add_signature(borrower.sign(&stx.tx_id)).unwrap();
        assert!(stx.is_fully_signed());
        stx.verify_signatures().unwrap();
    }

    #[test]
    fn rejects_signature_from_outsider() {
        let lender = PartyIdentity::generate("lender");
        let borrower = PartyIdentity::generate("borrower");
        let outsider = PartyIdentity::generate("outsider");
        let mut stx = SignedTransaction::new(envelope_for(&lender, &borrower, 100));

        let err = stx.add_signature(outsider.sign(&stx.tx_id)).unwrap_err();
        assert!(matches!(err, SignatureError::NotARequiredSigner(_)));
    }

    #[test]
    fn rejects_duplicate_signer() {
        let lender = PartyIdentity::generate("lender");
        let borrower = PartyIdentity::generate("borrower");
        let mut stx = SignedTransaction::new(envelope_for(&lender, &borrower, 100));

        stx.add_signature(lender.sign(&stx.tx_id)).unwrap();
        let err = stx.add_signature(lender.sign(&stx.tx_id)).unwrap_err();
        assert!(matches!(err, SignatureError::DuplicateSigner(_)));
    }

    #[test]
    fn rejects_signature_over_different_transaction() {
        let lender = PartyIdentity::generate("lender");
        let borrower = PartyIdentity::generate("borrower");
        let mut stx = SignedTransaction::new(envelope_for(&lender, &borrower, 100));
        let other = SignedTransaction::new(envelope_for(&lender, &borrower, 200));

        let err = stx.add_signature(lender.sign(&other.tx_id)).unwrap_err();
        assert!(matches!(err, SignatureError::Invalid(_)));
    }

    #[test]
    fn detects_envelope_tampering_after_signing() {
        let lender = PartyIdentity::generate("lender");
        let borrower = PartyIdentity::generate("borrower");
        let mut stx = SignedTransaction::new(envelope_for(&lender, &borrower, 100));
        stx.add_signature(lender.sign(&stx.tx_id)).unwrap();

        stx.envelope.outputs[0].value = 1_000_000;
        assert_eq!(
            stx.verify_signatures().unwrap_err(),
            SignatureError::IdentifierMismatch
        );
    }

    #[test]
    fn finalized_transaction_verifies_end_to_end() {
        let lender = PartyIdentity::generate("lender");
        let borrower = PartyIdentity::generate("borrower");
        let notary = PartyIdentity::generate("notary");
        let mut stx = SignedTransaction::new(envelope_for(&lender, &borrower, 100));
        stx.add_signature(lender.sign(&stx.tx_id)).unwrap();
        stx.add_signature(borrower.sign(&stx.tx_id)).unwrap();

        let notary_signature = notary.sign(&stx.tx_id);
        let ftx = FinalizedTransaction {
            transaction: stx,
            notary: notary.party().clone(),
            notary_signature,
            sequence: 0,
            committed_at: Utc::now(),
        };
        ftx.verify().unwrap();
    }

    #[test]
    fn finalized_transaction_rejects_incomplete_signature_set() {
        let lender = PartyIdentity::generate("lender");
        let borrower = PartyIdentity::generate("borrower");
        let notary = PartyIdentity::generate("notary");
        let mut stx = SignedTransaction::new(envelope_for(&lender, &borrower, 100));
        stx.add_signature(lender.sign(&stx.tx_id)).unwrap();

        let notary_signature = notary.sign(&stx.tx_id);
        let ftx = FinalizedTransaction {
            transaction: stx,
            notary: notary.party().clone(),
            notary_signature,
            sequence: 0,
            committed_at: Utc::now(),
        };
        assert_eq!(
            ftx.verify().unwrap_err(),
            SignatureError::IncompleteSignatureSet { missing: 1 }
        );
    }
}
