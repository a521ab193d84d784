use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hex;
use crate::identity::SignerKey;
use crate::obligation::ObligationState;

/// Content-addressed transaction identifier: the BLAKE3 hash of the
/// envelope's canonical form, hex-encoded.
///
/// Signatures are taken over these bytes, so every participant signing the
/// same envelope signs the same message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(String);

impl TxId {
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hex::encode(&hash))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex characters, for log display.
    pub fn short_id(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to the output of a previously committed transaction.
///
/// Inputs consume these; the notary's uniqueness check is keyed on them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateRef {
    pub tx_id: TxId,
    pub index: u32,
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id.short_id(), self.index)
    }
}

/// Typed marker naming which contract rule set governs a transaction.
///
/// Each variant carries its own rule set; the verifier dispatches on it by
/// exhaustive match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandIntent {
    /// Issue a new obligation. Consumes nothing, produces one record.
    Create,
}

/// The intent marker plus the keys that must countersign for the
/// transaction to be valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub intent: CommandIntent,
    pub required_signers: Vec<SignerKey>,
}

/// A proposed atomic ledger mutation: records consumed, records produced,
/// and the command that authorizes the change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub inputs: Vec<StateRef>,
    pub outputs: Vec<ObligationState>,
    pub command: Command,
}

impl TransactionEnvelope {
    /// Compute the content-addressed identifier.
    ///
    /// Canonical form: the JSON encoding of each field, concatenated and
    /// hashed with BLAKE3. Identical envelopes hash identically on every
    /// participant.
    pub fn id(&self) -> TxId {
        let mut hasher = blake3::Hasher::new();
        let inputs = serde_json::to_vec(&self.inputs).expect("inputs serializable");
        let outputs = serde_json::to_vec(&self.outputs).expect("outputs serializable");
        let command = serde_json::to_vec(&self.command).expect("command serializable");

        hasher.update(&inputs);
        hasher.update(&outputs);
        hasher.update(&command);

        TxId::from_hash(*hasher.finalize().as_bytes())
    }
}
