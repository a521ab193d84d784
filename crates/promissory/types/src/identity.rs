use std::fmt;

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hex;
use crate::transaction::PartySignature;
use crate::TxId;

/// Hex-encoded Ed25519 verifying key identifying one signer on the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignerKey(String);

impl SignerKey {
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(hex::encode(key.as_bytes()))
    }

    /// Decode back to the Ed25519 verifying key.
    pub fn verifying_key(&self) -> Result<VerifyingKey, KeyError> {
        let bytes = hex::decode(&self.0).map_err(|_| KeyError::MalformedKey(self.short_id()))?;
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::MalformedKey(self.short_id()))?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::MalformedKey(self.short_id()))
    }

    /// First eight hex characters, for log display.
    pub fn short_id(&self) -> String {
        self.0.chars().take(8).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An on-ledger identity: a display name plus the key that must sign for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub owning_key: SignerKey,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.owning_key.short_id())
    }
}

/// A party together with its private signing key.
///
/// Held only by the node that owns the identity; never serialized.
#[derive(Clone)]
pub struct PartyIdentity {
    party: Party,
    signing_key: SigningKey,
}

impl PartyIdentity {
    /// Generate a fresh Ed25519 identity.
    pub fn generate(name: impl Into<String>) -> Self {
        let mut secret_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut secret_bytes);
        Self::from_signing_key(name, SigningKey::from_bytes(&secret_bytes))
    }

    pub fn from_signing_key(name: impl Into<String>, signing_key: SigningKey) -> Self {
        let party = Party {
            name: name.into(),
            owning_key: SignerKey::from_verifying_key(&signing_key.verifying_key()),
        };
        Self { party, signing_key }
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn owning_key(&self) -> &SignerKey {
        &self.party.owning_key
    }

    /// Sign a transaction identifier with this identity's key.
    pub fn sign(&self, tx_id: &TxId) -> PartySignature {
        let signature = self.signing_key.sign(tx_id.as_bytes());
        PartySignature {
            signer: self.party.owning_key.clone(),
            signature: hex::encode(signature.to_bytes().as_slice()),
        }
    }
}

/// Key decoding errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Malformed signer key: {0}")]
    MalformedKey(String),
}
