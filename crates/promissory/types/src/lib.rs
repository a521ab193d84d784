//! Promissory data model.
//!
//! Defines the on-ledger entities shared by every protocol participant:
//! party identities and their Ed25519 keys, the transaction envelope with
//! its content-addressed identifier, and the signature set that makes an
//! envelope a committed transaction.

#![deny(unsafe_code)]

mod envelope;
mod hex;
mod identity;
mod obligation;
mod transaction;

pub use envelope::{Command, CommandIntent, StateRef, TransactionEnvelope, TxId};
pub use identity::{KeyError, Party, PartyIdentity, SignerKey};
pub use obligation::ObligationState;
pub use transaction::{
    FinalizedTransaction, PartySignature, SignatureError, SignedTransaction,
};
