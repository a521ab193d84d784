//! Promissory proposer flow.
//!
//! Drives an issuance transaction from proposal through signature
//! collection to notarized commitment. The flow is an explicit state
//! machine: it suspends while awaiting the counterparty's signature and
//! again while awaiting the notary, and persists a serializable checkpoint
//! at each suspension point so an interrupted flow can be resumed without
//! losing in-flight protocol state.
//!
//! The counterparty, notary, vault, and checkpoint store are
//! dependency-injected trait objects, never ambient services.

#![deny(unsafe_code)]

mod checkpoint;
mod error;
mod issuance;
mod services;
mod state;

pub use checkpoint::{CheckpointError, CheckpointStore, FlowCheckpoint, InMemoryCheckpointStore};
pub use error::FlowError;
pub use issuance::{FlowServices, IssuanceFlow};
pub use services::{
    CounterpartyResponder, Notary, NotaryError, ObligationVault, ResponderError, VaultError,
};
pub use state::FlowState;
