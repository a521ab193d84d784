//! Promissory node services.
//!
//! In-process implementations of the flow's collaborator contracts: the
//! notary that arbitrates input consumption and issues finality
//! signatures, the responding party that independently re-verifies before
//! countersigning, and the vault each participant records finalized
//! transactions into.

#![deny(unsafe_code)]

mod notary;
mod responder;
mod vault;

pub use notary::SimpleNotary;
pub use responder::RespondingParty;
pub use vault::InMemoryVault;
