use serde::{Deserialize, Serialize};

/// Position of an issuance flow in its lifecycle.
///
/// States advance in strict order with no skipping and no re-entry;
/// `Failed` is terminal and reachable from any non-terminal state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    /// Constructed, nothing built yet.
    Init,
    /// Envelope assembled with empty inputs and the issuance command.
    Built,
    /// The contract verifier accepted the envelope.
    LocallyVerified,
    /// The proposer's own signature is attached.
    SelfSigned,
    /// Every required signer has contributed a valid signature.
    Countersigned,
    /// The notary issued its finality signature.
    Notarized,
    /// Recorded by all participants.
    Done,
    Failed { reason: String },
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Done | FlowState::Failed { .. })
    }

    /// The only state this one may legally advance to (besides `Failed`).
    pub fn successor(&self) -> Option<FlowState> {
        match self {
            FlowState::Init => Some(FlowState::Built),
            FlowState::Built => Some(FlowState::LocallyVerified),
            FlowState::LocallyVerified => Some(FlowState::SelfSigned),
            FlowState::SelfSigned => Some(FlowState::Countersigned),
            FlowState::Countersigned => Some(FlowState::Notarized),
            FlowState::Notarized => Some(FlowState::Done),
            FlowState::Done | FlowState::Failed { .. } => None,
        }
    }
}
