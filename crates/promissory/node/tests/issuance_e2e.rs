//! End-to-end issuance scenarios: a proposer node, a responding
//! counterparty node, and a notary wired together in process.

use std::sync::Arc;

use async_trait::async_trait;
use promissory_flow::{
    CounterpartyResponder, FlowError, FlowServices, FlowState, InMemoryCheckpointStore,
    ObligationVault, ResponderError,
};
use promissory_node::{InMemoryVault, RespondingParty, SimpleNotary};
use promissory_types::{
    FinalizedTransaction, PartyIdentity, PartySignature, SignedTransaction,
};

struct Network {
    proposer: PartyIdentity,
    responder: Arc<RespondingParty>,
    notary: Arc<SimpleNotary>,
    proposer_vault: Arc<InMemoryVault>,
    checkpoints: Arc<InMemoryCheckpointStore>,
}

impl Network {
    fn new() -> Self {
        Self {
            proposer: PartyIdentity::generate("Alice"),
            responder: Arc::new(RespondingParty::new(PartyIdentity::generate("Bob"))),
            notary: Arc::new(SimpleNotary::new(PartyIdentity::generate("Notary"))),
            proposer_vault: Arc::new(InMemoryVault::new()),
            checkpoints: Arc::new(InMemoryCheckpointStore::new()),
        }
    }

    fn services(&self) -> FlowServices {
        FlowServices {
            responder: self.responder.clone(),
            notary: self.notary.clone(),
            vault: self.proposer_vault.clone(),
            checkpoints: self.checkpoints.clone(),
        }
    }

    fn flow(&self, value: i64) -> promissory_flow::IssuanceFlow {
        promissory_flow::IssuanceFlow::new(
            value,
            self.responder.party().clone(),
            self.proposer.clone(),
            self.services(),
        )
    }
}

#[tokio::test]
async fn scenario_a_valid_issuance_recorded_by_both_parties() {
    let network = Network::new();
    let mut flow = network.flow(100);

    flow.run().await.unwrap();
    assert_eq!(flow.state(), &FlowState::Done);

    // The proposer's ledger gained exactly one record with the proposal's
    // fields.
    let obligations = network.proposer_vault.obligations().unwrap();
    assert_eq!(obligations.len(), 1);
    assert_eq!(obligations[0].value, 100);
    assert_eq!(&obligations[0].lender, network.proposer.party());
    assert_eq!(&obligations[0].borrower, network.responder.party());

    // Both participants hold the identical finalized transaction.
    let tx_id = flow.tx_id().unwrap();
    let proposer_copy = network.proposer_vault.get(tx_id).unwrap().unwrap();
    let responder_copy = network.responder.vault().get(tx_id).unwrap().unwrap();
    assert_eq!(proposer_copy, responder_copy);
    proposer_copy.verify().unwrap();
}

#[tokio::test]
async fn scenario_b_zero_value_fails_verification_and_records_nothing() {
    let network = Network::new();
    let mut flow = network.flow(0);

    let err = flow.run().await.unwrap_err();
    assert!(err.to_string().contains("value must be positive"));
    assert!(matches!(flow.state(), FlowState::Failed { .. }));

    assert!(network.proposer_vault.obligations().unwrap().is_empty());
    assert!(network.responder.vault().obligations().unwrap().is_empty());
}

#[tokio::test]
async fn scenario_c_self_issuance_fails_verification() {
    let network = Network::new();
    let mut flow = promissory_flow::IssuanceFlow::new(
        50,
        network.proposer.party().clone(),
        network.proposer.clone(),
        network.services(),
    );

    let err = flow.run().await.unwrap_err();
    assert!(err.to_string().contains("lender and borrower must differ"));
    assert!(network.proposer_vault.obligations().unwrap().is_empty());
}

/// Counterparty that refuses every request with a fixed reason.
struct Decliner;

#[async_trait]
impl CounterpartyResponder for Decliner {
    async fn request_signature(
        &self,
        _transaction: &SignedTransaction,
    ) -> Result<PartySignature, ResponderError> {
        Err(ResponderError::Refused(
            "borrower declines this obligation".to_string(),
        ))
    }

    async fn record_finalized(
        &self,
        _transaction: &FinalizedTransaction,
    ) -> Result<(), ResponderError> {
        Ok(())
    }
}

#[tokio::test]
async fn scenario_d_counterparty_refusal_surfaces_its_reason() {
    let network = Network::new();
    let mut flow = promissory_flow::IssuanceFlow::new(
        100,
        network.responder.party().clone(),
        network.proposer.clone(),
        FlowServices {
            responder: Arc::new(Decliner),
            notary: network.notary.clone(),
            vault: network.proposer_vault.clone(),
            checkpoints: network.checkpoints.clone(),
        },
    );

    let err = flow.run().await.unwrap_err();
    match err {
        FlowError::CounterpartyRefused(reason) => {
            assert_eq!(reason, "borrower declines this obligation")
        }
        other => panic!("unexpected error: {other}"),
    }

    // Nothing was notarized or recorded anywhere.
    assert!(network.proposer_vault.obligations().unwrap().is_empty());
    assert!(network.responder.vault().obligations().unwrap().is_empty());
}

#[tokio::test]
async fn consecutive_issuances_are_ordered_by_the_notary() {
    let network = Network::new();

    let mut first = network.flow(10);
    first.run().await.unwrap();
    let mut second = network.flow(20);
    second.run().await.unwrap();

    let first_ftx = network
        .proposer_vault
        .get(first.tx_id().unwrap())
        .unwrap()
        .unwrap();
    let second_ftx = network
        .proposer_vault
        .get(second.tx_id().unwrap())
        .unwrap()
        .unwrap();
    assert!(first_ftx.sequence < second_ftx.sequence);

    let obligations = network.proposer_vault.obligations().unwrap();
    assert_eq!(
        obligations.iter().map(|o| o.value).collect::<Vec<_>>(),
        vec![10, 20]
    );
}
