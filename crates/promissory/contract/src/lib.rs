//! Promissory contract verifier.
//!
//! A pure function of the transaction envelope: given the inputs, outputs,
//! intent, and required signer set, either accept the proposed mutation or
//! reject it with a specific reason. No external state is consulted, so
//! every participant replays the identical verification and reaches the
//! identical verdict.

#![deny(unsafe_code)]

use promissory_types::{CommandIntent, TransactionEnvelope};
use thiserror::Error;

/// Why an envelope was rejected. The `Display` string is the rejection
/// reason surfaced to the caller and the counterparty.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("no inputs allowed on issuance")]
    InputsNotEmpty,

    #[error("exactly one output required")]
    OutputCountNotOne,

    #[error("value must be positive")]
    NonPositiveValue,

    #[error("lender and borrower must differ")]
    LenderIsBorrower,

    #[error("two signers required")]
    SignerCountNotTwo,

    #[error("borrower and lender must both be signers")]
    PartiesNotSigners,
}

/// Verify an envelope against the rule set named by its intent.
///
/// Stateless and deterministic; checks run in a fixed order and fail fast
/// on the first violation.
pub fn verify(envelope: &TransactionEnvelope) -> Result<(), ContractViolation> {
    match envelope.command.intent {
        CommandIntent::Create => verify_create(envelope),
    }
}

/// Rules for issuing a new obligation.
///
/// All checks read the declared output's fields, never the invoking
/// party's, so the counterparty and any later auditor verify exactly what
/// the proposer verified.
fn verify_create(envelope: &TransactionEnvelope) -> Result<(), ContractViolation> {
    // Shape of the transaction.
    if !envelope.inputs.is_empty() {
        return Err(ContractViolation::InputsNotEmpty);
    }
    if envelope.outputs.len() != 1 {
        return Err(ContractViolation::OutputCountNotOne);
    }

    // Obligation-specific rules.
    let output = &envelope.outputs[0];
    if output.value <= 0 {
        return Err(ContractViolation::NonPositiveValue);
    }
    if output.lender.owning_key == output.borrower.owning_key {
        return Err(ContractViolation::LenderIsBorrower);
    }

    // Signer set.
    let required = &envelope.command.required_signers;
    if required.len() != 2 {
        return Err(ContractViolation::SignerCountNotTwo);
    }
    if !output
        .participants()
        .iter()
        .all(|key| required.contains(key))
    {
        return Err(ContractViolation::PartiesNotSigners);
    }

    Ok(())
}
