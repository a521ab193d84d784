use serde::{Deserialize, Serialize};

use crate::identity::{Party, SignerKey};

/// One IOU: `borrower` owes `lender` the given amount.
///
/// Created only as the single output of a successful issuance transaction
/// and immutable afterwards. The contract, not this type, enforces that
/// `value` is positive and that lender and borrower differ, so that an
/// invalid proposal can be represented, verified, and rejected with a
/// specific reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationState {
    pub value: i64,
    pub lender: Party,
    pub borrower: Party,
}

impl ObligationState {
    pub fn new(value: i64, lender: Party, borrower: Party) -> Self {
        Self {
            value,
            lender,
            borrower,
        }
    }

    /// The keys of the two parties to the obligation.
    pub fn participants(&self) -> [&SignerKey; 2] {
        [&self.lender.owning_key, &self.borrower.owning_key]
    }
}
