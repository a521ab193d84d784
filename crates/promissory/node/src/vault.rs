use std::collections::HashMap;
use std::sync::RwLock;

use promissory_flow::{ObligationVault, VaultError};
use promissory_types::{FinalizedTransaction, ObligationState, TxId};

/// In-memory vault of finalized transactions for one participant.
///
/// Only verified, finalized transactions are accepted; the envelope's
/// outputs are the obligation records the participant holds.
#[derive(Default)]
pub struct InMemoryVault {
    inner: RwLock<VaultContents>,
}

#[derive(Default)]
struct VaultContents {
    transactions: HashMap<TxId, FinalizedTransaction>,
    order: Vec<TxId>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObligationVault for InMemoryVault {
    fn record(&self, transaction: &FinalizedTransaction) -> Result<(), VaultError> {
        transaction
            .verify()
            .map_err(|err| VaultError::InvalidTransaction(err.to_string()))?;

        let mut contents = self.inner.write().map_err(|_| VaultError::LockError)?;
        let tx_id = transaction.tx_id().clone();
        if contents.transactions.contains_key(&tx_id) {
            return Err(VaultError::Duplicate(tx_id.short_id()));
        }
        contents.order.push(tx_id.clone());
        contents.transactions.insert(tx_id, transaction.clone());
        Ok(())
    }

    fn get(&self, tx_id: &TxId) -> Result<Option<FinalizedTransaction>, VaultError> {
        let contents = self.inner.read().map_err(|_| VaultError::LockError)?;
        Ok(contents.transactions.get(tx_id).cloned())
    }

    fn obligations(&self) -> Result<Vec<ObligationState>, VaultError> {
        let contents = self.inner.read().map_err(|_| VaultError::LockError)?;
        Ok(contents
            .order
            .iter()
            .filter_map(|tx_id| contents.transactions.get(tx_id))
            .flat_map(|f| f.transaction.envelope.outputs.iter().cloned())
            .collect())
    }
}
