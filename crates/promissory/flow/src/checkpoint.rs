use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use promissory_types::{SignedTransaction, TxId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::FlowState;

/// Everything needed to restore an in-flight flow: the accumulated
/// transaction (envelope plus collected signatures) and the state marker.
///
/// Persisted at each suspension point and keyed by the transaction
/// identifier, so a process restart neither loses protocol state nor
/// double-submits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowCheckpoint {
    pub tx_id: TxId,
    pub state: FlowState,
    pub transaction: SignedTransaction,
    pub updated_at: DateTime<Utc>,
}

/// Storage boundary for flow checkpoints.
pub trait CheckpointStore: Send + Sync {
    fn save(&self, checkpoint: FlowCheckpoint) -> Result<(), CheckpointError>;

    fn load(&self, tx_id: &TxId) -> Result<Option<FlowCheckpoint>, CheckpointError>;

    fn remove(&self, tx_id: &TxId) -> Result<(), CheckpointError>;
}

/// Checkpoint store failure.
#[derive(Debug, Error)]
#[error("checkpoint store failure: {0}")]
pub struct CheckpointError(pub String);

/// In-memory checkpoint store for tests and in-process deployments.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<TxId, FlowCheckpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn save(&self, checkpoint: FlowCheckpoint) -> Result<(), CheckpointError> {
        let mut checkpoints = self
            .checkpoints
            .write()
            .map_err(|_| CheckpointError("lock poisoned".to_string()))?;
        checkpoints.insert(checkpoint.tx_id.clone(), checkpoint);
        Ok(())
    }

    fn load(&self, tx_id: &TxId) -> Result<Option<FlowCheckpoint>, CheckpointError> {
        let checkpoints = self
            .checkpoints
            .read()
            .map_err(|_| CheckpointError("lock poisoned".to_string()))?;
        Ok(checkpoints.get(tx_id).cloned())
    }

    fn remove(&self, tx_id: &TxId) -> Result<(), CheckpointError> {
        let mut checkpoints = self
            .checkpoints
            .write()
            .map_err(|_| CheckpointError("lock poisoned".to_string()))?;
        checkpoints.remove(tx_id);
        Ok(())
    }
}
