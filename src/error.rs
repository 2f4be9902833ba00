use thiserror::Error;

use crate::model::{BatchId, BatchStatus};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("batch service request failed")]
    Remote(#[source] anyhow::Error),
    #[error("batch {0} is not known; fetch it first")]
    UnknownBatch(BatchId),
    #[error("batch cannot move from {from} to {to}")]
    InvalidTransition { from: BatchStatus, to: BatchStatus },
}
