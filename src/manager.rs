//! Batch lifecycle manager: the surface the UI talks to.
//!
//! Validation always completes before a remote call is issued, and the store
//! is only written after the remote service confirms. Locks are never held
//! across a remote call.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::api::BatchService;
use crate::clock::Clock;
use crate::drag::{DragController, DropDecision, DropTarget, IgnoreReason};
use crate::error::ManagerError;
use crate::lifecycle::{can_delete, can_transition};
use crate::model::{Batch, BatchId, BatchPatch, BatchStatus, StatusFilter};
use crate::store::{Board, BatchStore};

#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    Committed(Batch),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Rejected { status: BatchStatus, enrolled_count: u32 },
}

pub struct BatchManager {
    service: Arc<dyn BatchService>,
    store: Mutex<BatchStore>,
    gesture: StdMutex<DragController>,
}

/// Settles the pending commit when dropped, so an abandoned remote call
/// cannot leave the controller stuck in `Committing`.
struct SettleOnDrop<'a>(&'a StdMutex<DragController>);

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        lock_gesture(self.0).settle();
    }
}

fn lock_gesture(gesture: &StdMutex<DragController>) -> MutexGuard<'_, DragController> {
    gesture.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl BatchManager {
    pub fn new(service: Arc<dyn BatchService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            service,
            store: Mutex::new(BatchStore::new(clock)),
            gesture: StdMutex::new(DragController::new()),
        }
    }

    /// Batches for a status scope, served from cache while fresh.
    #[instrument(skip(self), fields(scope = %filter))]
    pub async fn request_batches_for_status(&self, filter: StatusFilter) -> Result<Vec<Batch>, ManagerError> {
        let generation = {
            let store = self.store.lock().await;
            if let Some(hit) = store.cached(filter) {
                debug!(count = hit.len(), "cache hit");
                return Ok(hit);
            }
            store.generation()
        };

        debug!("cache miss; fetching");
        let batches = self.service.list_batches(filter).await.map_err(|err| {
            warn!(?err, "batch fetch failed");
            ManagerError::Remote(err)
        })?;

        let mut store = self.store.lock().await;
        if !store.record_fetch(filter, batches.clone(), generation) {
            debug!("fetch overtaken by a mutation; not cached");
        }
        Ok(batches)
    }

    pub async fn board(&self) -> Board {
        self.store.lock().await.board()
    }

    pub async fn get(&self, id: &BatchId) -> Option<Batch> {
        self.store.lock().await.get(id).cloned()
    }

    pub async fn begin_drag(&self, batch_id: BatchId) -> Result<(), IgnoreReason> {
        lock_gesture(&self.gesture).pick_up(batch_id)
    }

    /// Whether dropping the dragged card on `target` would be accepted.
    pub async fn hover_drag(&self, target: DropTarget) -> bool {
        let board = self.board().await;
        lock_gesture(&self.gesture).hover(target, &board)
    }

    pub async fn cancel_drag(&self) {
        lock_gesture(&self.gesture).cancel();
    }

    /// Drop the dragged card. Rejected and unresolved drops are reported as
    /// `Ignored` and never reach the remote service.
    #[instrument(skip(self))]
    pub async fn finish_drag(&self, target: Option<DropTarget>) -> Result<DragOutcome, ManagerError> {
        let board = self.board().await;
        let decision = lock_gesture(&self.gesture).drop_on(target, &board);
        let resolution = match decision {
            DropDecision::Commit(resolution) => resolution,
            DropDecision::Ignored(reason) => {
                info!(%reason, "drag ignored");
                return Ok(DragOutcome::Ignored(reason));
            }
        };

        let settle = SettleOnDrop(&self.gesture);
        let result = self
            .service
            .update_batch(&resolution.batch_id, &BatchPatch::status(resolution.dest))
            .await;

        let outcome = match result {
            Ok(batch) => {
                info!(batch_id = %batch.id, from = %resolution.source, to = %batch.status, "batch moved");
                self.store.lock().await.apply_update(batch.clone());
                Ok(DragOutcome::Committed(batch))
            }
            Err(err) => {
                warn!(?err, batch_id = %resolution.batch_id, "batch move failed");
                Err(ManagerError::Remote(err))
            }
        };
        drop(settle);
        outcome
    }

    /// One whole gesture: pick up `batch_id` and drop it on the zone `dest_id`
    /// (a status column or another card).
    pub async fn attempt_drag_transition(&self, batch_id: BatchId, dest_id: &str) -> Result<DragOutcome, ManagerError> {
        if let Err(reason) = self.begin_drag(batch_id).await {
            info!(%reason, "drag ignored");
            return Ok(DragOutcome::Ignored(reason));
        }
        self.finish_drag(Some(DropTarget::from_id(dest_id))).await
    }

    /// Delete after the local guard; the remote service has the final say.
    #[instrument(skip(self), fields(batch_id = %id))]
    pub async fn attempt_delete(&self, id: &BatchId) -> Result<DeleteOutcome, ManagerError> {
        let batch = self.known(id).await?;
        if !can_delete(batch.status, batch.enrolled_count) {
            info!(status = %batch.status, enrolled = batch.enrolled_count, "delete rejected");
            return Ok(DeleteOutcome::Rejected {
                status: batch.status,
                enrolled_count: batch.enrolled_count,
            });
        }

        self.service.delete_batch(id).await.map_err(|err| {
            warn!(?err, "batch delete failed");
            ManagerError::Remote(err)
        })?;
        self.store.lock().await.apply_delete(id);
        info!("batch deleted");
        Ok(DeleteOutcome::Deleted)
    }

    /// Update arbitrary fields. A status change must be a legal transition.
    #[instrument(skip(self, patch), fields(batch_id = %id))]
    pub async fn update_batch(&self, id: &BatchId, patch: BatchPatch) -> Result<Batch, ManagerError> {
        let current = self.known(id).await?;
        if let Some(to) = patch.status {
            if to != current.status && !can_transition(current.status, to) {
                info!(from = %current.status, %to, "update rejected");
                return Err(ManagerError::InvalidTransition {
                    from: current.status,
                    to,
                });
            }
        }

        let batch = self.service.update_batch(id, &patch).await.map_err(|err| {
            warn!(?err, "batch update failed");
            ManagerError::Remote(err)
        })?;
        self.store.lock().await.apply_update(batch.clone());
        info!("batch updated");
        Ok(batch)
    }

    #[instrument(skip_all)]
    pub async fn create_batch(&self, fields: Map<String, Value>) -> Result<Batch, ManagerError> {
        let batch = self.service.create_batch(&fields).await.map_err(|err| {
            warn!(?err, "batch create failed");
            ManagerError::Remote(err)
        })?;
        info!(batch_id = %batch.id, status = %batch.status, "batch created");
        self.store.lock().await.apply_create(batch.clone());
        Ok(batch)
    }

    async fn known(&self, id: &BatchId) -> Result<Batch, ManagerError> {
        self.get(id)
            .await
            .ok_or_else(|| ManagerError::UnknownBatch(id.clone()))
    }
}
