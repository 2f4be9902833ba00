//! In-memory batch records and the per-scope read cache.
//!
//! The store is only ever written from completion handlers of successful remote
//! calls. Every mutation clears the whole cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::model::{Batch, BatchId, BatchStatus, StatusFilter};

pub struct BatchStore {
    records: Vec<Batch>,
    cache: TtlCache<StatusFilter, Vec<Batch>>,
}

impl BatchStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Vec::new(),
            cache: TtlCache::new(clock),
        }
    }

    pub fn cached(&self, filter: StatusFilter) -> Option<Vec<Batch>> {
        self.cache.fresh(&filter).cloned()
    }

    /// Cache generation to hand back to [`BatchStore::record_fetch`].
    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }

    /// Record a completed fetch. Returns `false` and leaves the store untouched
    /// when a mutation landed after the fetch was issued.
    pub fn record_fetch(&mut self, filter: StatusFilter, batches: Vec<Batch>, generation: u64) -> bool {
        if generation != self.cache.generation() {
            return false;
        }
        match filter {
            StatusFilter::All => self.records = batches.clone(),
            StatusFilter::Only(status) => {
                // The response is authoritative for this status only. A known
                // record that moved elsewhere on the server drops out here and
                // reappears when its new status (or `All`) is fetched.
                self.records.retain(|b| b.status != status);
                for batch in &batches {
                    self.upsert(batch.clone());
                }
            }
        }
        self.cache.insert_if_current(filter, batches, generation)
    }

    pub fn apply_update(&mut self, batch: Batch) {
        self.upsert(batch);
        self.cache.clear();
    }

    pub fn apply_create(&mut self, batch: Batch) {
        self.upsert(batch);
        self.cache.clear();
    }

    pub fn apply_delete(&mut self, id: &BatchId) {
        self.records.retain(|b| &b.id != id);
        self.cache.clear();
    }

    pub fn get(&self, id: &BatchId) -> Option<&Batch> {
        self.records.iter().find(|b| &b.id == id)
    }

    pub fn records(&self) -> &[Batch] {
        &self.records
    }

    pub fn cached_scopes(&self) -> usize {
        self.cache.len()
    }

    pub fn board(&self) -> Board {
        Board::from_batches(self.records.iter().cloned())
    }

    fn upsert(&mut self, batch: Batch) {
        match self.records.iter_mut().find(|b| b.id == batch.id) {
            Some(slot) => *slot = batch,
            None => self.records.push(batch),
        }
    }
}

/// Known batches grouped into one column per status.
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    columns: BTreeMap<BatchStatus, Vec<Batch>>,
}

impl Board {
    pub fn from_batches(batches: impl IntoIterator<Item = Batch>) -> Self {
        let mut columns: BTreeMap<BatchStatus, Vec<Batch>> =
            BatchStatus::ALL.into_iter().map(|s| (s, Vec::new())).collect();
        for batch in batches {
            columns.entry(batch.status).or_default().push(batch);
        }
        Self { columns }
    }

    pub fn column(&self, status: BatchStatus) -> &[Batch] {
        self.columns.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn columns(&self) -> impl Iterator<Item = (BatchStatus, &[Batch])> {
        self.columns.iter().map(|(s, v)| (*s, v.as_slice()))
    }

    /// Column currently holding `id`, if any.
    pub fn status_of(&self, id: &BatchId) -> Option<BatchStatus> {
        self.columns
            .iter()
            .find(|(_, batches)| batches.iter().any(|b| &b.id == id))
            .map(|(status, _)| *status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    fn store() -> BatchStore {
        BatchStore::new(Arc::new(SystemClock))
    }

    #[test]
    fn unfiltered_fetch_replaces_records() {
        let mut store = store();
        let generation = store.generation();
        store.record_fetch(StatusFilter::All, vec![Batch::new(1, BatchStatus::Upcoming, 0)], generation);
        store.record_fetch(StatusFilter::All, vec![Batch::new(2, BatchStatus::Running, 3)], generation);

        assert!(store.get(&BatchId::from(1)).is_none());
        assert_eq!(store.records().len(), 1);
        assert!(store.cached(StatusFilter::All).is_some());
    }

    #[test]
    fn scoped_fetch_only_touches_its_status() {
        let mut store = store();
        let generation = store.generation();
        store.record_fetch(
            StatusFilter::All,
            vec![
                Batch::new(1, BatchStatus::Upcoming, 0),
                Batch::new(2, BatchStatus::Running, 0),
                Batch::new(3, BatchStatus::Running, 0),
            ],
            generation,
        );
        store.record_fetch(
            StatusFilter::Only(BatchStatus::Running),
            vec![Batch::new(3, BatchStatus::Running, 8)],
            generation,
        );

        let board = store.board();
        assert_eq!(board.column(BatchStatus::Upcoming).len(), 1);
        assert_eq!(board.column(BatchStatus::Running).len(), 1);
        assert_eq!(board.column(BatchStatus::Running)[0].enrolled_count, 8);
        assert_eq!(store.cached_scopes(), 2);
    }

    #[test]
    fn record_moved_on_server_returns_with_its_new_bucket() {
        let mut store = store();
        let generation = store.generation();
        store.record_fetch(
            StatusFilter::All,
            vec![Batch::new(1, BatchStatus::Upcoming, 0), Batch::new(2, BatchStatus::Upcoming, 0)],
            generation,
        );

        // Batch 1 went Running on the server; the Upcoming list no longer has it.
        store.record_fetch(
            StatusFilter::Only(BatchStatus::Upcoming),
            vec![Batch::new(2, BatchStatus::Upcoming, 0)],
            generation,
        );
        assert!(store.get(&BatchId::from(1)).is_none());
        assert_eq!(store.board().status_of(&BatchId::from(1)), None);

        store.record_fetch(
            StatusFilter::Only(BatchStatus::Running),
            vec![Batch::new(1, BatchStatus::Running, 0)],
            generation,
        );
        assert_eq!(store.board().status_of(&BatchId::from(1)), Some(BatchStatus::Running));
    }

    #[test]
    fn mutation_clears_cache_and_rejects_older_fetch() {
        let mut store = store();
        let generation = store.generation();
        store.record_fetch(StatusFilter::All, vec![Batch::new(1, BatchStatus::Upcoming, 0)], generation);

        store.apply_update(Batch::new(1, BatchStatus::Running, 0));
        assert_eq!(store.cached_scopes(), 0);

        let landed = store.record_fetch(
            StatusFilter::All,
            vec![Batch::new(1, BatchStatus::Upcoming, 0)],
            generation,
        );
        assert!(!landed);
        assert_eq!(store.get(&BatchId::from(1)).unwrap().status, BatchStatus::Running);
        assert!(store.cached(StatusFilter::All).is_none());
    }

    #[test]
    fn board_locates_batches() {
        let board = Board::from_batches(vec![
            Batch::new(1, BatchStatus::Upcoming, 0),
            Batch::new(2, BatchStatus::Closed, 0),
        ]);
        assert_eq!(board.status_of(&BatchId::from(2)), Some(BatchStatus::Closed));
        assert_eq!(board.status_of(&BatchId::from(9)), None);
        assert!(board.column(BatchStatus::Running).is_empty());
        assert_eq!(board.columns().count(), 3);
    }
}
