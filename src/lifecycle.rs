//! Batch lifecycle rules.
//!
//! ```text
//!   Upcoming → Running → Closed
//! ```
//!
//! Moves are forward-only and single-step. `Closed` is terminal. Both checks
//! here are pure and run before any remote request is issued.

use crate::model::BatchStatus;

impl BatchStatus {
    /// The only status this one may move to, if any.
    pub fn next(&self) -> Option<BatchStatus> {
        match self {
            BatchStatus::Upcoming => Some(BatchStatus::Running),
            BatchStatus::Running => Some(BatchStatus::Closed),
            BatchStatus::Closed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

/// Whether a batch in `current` may be moved to `requested`.
///
/// Same-status, backward and skipping moves are all rejected.
pub fn can_transition(current: BatchStatus, requested: BatchStatus) -> bool {
    current.next() == Some(requested)
}

/// Whether a batch may be deleted.
///
/// - `Closed`: always, whatever the enrolment.
/// - `Upcoming`: only with nobody enrolled.
/// - `Running`: never.
pub fn can_delete(status: BatchStatus, enrolled_count: u32) -> bool {
    match status {
        BatchStatus::Closed => true,
        BatchStatus::Upcoming => enrolled_count == 0,
        BatchStatus::Running => false,
    }
}
