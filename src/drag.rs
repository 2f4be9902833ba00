//! Drag-and-drop gesture tracking for the status board.
//!
//! One gesture at a time:
//!
//! ```text
//!   Idle → Dragging → (resolve on drop) → Committing → Idle
//!                          ↓
//!                    ignored → Idle
//! ```
//!
//! The controller never writes batch data. On an accepted drop it hands back a
//! [`DropDecision::Commit`] and waits in `Committing` until [`DragController::settle`].

use std::fmt;

use tracing::debug;

use crate::lifecycle::can_transition;
use crate::model::{BatchId, BatchStatus};
use crate::store::Board;

/// Where a card was dropped: a status column, or another card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Column(BatchStatus),
    Card(BatchId),
}

impl DropTarget {
    /// Interpret a raw drop-zone id. Status names map to columns, anything
    /// else is taken as a card id.
    pub fn from_id(id: &str) -> Self {
        match id.parse::<BatchStatus>() {
            Ok(status) => DropTarget::Column(status),
            Err(_) => DropTarget::Card(BatchId::new(id)),
        }
    }

    fn column(&self, board: &Board) -> Option<BatchStatus> {
        match self {
            DropTarget::Column(status) => Some(*status),
            DropTarget::Card(id) => board.status_of(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Dragging {
        batch_id: BatchId,
        over: Option<DropTarget>,
    },
    Committing {
        batch_id: BatchId,
        from: BatchStatus,
        to: BatchStatus,
    },
}

/// Source and destination of a drop, once both are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub batch_id: BatchId,
    pub source: BatchStatus,
    pub dest: BatchStatus,
}

/// Why a gesture ended without a remote update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A previous gesture is still committing.
    Busy,
    NotDragging,
    /// Dragged batch is gone from the board, or the target is unknown.
    Unresolved,
    SameColumn,
    IllegalMove { from: BatchStatus, to: BatchStatus },
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::Busy => f.write_str("another move is still being saved"),
            IgnoreReason::NotDragging => f.write_str("no drag in progress"),
            IgnoreReason::Unresolved => f.write_str("drop target or batch not found"),
            IgnoreReason::SameColumn => f.write_str("dropped on its own column"),
            IgnoreReason::IllegalMove { from, to } => write!(f, "cannot move from {from} to {to}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropDecision {
    Commit(Resolution),
    Ignored(IgnoreReason),
}

#[derive(Debug)]
pub struct DragController {
    state: GestureState,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new()
    }
}

impl DragController {
    pub fn new() -> Self {
        Self {
            state: GestureState::Idle,
        }
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    /// Start dragging `batch_id`. Picking up while already dragging restarts
    /// the gesture; picking up while a commit is pending is refused.
    pub fn pick_up(&mut self, batch_id: BatchId) -> Result<(), IgnoreReason> {
        if matches!(self.state, GestureState::Committing { .. }) {
            return Err(IgnoreReason::Busy);
        }
        debug!(batch_id = %batch_id, "drag started");
        self.state = GestureState::Dragging { batch_id, over: None };
        Ok(())
    }

    /// Track the hovered target. Returns whether dropping there would be
    /// accepted, for highlighting.
    pub fn hover(&mut self, target: DropTarget, board: &Board) -> bool {
        let GestureState::Dragging { batch_id, over } = &mut self.state else {
            return false;
        };
        let accepted = match (board.status_of(batch_id), target.column(board)) {
            (Some(source), Some(dest)) => can_transition(source, dest),
            _ => false,
        };
        *over = Some(target);
        accepted
    }

    /// Finish the gesture. `None` means the card was dropped outside any zone.
    pub fn drop_on(&mut self, target: Option<DropTarget>, board: &Board) -> DropDecision {
        let batch_id = match std::mem::replace(&mut self.state, GestureState::Idle) {
            GestureState::Dragging { batch_id, .. } => batch_id,
            committing @ GestureState::Committing { .. } => {
                self.state = committing;
                return DropDecision::Ignored(IgnoreReason::Busy);
            }
            GestureState::Idle => return DropDecision::Ignored(IgnoreReason::NotDragging),
        };

        let Some(resolution) = resolve(batch_id, target.as_ref(), board) else {
            debug!("drop unresolved");
            return DropDecision::Ignored(IgnoreReason::Unresolved);
        };

        let Resolution { source, dest, .. } = resolution;
        if source == dest {
            return DropDecision::Ignored(IgnoreReason::SameColumn);
        }
        if !can_transition(source, dest) {
            debug!(batch_id = %resolution.batch_id, %source, %dest, "drop rejected");
            return DropDecision::Ignored(IgnoreReason::IllegalMove { from: source, to: dest });
        }

        self.state = GestureState::Committing {
            batch_id: resolution.batch_id.clone(),
            from: source,
            to: dest,
        };
        DropDecision::Commit(resolution)
    }

    /// Abandon a drag in progress.
    pub fn cancel(&mut self) {
        if matches!(self.state, GestureState::Dragging { .. }) {
            self.state = GestureState::Idle;
        }
    }

    /// Mark the pending commit finished, whatever its outcome.
    pub fn settle(&mut self) {
        if matches!(self.state, GestureState::Committing { .. }) {
            self.state = GestureState::Idle;
        }
    }
}

fn resolve(batch_id: BatchId, target: Option<&DropTarget>, board: &Board) -> Option<Resolution> {
    let source = board.status_of(&batch_id)?;
    let dest = target?.column(board)?;
    Some(Resolution {
        batch_id,
        source,
        dest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Batch;
    use BatchStatus::*;

    fn board() -> Board {
        Board::from_batches(vec![
            Batch::new(1, Upcoming, 0),
            Batch::new(2, Upcoming, 5),
            Batch::new(3, Running, 0),
            Batch::new(4, Closed, 40),
        ])
    }

    fn drag(ctl: &mut DragController, id: i64, target: DropTarget) -> DropDecision {
        ctl.pick_up(BatchId::from(id)).unwrap();
        ctl.drop_on(Some(target), &board())
    }

    #[test]
    fn forward_move_commits() {
        let mut ctl = DragController::new();
        let decision = drag(&mut ctl, 1, DropTarget::Column(Running));
        assert_eq!(
            decision,
            DropDecision::Commit(Resolution {
                batch_id: BatchId::from(1),
                source: Upcoming,
                dest: Running,
            })
        );
        assert!(matches!(ctl.state(), GestureState::Committing { to: Running, .. }));

        ctl.settle();
        assert_eq!(ctl.state(), &GestureState::Idle);
    }

    #[test]
    fn skip_move_is_ignored() {
        let mut ctl = DragController::new();
        let decision = drag(&mut ctl, 2, DropTarget::Column(Closed));
        assert_eq!(
            decision,
            DropDecision::Ignored(IgnoreReason::IllegalMove { from: Upcoming, to: Closed })
        );
        assert_eq!(ctl.state(), &GestureState::Idle);
    }

    #[test]
    fn backward_and_same_column_are_ignored() {
        let mut ctl = DragController::new();
        assert!(matches!(
            drag(&mut ctl, 4, DropTarget::Column(Running)),
            DropDecision::Ignored(IgnoreReason::IllegalMove { .. })
        ));
        assert_eq!(
            drag(&mut ctl, 3, DropTarget::Column(Running)),
            DropDecision::Ignored(IgnoreReason::SameColumn)
        );
    }

    #[test]
    fn dropping_on_a_card_uses_its_column() {
        let mut ctl = DragController::new();
        let decision = drag(&mut ctl, 3, DropTarget::Card(BatchId::from(4)));
        assert!(matches!(decision, DropDecision::Commit(Resolution { dest: Closed, .. })));
    }

    #[test]
    fn unknown_target_or_batch_is_unresolved() {
        let mut ctl = DragController::new();
        assert_eq!(
            drag(&mut ctl, 1, DropTarget::Card(BatchId::from(99))),
            DropDecision::Ignored(IgnoreReason::Unresolved)
        );
        assert_eq!(
            drag(&mut ctl, 99, DropTarget::Column(Running)),
            DropDecision::Ignored(IgnoreReason::Unresolved)
        );
        ctl.pick_up(BatchId::from(1)).unwrap();
        assert_eq!(ctl.drop_on(None, &board()), DropDecision::Ignored(IgnoreReason::Unresolved));
        assert_eq!(ctl.state(), &GestureState::Idle);
    }

    #[test]
    fn pick_up_is_refused_while_committing() {
        let mut ctl = DragController::new();
        drag(&mut ctl, 1, DropTarget::Column(Running));
        assert_eq!(ctl.pick_up(BatchId::from(3)), Err(IgnoreReason::Busy));
        assert_eq!(
            ctl.drop_on(Some(DropTarget::Column(Closed)), &board()),
            DropDecision::Ignored(IgnoreReason::Busy)
        );
        assert!(matches!(ctl.state(), GestureState::Committing { .. }));
    }

    #[test]
    fn hover_reports_legal_columns() {
        let mut ctl = DragController::new();
        let board = board();
        assert!(!ctl.hover(DropTarget::Column(Running), &board));

        ctl.pick_up(BatchId::from(1)).unwrap();
        assert!(ctl.hover(DropTarget::Column(Running), &board));
        assert!(!ctl.hover(DropTarget::Column(Closed), &board));
        assert!(matches!(
            ctl.state(),
            GestureState::Dragging { over: Some(DropTarget::Column(Closed)), .. }
        ));

        ctl.cancel();
        assert_eq!(ctl.state(), &GestureState::Idle);
    }

    #[test]
    fn raw_drop_ids() {
        assert_eq!(DropTarget::from_id("Closed"), DropTarget::Column(Closed));
        assert_eq!(DropTarget::from_id("42"), DropTarget::Card(BatchId::from(42)));
    }
}
