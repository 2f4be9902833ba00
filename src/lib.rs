//! Batch lifecycle management over a remote batch service: forward-only status
//! moves driven by drag-and-drop, guarded deletion, and a short-lived read
//! cache invalidated on every mutation.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod drag;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod model;
pub mod store;

pub use error::ManagerError;
pub use manager::{BatchManager, DeleteOutcome, DragOutcome};
pub use model::{Batch, BatchId, BatchPatch, BatchStatus, StatusFilter};
