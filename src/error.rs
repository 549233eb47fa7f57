//! Error types for cell and observer operations.

use thiserror::Error;

/// Errors reported by cell writes, sessions, and observer runs.
///
/// Every variant is recoverable at the point of detection: the operation
/// that failed did nothing, and the caller's control flow is never unwound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReactError {
    /// A write was attempted on a cell from inside that cell's own active
    /// notification, on the same thread. The write is dropped and the prior
    /// value retained.
    #[error("cell written from inside its own change notification")]
    ReentrantMutation,

    /// An observer's effect, directly or transitively, attempted to re-run
    /// itself while already on the active stack. The nested run is skipped;
    /// the outer run completes normally.
    #[error("observer attempted to run itself while already running")]
    CircularObservation,

    /// The cell behind a handle has been dropped. Reads through dead handles
    /// yield `None`; writes yield this error.
    #[error("cell behind this handle has been dropped")]
    CellDropped,
}
