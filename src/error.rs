//! Error type shared by every container and the timer.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by containers, cursors and the timer.
///
/// Every variant is reported before the operation has any observable
/// effect; a call that returns `Err` leaves its receiver unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Iteration
    // =========================================================================
    /// A cursor observed a structural change it did not make itself.
    ///
    /// This is a misuse detector for single-owner code, not a guarantee
    /// of thread safety.
    #[error("container was structurally modified during iteration")]
    ConcurrentModification,

    /// Operation is invalid in the receiver's current state.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    // =========================================================================
    // Arguments and views
    // =========================================================================
    /// Rejected argument (load factor, period, ...).
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// The view or container does not support this mutation.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    // =========================================================================
    // Timer
    // =========================================================================
    /// The timer was cancelled, explicitly or by a panicking task.
    #[error("timer already cancelled")]
    TimerCancelled,

    /// The task was already scheduled, executed or cancelled once.
    #[error("task already scheduled or cancelled")]
    TaskAlreadyScheduled,

    /// The OS refused to start the timer thread.
    #[error("failed to spawn timer thread: {0}")]
    ThreadSpawn(String),
}

impl Error {
    pub(crate) fn illegal_argument(msg: impl Into<String>) -> Self {
        Error::IllegalArgument(msg.into())
    }
}
