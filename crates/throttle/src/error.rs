//! Error types for admission and bounded execution.

use thiserror::Error;

/// Why an admission request did not produce a permit.
///
/// Neither variant is fatal to the gate: a canceled waiter simply leaves the
/// queue, and a disposed gate keeps accepting releases from permits that were
/// granted before shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    /// The caller's cancellation token fired while waiting.
    #[error("admission canceled by caller")]
    Canceled,

    /// The gate was shut down; no further admissions are possible.
    #[error("gate has been disposed")]
    Disposed,
}

/// Outcome of a single action run through a [`crate::TaskRunner`].
#[derive(Debug, Error)]
pub enum TaskError<E> {
    /// The run was canceled before or while this action executed.
    #[error("task canceled")]
    Canceled,

    /// The runner's gate was disposed before this action was admitted.
    #[error("task gate disposed before admission")]
    Disposed,

    /// The action itself returned an error.
    #[error("task failed: {0}")]
    Failed(E),
}

impl<E> TaskError<E> {
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }

    /// The action's own error, if that is what this is.
    pub fn into_failure(self) -> Option<E> {
        match self {
            TaskError::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl<E> From<GateError> for TaskError<E> {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Canceled => TaskError::Canceled,
            GateError::Disposed => TaskError::Disposed,
        }
    }
}
