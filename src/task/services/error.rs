//! Service-level errors and their classification.

use crate::task::{
    domain::{
        ParseTaskRunStatusError, ParseTaskStatusError, ParseTaskTypeError, ParseTaskWhenError,
        TaskDomainError, TaskFilter, TaskId,
    },
    ports::TaskRepositoryError,
};
use thiserror::Error;

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// Domain validation or a transition check failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
    /// The requested task status is not recognized.
    #[error(transparent)]
    InvalidStatus(#[from] ParseTaskStatusError),
    /// The requested task run status is not recognized.
    #[error(transparent)]
    InvalidTaskRunStatus(#[from] ParseTaskRunStatusError),
    /// The requested task type is not recognized.
    #[error(transparent)]
    InvalidTaskType(#[from] ParseTaskTypeError),
    /// The requested trigger condition is not recognized.
    #[error(transparent)]
    InvalidWhen(#[from] ParseTaskWhenError),
    /// No task exists with the identifier, or it lies outside the requested
    /// workspace.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    /// A single-task lookup matched nothing.
    #[error("no task matches {0}")]
    NoMatch(TaskFilter),
    /// A single-task lookup matched more than one task.
    #[error("{count} tasks match {filter}, expected exactly one")]
    AmbiguousMatch {
        /// Filter used for the lookup.
        filter: TaskFilter,
        /// Number of matching tasks.
        count: usize,
    },
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Caller-facing classification of a [`TaskLifecycleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input.
    Validation,
    /// Lookup miss.
    NotFound,
    /// The status change is not allowed from the current state.
    InvalidTransition,
    /// A concurrent writer won; the caller should retry.
    Conflict,
    /// Infrastructure failure; the caller may retry.
    Transient,
}

impl TaskLifecycleError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(TaskDomainError::TaskRunNotFound { .. })
            | Self::TaskNotFound(_)
            | Self::NoMatch(_)
            | Self::AmbiguousMatch { .. }
            | Self::Repository(TaskRepositoryError::NotFound(_)) => ErrorKind::NotFound,
            Self::Domain(err) if err.is_transition_error() => ErrorKind::InvalidTransition,
            Self::Domain(_)
            | Self::InvalidStatus(_)
            | Self::InvalidTaskRunStatus(_)
            | Self::InvalidTaskType(_)
            | Self::InvalidWhen(_) => ErrorKind::Validation,
            Self::Repository(
                TaskRepositoryError::Conflict { .. } | TaskRepositoryError::DuplicateTask(_),
            ) => ErrorKind::Conflict,
            Self::Repository(TaskRepositoryError::Persistence(_)) => ErrorKind::Transient,
        }
    }

    /// Returns `true` when retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict | ErrorKind::Transient)
    }
}
