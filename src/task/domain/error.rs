//! Error types for task domain validation, transitions, and parsing.

use super::{TaskId, TaskRunId, TaskRunStatus, TaskStatus, TaskType};
use thiserror::Error;

/// Errors returned while constructing or mutating domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// A required relational reference was not supplied.
    #[error("missing required reference: {0}")]
    MissingReference(&'static str),

    /// A relational reference is not a positive identifier.
    #[error("invalid {field} {value}, expected a positive integer")]
    InvalidReference {
        /// Name of the offending field.
        field: &'static str,
        /// Rejected value.
        value: i64,
    },

    /// The task name is empty after trimming.
    #[error("task name must not be empty")]
    EmptyTaskName,

    /// The task type requires a payload but none was given.
    #[error("task type {0} requires a payload")]
    MissingPayload(TaskType),

    /// The payload could not be decoded for the task type.
    #[error("invalid task payload: {0}")]
    InvalidPayload(String),

    /// A tenant migration named no target databases.
    #[error("tenant migration must target at least one database")]
    NoTargetDatabases,

    /// The requested status change is not in the transition table.
    #[error("task {task_id} cannot transition from {from} to {to}")]
    InvalidStatusTransition {
        /// Task whose status change was rejected.
        task_id: TaskId,
        /// Current task status.
        from: TaskStatus,
        /// Requested task status.
        to: TaskStatus,
    },

    /// The referenced run does not belong to the task.
    #[error("task run {run_id} does not belong to task {task_id}")]
    TaskRunNotFound {
        /// Task named by the patch.
        task_id: TaskId,
        /// Run named by the patch.
        run_id: TaskRunId,
    },

    /// The referenced run has already reached a terminal status.
    #[error("task run {run_id} of task {task_id} is already {status}")]
    TaskRunNotActive {
        /// Owning task.
        task_id: TaskId,
        /// Terminal run.
        run_id: TaskRunId,
        /// Status the run finished with.
        status: TaskRunStatus,
    },

    /// The requested run status change is not legal.
    #[error("task run {run_id} cannot transition from {from} to {to}")]
    InvalidTaskRunTransition {
        /// Run whose status change was rejected.
        run_id: TaskRunId,
        /// Current run status.
        from: TaskRunStatus,
        /// Requested run status.
        to: TaskRunStatus,
    },

    /// The cascaded run outcome differs from the one the task status implies.
    #[error("task {task_id} moving to {task_status} must close run {run_id} as {expected}, not {requested}")]
    MismatchedRunStatus {
        /// Owning task.
        task_id: TaskId,
        /// Run named by the patch.
        run_id: TaskRunId,
        /// Requested task status.
        task_status: TaskStatus,
        /// Run status matching `task_status`.
        expected: TaskRunStatus,
        /// Run status named by the patch.
        requested: TaskRunStatus,
    },

    /// Starting a new run would leave two runs active at once.
    #[error("task {task_id} already has active run {run_id}")]
    ActiveRunExists {
        /// Owning task.
        task_id: TaskId,
        /// Run that is still active.
        run_id: TaskRunId,
    },
}

impl TaskDomainError {
    /// Returns `true` for rejections of a status or run status change.
    #[must_use]
    pub const fn is_transition_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidStatusTransition { .. }
                | Self::TaskRunNotActive { .. }
                | Self::InvalidTaskRunTransition { .. }
                | Self::MismatchedRunStatus { .. }
                | Self::ActiveRunExists { .. }
        )
    }
}

/// Error returned while parsing task statuses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

/// Error returned while parsing task run statuses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task run status: {0}")]
pub struct ParseTaskRunStatusError(pub String);

/// Error returned while parsing task types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task type: {0}")]
pub struct ParseTaskTypeError(pub String);

/// Error returned while parsing task trigger conditions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task trigger condition: {0}")]
pub struct ParseTaskWhenError(pub String);
