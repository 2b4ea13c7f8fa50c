//! Repository port for task persistence, lookup, and atomic status updates.

use crate::task::domain::{PipelineId, StageId, Task, TaskFilter, TaskId, TaskStatus};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Unit of work executed atomically by [`TaskRepository::transaction`].
///
/// Writes become visible to other callers only when the unit of work
/// returns `Ok`. Reads observe the transaction's own pending writes.
pub trait TaskTransaction {
    /// Finds a task by identifier without locking it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the lookup fails.
    fn find_by_id(&mut self, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Locks and returns every task in a stage, ordered by task identifier.
    ///
    /// The lock is held until the transaction ends, so two transactions
    /// touching the same stage run one after the other. Callers lock stages
    /// in ascending stage order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the lookup fails.
    fn lock_stage(
        &mut self,
        pipeline_id: PipelineId,
        stage_id: StageId,
    ) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns the distinct stages of a pipeline in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the lookup fails.
    fn pipeline_stages(&mut self, pipeline_id: PipelineId) -> TaskRepositoryResult<Vec<StageId>>;

    /// Inserts a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the identifier is
    /// already taken.
    fn insert(&mut self, task: &Task) -> TaskRepositoryResult<()>;

    /// Saves a task and its runs if its stored status still equals
    /// `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not
    /// exist and [`TaskRepositoryError::Conflict`] when the stored status
    /// differs from `expected`.
    fn save(&mut self, task: &Task, expected: TaskStatus) -> TaskRepositoryResult<()>;
}

/// Task persistence contract.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the task ID already
    /// exists.
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Finds a task by identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Returns every task matching the filter, ordered by task identifier.
    async fn find(&self, filter: &TaskFilter) -> TaskRepositoryResult<Vec<Task>>;

    /// Runs `work` atomically.
    ///
    /// Either every write made through the [`TaskTransaction`] is persisted
    /// or none is. Infrastructure failures are converted into `E` through
    /// [`TaskRepositoryError`].
    async fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn TaskTransaction) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<TaskRepositoryError> + Send + 'static;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The stored status changed since it was read.
    #[error("task {task_id} was modified concurrently; expected status {expected}")]
    Conflict {
        /// Task whose save was rejected.
        task_id: TaskId,
        /// Status the writer based its change on.
        expected: TaskStatus,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
