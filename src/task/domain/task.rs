//! Task aggregate root and the status state machine.

use super::{
    DatabaseId, PipelineId, PrincipalId, StageId, TaskDomainError, TaskId, TaskName, TaskPayload,
    TaskRun, TaskRunId, TaskRunStatus, TaskStatus, TaskWhen, TaskType, WorkspaceId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Where a task sits: tenant, pipeline, stage, and target database.
///
/// Placement is fixed when the task is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskPlacement {
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Owning pipeline.
    pub pipeline_id: PipelineId,
    /// Stage within the pipeline.
    pub stage_id: StageId,
    /// Database the task acts on.
    pub database_id: DatabaseId,
}

/// Parameter object for creating a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskData {
    /// Identifier minted for the task.
    pub id: TaskId,
    /// Workspace, pipeline, stage, and database placement.
    pub placement: TaskPlacement,
    /// Task name.
    pub name: TaskName,
    /// Task type and payload.
    pub payload: TaskPayload,
    /// Trigger condition.
    pub when: TaskWhen,
    /// Principal creating the task.
    pub creator_id: PrincipalId,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted placement.
    pub placement: TaskPlacement,
    /// Persisted name.
    pub name: TaskName,
    /// Persisted type and payload.
    pub payload: TaskPayload,
    /// Persisted trigger condition.
    pub when: TaskWhen,
    /// Persisted lifecycle status.
    pub status: TaskStatus,
    /// Persisted runs, oldest first.
    pub runs: Vec<TaskRun>,
    /// Persisted creator.
    pub creator_id: PrincipalId,
    /// Persisted latest updater.
    pub updater_id: PrincipalId,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Run status change carried alongside a task status patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRunUpdate {
    /// Run to update.
    pub run_id: TaskRunId,
    /// New run status.
    pub status: TaskRunStatus,
}

/// Requested status change for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// Target task status.
    pub status: TaskStatus,
    /// Principal applying the change.
    pub updater_id: PrincipalId,
    /// Optional run status to apply together with the task status.
    pub task_run: Option<TaskRunUpdate>,
}

impl StatusChange {
    /// Creates a change without a run cascade.
    #[must_use]
    pub const fn new(status: TaskStatus, updater_id: PrincipalId) -> Self {
        Self {
            status,
            updater_id,
            task_run: None,
        }
    }

    /// Adds a run status cascade.
    #[must_use]
    pub const fn with_task_run(mut self, update: TaskRunUpdate) -> Self {
        self.task_run = Some(update);
        self
    }
}

/// Result of applying a [`StatusChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The task was already in the requested status; only audit fields moved.
    Unchanged,
    /// The task moved between statuses.
    Applied {
        /// Previous status.
        from: TaskStatus,
        /// New status.
        to: TaskStatus,
    },
}

impl TransitionOutcome {
    /// Returns `true` when the status actually changed.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    placement: TaskPlacement,
    name: TaskName,
    payload: TaskPayload,
    when: TaskWhen,
    status: TaskStatus,
    runs: Vec<TaskRun>,
    creator_id: PrincipalId,
    updater_id: PrincipalId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new task in [`TaskStatus::Pending`].
    #[must_use]
    pub fn new(data: NewTaskData, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: data.id,
            placement: data.placement,
            name: data.name,
            payload: data.payload,
            when: data.when,
            status: TaskStatus::Pending,
            runs: Vec::new(),
            creator_id: data.creator_id,
            updater_id: data.creator_id,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            placement: data.placement,
            name: data.name,
            payload: data.payload,
            when: data.when,
            status: data.status,
            runs: data.runs,
            creator_id: data.creator_id,
            updater_id: data.updater_id,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the full placement of the task.
    #[must_use]
    pub const fn placement(&self) -> TaskPlacement {
        self.placement
    }

    /// Returns the owning workspace.
    #[must_use]
    pub const fn workspace_id(&self) -> WorkspaceId {
        self.placement.workspace_id
    }

    /// Returns the owning pipeline.
    #[must_use]
    pub const fn pipeline_id(&self) -> PipelineId {
        self.placement.pipeline_id
    }

    /// Returns the owning stage.
    #[must_use]
    pub const fn stage_id(&self) -> StageId {
        self.placement.stage_id
    }

    /// Returns the target database.
    #[must_use]
    pub const fn database_id(&self) -> DatabaseId {
        self.placement.database_id
    }

    /// Returns the task name.
    #[must_use]
    pub const fn name(&self) -> &TaskName {
        &self.name
    }

    /// Returns the task type.
    #[must_use]
    pub const fn task_type(&self) -> TaskType {
        self.payload.task_type()
    }

    /// Returns the task payload.
    #[must_use]
    pub const fn payload(&self) -> &TaskPayload {
        &self.payload
    }

    /// Returns the trigger condition.
    #[must_use]
    pub const fn when(&self) -> TaskWhen {
        self.when
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns every run, oldest first.
    #[must_use]
    pub fn runs(&self) -> &[TaskRun] {
        &self.runs
    }

    /// Returns the run that has not yet finished, if any.
    #[must_use]
    pub fn active_run(&self) -> Option<&TaskRun> {
        self.runs.iter().find(|run| run.is_active())
    }

    /// Returns the principal that created the task.
    #[must_use]
    pub const fn creator_id(&self) -> PrincipalId {
        self.creator_id
    }

    /// Returns the principal that last updated the task.
    #[must_use]
    pub const fn updater_id(&self) -> PrincipalId {
        self.updater_id
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns `true` when the pipeline advancer may start this task.
    #[must_use]
    pub fn is_auto_activatable(&self) -> bool {
        self.status == TaskStatus::Pending && self.when == TaskWhen::OnSuccess
    }

    /// Applies a status change, cascading to the affected run.
    ///
    /// Re-applying the current status only refreshes the updater and
    /// timestamp; any run cascade is ignored. Entering
    /// [`TaskStatus::Running`] appends a fresh run whose identifier comes
    /// from `next_run_id`. Leaving `RUNNING` without an explicit cascade
    /// closes the active run with the matching run status. All checks run
    /// before any field changes, so a rejected change leaves the task
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStatusTransition`] for a change
    /// outside the transition table, [`TaskDomainError::TaskRunNotFound`]
    /// when the cascaded run is not one of this task's runs,
    /// [`TaskDomainError::TaskRunNotActive`] or
    /// [`TaskDomainError::InvalidTaskRunTransition`] when the run cannot
    /// move to the requested status,
    /// [`TaskDomainError::MismatchedRunStatus`] when the run outcome differs
    /// from the task's new status, and
    /// [`TaskDomainError::ActiveRunExists`] if a run would be started while
    /// another is active.
    pub fn transition_to(
        &mut self,
        change: StatusChange,
        next_run_id: impl FnOnce() -> TaskRunId,
        clock: &impl Clock,
    ) -> Result<TransitionOutcome, TaskDomainError> {
        let from = self.status;
        let to = change.status;
        if from == to {
            self.touch(change.updater_id, clock);
            return Ok(TransitionOutcome::Unchanged);
        }
        if !from.can_transition_to(to) {
            return Err(TaskDomainError::InvalidStatusTransition {
                task_id: self.id,
                from,
                to,
            });
        }

        let run_update = match change.task_run {
            Some(update) => Some(self.validate_run_update(update, to)?),
            None => self.implicit_run_close(to),
        };
        if to == TaskStatus::Running {
            self.ensure_no_other_active_run(run_update.map(|update| update.run_id))?;
        }

        if let Some(update) = run_update {
            if let Some(run) = self.runs.iter_mut().find(|run| run.id() == update.run_id) {
                run.finish(update.status, change.updater_id, clock);
            }
        }
        if to == TaskStatus::Running {
            let attempt = u32::try_from(self.runs.len() + 1).unwrap_or(u32::MAX);
            self.runs
                .push(TaskRun::start(next_run_id(), attempt, change.updater_id, clock));
        }
        self.status = to;
        self.touch(change.updater_id, clock);
        Ok(TransitionOutcome::Applied { from, to })
    }

    fn validate_run_update(
        &self,
        update: TaskRunUpdate,
        to: TaskStatus,
    ) -> Result<TaskRunUpdate, TaskDomainError> {
        let run = self
            .runs
            .iter()
            .find(|run| run.id() == update.run_id)
            .ok_or(TaskDomainError::TaskRunNotFound {
                task_id: self.id,
                run_id: update.run_id,
            })?;
        if !run.is_active() {
            return Err(TaskDomainError::TaskRunNotActive {
                task_id: self.id,
                run_id: run.id(),
                status: run.status(),
            });
        }
        if !run.status().can_transition_to(update.status) {
            return Err(TaskDomainError::InvalidTaskRunTransition {
                run_id: run.id(),
                from: run.status(),
                to: update.status,
            });
        }
        if let Some(expected) =
            TaskRunStatus::closing(to).filter(|expected| *expected != update.status)
        {
            return Err(TaskDomainError::MismatchedRunStatus {
                task_id: self.id,
                run_id: run.id(),
                task_status: to,
                expected,
                requested: update.status,
            });
        }
        Ok(update)
    }

    fn implicit_run_close(&self, to: TaskStatus) -> Option<TaskRunUpdate> {
        let status = TaskRunStatus::closing(to)?;
        self.active_run().map(|run| TaskRunUpdate {
            run_id: run.id(),
            status,
        })
    }

    fn ensure_no_other_active_run(
        &self,
        closing: Option<TaskRunId>,
    ) -> Result<(), TaskDomainError> {
        match self
            .runs
            .iter()
            .find(|run| run.is_active() && Some(run.id()) != closing)
        {
            Some(run) => Err(TaskDomainError::ActiveRunExists {
                task_id: self.id,
                run_id: run.id(),
            }),
            None => Ok(()),
        }
    }

    /// Updates audit fields to the given updater and current clock time.
    fn touch(&mut self, updater_id: PrincipalId, clock: &impl Clock) {
        self.updater_id = updater_id;
        self.updated_at = clock.utc();
    }
}
