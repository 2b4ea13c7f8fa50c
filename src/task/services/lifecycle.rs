//! Service layer for task creation, lookup, and status patching.

use super::{
    PipelineAdvancer, TaskLifecycleError, TaskLifecycleResult, VersionGenerator,
    earlier_stages_passed,
};
use crate::task::{
    domain::{
        DatabaseId, NewTaskData, PipelineId, PrincipalId, SchemaUpdatePayload, StageId,
        StatusChange, Task, TaskDomainError, TaskFilter, TaskId, TaskName, TaskPayload,
        TaskPlacement, TaskRunId, TaskRunStatus, TaskRunUpdate, TaskStatus, TaskType, TaskWhen,
        WorkspaceId,
    },
    ports::{IdSource, TaskRepository, TaskTransaction},
};
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Relational references shared by the creation requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PlacementRefs {
    workspace_id: Option<i64>,
    pipeline_id: Option<i64>,
    stage_id: Option<i64>,
}

impl PlacementRefs {
    fn resolve(self, database_id: Option<i64>) -> Result<TaskPlacement, TaskDomainError> {
        let workspace_id = self
            .workspace_id
            .ok_or(TaskDomainError::MissingReference("workspace_id"))?;
        let pipeline_id = self
            .pipeline_id
            .ok_or(TaskDomainError::MissingReference("pipeline_id"))?;
        let stage_id = self
            .stage_id
            .ok_or(TaskDomainError::MissingReference("stage_id"))?;
        let database_id = database_id.ok_or(TaskDomainError::MissingReference("database_id"))?;
        Ok(TaskPlacement {
            workspace_id: WorkspaceId::new(workspace_id)?,
            pipeline_id: PipelineId::new(pipeline_id)?,
            stage_id: StageId::new(stage_id)?,
            database_id: DatabaseId::new(database_id)?,
        })
    }
}

/// Request payload for creating a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    name: String,
    creator_id: i64,
    refs: PlacementRefs,
    database_id: Option<i64>,
    task_type: String,
    when: String,
    payload: Option<Vec<u8>>,
}

impl CreateTaskRequest {
    /// Creates a general `ON_SUCCESS` task request. Placement must be set
    /// through the builder methods.
    #[must_use]
    pub fn new(name: impl Into<String>, creator_id: i64) -> Self {
        Self {
            name: name.into(),
            creator_id,
            refs: PlacementRefs::default(),
            database_id: None,
            task_type: TaskType::General.as_str().to_owned(),
            when: TaskWhen::OnSuccess.as_str().to_owned(),
            payload: None,
        }
    }

    /// Sets the owning workspace.
    #[must_use]
    pub const fn in_workspace(mut self, workspace_id: i64) -> Self {
        self.refs.workspace_id = Some(workspace_id);
        self
    }

    /// Sets the owning pipeline.
    #[must_use]
    pub const fn in_pipeline(mut self, pipeline_id: i64) -> Self {
        self.refs.pipeline_id = Some(pipeline_id);
        self
    }

    /// Sets the owning stage.
    #[must_use]
    pub const fn in_stage(mut self, stage_id: i64) -> Self {
        self.refs.stage_id = Some(stage_id);
        self
    }

    /// Sets the target database.
    #[must_use]
    pub const fn on_database(mut self, database_id: i64) -> Self {
        self.database_id = Some(database_id);
        self
    }

    /// Sets the task type (for example `bb.task.database.schema.update`).
    #[must_use]
    pub fn with_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = task_type.into();
        self
    }

    /// Sets the trigger condition (`ON_SUCCESS` or `MANUAL`).
    #[must_use]
    pub fn with_when(mut self, when: impl Into<String>) -> Self {
        self.when = when.into();
        self
    }

    /// Sets the raw JSON payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

/// Request payload for one schema change applied to several databases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTenantMigrationRequest {
    name: String,
    creator_id: i64,
    refs: PlacementRefs,
    database_ids: Vec<i64>,
    sql: String,
    rollback_sql: String,
    when: String,
}

impl CreateTenantMigrationRequest {
    /// Creates an `ON_SUCCESS` migration request with forward and rollback
    /// SQL.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        creator_id: i64,
        sql: impl Into<String>,
        rollback_sql: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            creator_id,
            refs: PlacementRefs::default(),
            database_ids: Vec::new(),
            sql: sql.into(),
            rollback_sql: rollback_sql.into(),
            when: TaskWhen::OnSuccess.as_str().to_owned(),
        }
    }

    /// Sets the owning workspace.
    #[must_use]
    pub const fn in_workspace(mut self, workspace_id: i64) -> Self {
        self.refs.workspace_id = Some(workspace_id);
        self
    }

    /// Sets the owning pipeline.
    #[must_use]
    pub const fn in_pipeline(mut self, pipeline_id: i64) -> Self {
        self.refs.pipeline_id = Some(pipeline_id);
        self
    }

    /// Sets the owning stage.
    #[must_use]
    pub const fn in_stage(mut self, stage_id: i64) -> Self {
        self.refs.stage_id = Some(stage_id);
        self
    }

    /// Sets the target databases.
    #[must_use]
    pub fn on_databases(mut self, database_ids: impl IntoIterator<Item = i64>) -> Self {
        self.database_ids = database_ids.into_iter().collect();
        self
    }

    /// Sets the trigger condition (`ON_SUCCESS` or `MANUAL`).
    #[must_use]
    pub fn with_when(mut self, when: impl Into<String>) -> Self {
        self.when = when.into();
        self
    }
}

/// Request payload for changing a task status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchTaskStatusRequest {
    task_id: TaskId,
    status: String,
    updater_id: i64,
    workspace_id: Option<i64>,
    task_run: Option<(TaskRunId, String)>,
    comment: Option<String>,
}

impl PatchTaskStatusRequest {
    /// Creates a request to move `task_id` to `status`.
    #[must_use]
    pub fn new(task_id: TaskId, status: impl Into<String>, updater_id: i64) -> Self {
        Self {
            task_id,
            status: status.into(),
            updater_id,
            workspace_id: None,
            task_run: None,
            comment: None,
        }
    }

    /// Requires the task to belong to `workspace_id`.
    #[must_use]
    pub const fn in_workspace(mut self, workspace_id: i64) -> Self {
        self.workspace_id = Some(workspace_id);
        self
    }

    /// Applies `run_status` to `run_id` together with the task status.
    #[must_use]
    pub fn with_task_run(mut self, run_id: TaskRunId, run_status: impl Into<String>) -> Self {
        self.task_run = Some((run_id, run_status.into()));
        self
    }

    /// Attaches a free-form comment, recorded in the service log.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Validated form of [`PatchTaskStatusRequest`].
#[derive(Debug, Clone, Copy)]
struct StatusPatch {
    task_id: TaskId,
    workspace_id: Option<WorkspaceId>,
    change: StatusChange,
}

/// Task lifecycle orchestration service.
#[derive(Clone)]
pub struct TaskLifecycleService<R, C, I>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
    I: IdSource,
{
    repository: Arc<R>,
    clock: Arc<C>,
    ids: Arc<I>,
    versions: VersionGenerator<C>,
}

impl<R, C, I> TaskLifecycleService<R, C, I>
where
    R: TaskRepository,
    C: Clock + Send + Sync + 'static,
    I: IdSource + 'static,
{
    /// Creates a new task lifecycle service.
    #[must_use]
    pub fn new(repository: Arc<R>, clock: Arc<C>, ids: Arc<I>) -> Self {
        let versions = VersionGenerator::new(Arc::clone(&clock));
        Self {
            repository,
            clock,
            ids,
            versions,
        }
    }

    /// Creates a task in `PENDING`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] when a relational reference is
    /// missing or invalid, the name is blank, or the payload does not match
    /// the task type; parse errors for unknown type or trigger strings; and
    /// [`TaskLifecycleError::Repository`] when persistence fails.
    pub async fn create_task(&self, request: CreateTaskRequest) -> TaskLifecycleResult<Task> {
        let CreateTaskRequest {
            name,
            creator_id,
            refs,
            database_id,
            task_type,
            when,
            payload,
        } = request;

        let placement = refs.resolve(database_id)?;
        let task_type = TaskType::try_from(task_type.as_str())?;
        let data = NewTaskData {
            id: TaskId::from_uuid(self.ids.next_uuid()),
            placement,
            name: TaskName::new(name)?,
            payload: TaskPayload::decode(task_type, payload.as_deref())?,
            when: TaskWhen::try_from(when.as_str())?,
            creator_id: PrincipalId::new(creator_id)?,
        };

        let task = Task::new(data, &*self.clock);
        self.repository.store(&task).await?;
        info!(
            task_id = %task.id(),
            pipeline_id = %task.pipeline_id(),
            stage_id = %task.stage_id(),
            task_type = %task.task_type(),
            "created task"
        );
        Ok(task)
    }

    /// Creates one schema update task per target database, all stamped with
    /// the same migration version.
    ///
    /// The tasks are stored atomically: either all exist afterwards or none.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] for missing or invalid
    /// references, a blank name, or an empty database list, and
    /// [`TaskLifecycleError::Repository`] when persistence fails.
    pub async fn create_tenant_migration(
        &self,
        request: CreateTenantMigrationRequest,
    ) -> TaskLifecycleResult<Vec<Task>> {
        let CreateTenantMigrationRequest {
            name,
            creator_id,
            refs,
            database_ids,
            sql,
            rollback_sql,
            when,
        } = request;

        if database_ids.is_empty() {
            return Err(TaskDomainError::NoTargetDatabases.into());
        }
        let name = TaskName::new(name)?;
        let when = TaskWhen::try_from(when.as_str())?;
        let creator_id = PrincipalId::new(creator_id)?;
        let version = self.versions.next_version();
        let payload = TaskPayload::DatabaseSchemaUpdate(
            SchemaUpdatePayload::new(sql, rollback_sql).with_schema_version(version.clone()),
        );

        let tasks = database_ids
            .into_iter()
            .map(|database_id| {
                let data = NewTaskData {
                    id: TaskId::from_uuid(self.ids.next_uuid()),
                    placement: refs.resolve(Some(database_id))?,
                    name: name.clone(),
                    payload: payload.clone(),
                    when,
                    creator_id,
                };
                Ok(Task::new(data, &*self.clock))
            })
            .collect::<TaskLifecycleResult<Vec<_>>>()?;

        let stored = tasks.clone();
        self.repository
            .transaction(move |transaction| {
                for task in &stored {
                    transaction.insert(task)?;
                }
                Ok::<_, TaskLifecycleError>(())
            })
            .await?;
        info!(
            schema_version = %version,
            databases = tasks.len(),
            "created tenant migration"
        );
        Ok(tasks)
    }

    /// Returns every task matching the filter, ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when persistence lookup
    /// fails.
    pub async fn find_task_list(&self, filter: &TaskFilter) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.repository.find(filter).await?)
    }

    /// Returns the single task matching the filter.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NoMatch`] when nothing matches,
    /// [`TaskLifecycleError::AmbiguousMatch`] when several tasks match, and
    /// [`TaskLifecycleError::Repository`] when persistence lookup fails.
    pub async fn find_task(&self, filter: &TaskFilter) -> TaskLifecycleResult<Task> {
        let mut found = self.repository.find(filter).await?;
        match found.len() {
            0 => Err(TaskLifecycleError::NoMatch(*filter)),
            1 => found.pop().ok_or(TaskLifecycleError::NoMatch(*filter)),
            count => Err(TaskLifecycleError::AmbiguousMatch {
                filter: *filter,
                count,
            }),
        }
    }

    /// Retrieves a task by identifier.
    ///
    /// Returns `Ok(None)` when the task does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when persistence lookup
    /// fails.
    pub async fn find_task_by_id(&self, id: TaskId) -> TaskLifecycleResult<Option<Task>> {
        Ok(self.repository.find_by_id(id).await?)
    }

    /// Applies a status patch and advances the pipeline when the owning
    /// stage passes.
    ///
    /// The patch, its run cascade, and any downstream activations commit in
    /// one transaction. Re-applying the current status only refreshes audit
    /// fields and never re-triggers advancement.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::TaskNotFound`] when the task does not
    /// exist in the requested workspace, [`TaskLifecycleError::Domain`] when
    /// the transition or run cascade is rejected, parse errors for unknown
    /// status strings, and [`TaskLifecycleError::Repository`] for conflicts
    /// and persistence failures.
    pub async fn patch_status(&self, request: PatchTaskStatusRequest) -> TaskLifecycleResult<Task> {
        let task_id = request.task_id;
        let status = TaskStatus::try_from(request.status.as_str())?;
        let mut change = StatusChange::new(status, PrincipalId::new(request.updater_id)?);
        if let Some((run_id, run_status)) = request.task_run {
            change = change.with_task_run(TaskRunUpdate {
                run_id,
                status: TaskRunStatus::try_from(run_status.as_str())?,
            });
        }
        let patch = StatusPatch {
            task_id,
            workspace_id: request.workspace_id.map(WorkspaceId::new).transpose()?,
            change,
        };

        let clock = Arc::clone(&self.clock);
        let ids = Arc::clone(&self.ids);
        let result = self
            .repository
            .transaction(move |transaction| apply_patch(transaction, &*clock, &*ids, patch))
            .await;

        match &result {
            Ok(task) => info!(
                task_id = %task_id,
                status = %task.status(),
                comment = request.comment.as_deref().unwrap_or_default(),
                "patched task status"
            ),
            Err(err) => warn!(
                task_id = %task_id,
                requested = %status,
                error = %err,
                "rejected task status patch"
            ),
        }
        result
    }

    /// Starts the pending `ON_SUCCESS` tasks of the lowest stage of a
    /// pipeline that has not passed.
    ///
    /// Returns the tasks that were started, which is empty when the
    /// pipeline is halted or already running.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] for invalid identifiers and
    /// [`TaskLifecycleError::Repository`] for conflicts and persistence
    /// failures.
    pub async fn start_pipeline(
        &self,
        pipeline_id: i64,
        updater_id: i64,
    ) -> TaskLifecycleResult<Vec<Task>> {
        let pipeline_id = PipelineId::new(pipeline_id)?;
        let actor = PrincipalId::new(updater_id)?;
        let clock = Arc::clone(&self.clock);
        let ids = Arc::clone(&self.ids);
        let advancement = self
            .repository
            .transaction(move |transaction| {
                PipelineAdvancer::new(&*clock, &*ids, actor).start(transaction, pipeline_id)
            })
            .await?;
        info!(
            pipeline_id = %pipeline_id,
            activated = advancement.activated.len(),
            "started pipeline"
        );
        Ok(advancement.activated)
    }
}

fn apply_patch<C, I>(
    transaction: &mut dyn TaskTransaction,
    clock: &C,
    ids: &I,
    patch: StatusPatch,
) -> TaskLifecycleResult<Task>
where
    C: Clock,
    I: IdSource,
{
    let StatusPatch {
        task_id,
        workspace_id,
        change,
    } = patch;

    let located = transaction
        .find_by_id(task_id)?
        .ok_or(TaskLifecycleError::TaskNotFound(task_id))?;
    if workspace_id.is_some_and(|workspace_id| workspace_id != located.workspace_id()) {
        return Err(TaskLifecycleError::TaskNotFound(task_id));
    }

    // Stages are locked lowest first, so a patch that may advance the
    // pipeline takes the earlier stages before its own.
    if change.status.is_progressing() {
        earlier_stages_passed(transaction, located.pipeline_id(), located.stage_id())?;
    }
    // Lock the whole stage before re-reading the task so that concurrent
    // patches in one stage serialize on the same rows.
    let mut task = transaction
        .lock_stage(located.pipeline_id(), located.stage_id())?
        .into_iter()
        .find(|member| member.id() == task_id)
        .ok_or(TaskLifecycleError::TaskNotFound(task_id))?;
    let expected = task.status();
    let outcome = task.transition_to(
        change,
        || TaskRunId::from_uuid(ids.next_uuid()),
        clock,
    )?;
    transaction.save(&task, expected)?;

    if !outcome.is_applied() {
        debug!(task_id = %task_id, status = %task.status(), "status unchanged");
        return Ok(task);
    }
    if task.status().is_progressing() {
        let advancement = PipelineAdvancer::new(clock, ids, change.updater_id).on_task_progressed(
            transaction,
            task.pipeline_id(),
            task.stage_id(),
        )?;
        debug!(
            task_id = %task_id,
            passed_stages = advancement.passed_stages.len(),
            activated = advancement.activated.len(),
            "evaluated pipeline advancement"
        );
    }
    Ok(task)
}
