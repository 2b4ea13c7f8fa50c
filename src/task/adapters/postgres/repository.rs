//! `PostgreSQL` repository implementation for task lifecycle storage.

use super::{
    config::{PostgresConfigError, PostgresStoreConfig},
    models::{NewTaskRow, TaskRow, TaskRunRow},
    schema::{task_runs, tasks},
};
use crate::task::{
    domain::{
        DatabaseId, PersistedTaskData, PersistedTaskRunData, PipelineId, PrincipalId, StageId,
        Task, TaskFilter, TaskId, TaskName, TaskPayload, TaskPlacement, TaskRun, TaskRunId,
        TaskRunStatus, TaskStatus, TaskType, TaskWhen, WorkspaceId,
    },
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult, TaskTransaction},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::upsert::excluded;
use std::collections::HashMap;
use uuid::Uuid;

/// `PostgreSQL` connection pool type used by task adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed task repository.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: TaskPgPool,
}

impl PostgresTaskRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    /// Builds a pool from `config` and wraps it in a repository.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresConfigError::Pool`] when the pool cannot be built.
    pub fn connect(config: &PostgresStoreConfig) -> Result<Self, PostgresConfigError> {
        Ok(Self::new(config.build_pool()?))
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }
}

/// Error carried out of a Diesel transaction closure.
enum TxAbort<E> {
    Work(E),
    Database(DieselError),
}

impl<E> From<DieselError> for TxAbort<E> {
    fn from(err: DieselError) -> Self {
        Self::Database(err)
    }
}

impl<E: From<TaskRepositoryError>> TxAbort<E> {
    fn into_inner(self) -> E {
        match self {
            Self::Work(err) => err,
            Self::Database(err) => E::from(TaskRepositoryError::persistence(err)),
        }
    }
}

/// Transaction handle bound to one pooled connection.
struct PgTaskTransaction<'c> {
    connection: &'c mut PgConnection,
}

impl TaskTransaction for PgTaskTransaction<'_> {
    fn find_by_id(&mut self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        load_task(self.connection, id)
    }

    fn lock_stage(
        &mut self,
        pipeline_id: PipelineId,
        stage_id: StageId,
    ) -> TaskRepositoryResult<Vec<Task>> {
        let rows = tasks::table
            .filter(tasks::pipeline_id.eq(pipeline_id.value()))
            .filter(tasks::stage_id.eq(stage_id.value()))
            .order(tasks::id.asc())
            .select(TaskRow::as_select())
            .for_update()
            .load::<TaskRow>(self.connection)
            .map_err(TaskRepositoryError::persistence)?;
        rows_to_tasks(self.connection, rows)
    }

    fn pipeline_stages(&mut self, pipeline_id: PipelineId) -> TaskRepositoryResult<Vec<StageId>> {
        let stages = tasks::table
            .filter(tasks::pipeline_id.eq(pipeline_id.value()))
            .select(tasks::stage_id)
            .distinct()
            .order(tasks::stage_id.asc())
            .load::<i64>(self.connection)
            .map_err(TaskRepositoryError::persistence)?;
        stages
            .into_iter()
            .map(|stage| StageId::new(stage).map_err(TaskRepositoryError::persistence))
            .collect()
    }

    fn insert(&mut self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        diesel::insert_into(tasks::table)
            .values(&to_new_row(task)?)
            .execute(self.connection)
            .map_err(|err| match err {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    TaskRepositoryError::DuplicateTask(task_id)
                }
                _ => TaskRepositoryError::persistence(err),
            })?;
        upsert_runs(self.connection, task)
    }

    fn save(&mut self, task: &Task, expected: TaskStatus) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let updated = diesel::update(
            tasks::table
                .filter(tasks::id.eq(task_id.into_inner()))
                .filter(tasks::status.eq(expected.as_str())),
        )
        .set((
            tasks::status.eq(task.status().as_str()),
            tasks::updater_id.eq(task.updater_id().value()),
            tasks::updated_at.eq(task.updated_at()),
        ))
        .execute(self.connection)
        .map_err(TaskRepositoryError::persistence)?;

        if updated == 0 {
            let exists = diesel::select(diesel::dsl::exists(
                tasks::table.filter(tasks::id.eq(task_id.into_inner())),
            ))
            .get_result::<bool>(self.connection)
            .map_err(TaskRepositoryError::persistence)?;
            return Err(if exists {
                TaskRepositoryError::Conflict { task_id, expected }
            } else {
                TaskRepositoryError::NotFound(task_id)
            });
        }
        upsert_runs(self.connection, task)
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task = task.clone();
        self.transaction(move |transaction| transaction.insert(&task))
            .await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| load_task(connection, id))
            .await
    }

    async fn find(&self, filter: &TaskFilter) -> TaskRepositoryResult<Vec<Task>> {
        let filter = *filter;
        self.run_blocking(move |connection| {
            let mut query = tasks::table.select(TaskRow::as_select()).into_boxed();
            if let Some(id) = filter.id {
                query = query.filter(tasks::id.eq(id.into_inner()));
            }
            if let Some(workspace_id) = filter.workspace_id {
                query = query.filter(tasks::workspace_id.eq(workspace_id.value()));
            }
            if let Some(pipeline_id) = filter.pipeline_id {
                query = query.filter(tasks::pipeline_id.eq(pipeline_id.value()));
            }
            if let Some(stage_id) = filter.stage_id {
                query = query.filter(tasks::stage_id.eq(stage_id.value()));
            }
            let rows = query
                .order(tasks::id.asc())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows_to_tasks(connection, rows)
        })
        .await
    }

    async fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn TaskTransaction) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<TaskRepositoryError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut pooled = pool
                .get()
                .map_err(|err| E::from(TaskRepositoryError::persistence(err)))?;
            let connection: &mut PgConnection = &mut pooled;
            connection
                .transaction::<T, TxAbort<E>, _>(|connection| {
                    let mut transaction = PgTaskTransaction { connection };
                    work(&mut transaction).map_err(TxAbort::Work)
                })
                .map_err(TxAbort::into_inner)
        })
        .await
        .map_err(|err| E::from(TaskRepositoryError::persistence(err)))?
    }
}

fn load_task(connection: &mut PgConnection, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
    let row = tasks::table
        .filter(tasks::id.eq(id.into_inner()))
        .select(TaskRow::as_select())
        .first::<TaskRow>(connection)
        .optional()
        .map_err(TaskRepositoryError::persistence)?;
    match row {
        Some(found) => Ok(rows_to_tasks(connection, vec![found])?.pop()),
        None => Ok(None),
    }
}

fn rows_to_tasks(
    connection: &mut PgConnection,
    rows: Vec<TaskRow>,
) -> TaskRepositoryResult<Vec<Task>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let task_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let run_rows = task_runs::table
        .filter(task_runs::task_id.eq_any(task_ids))
        .order((task_runs::task_id.asc(), task_runs::attempt.asc()))
        .select(TaskRunRow::as_select())
        .load::<TaskRunRow>(connection)
        .map_err(TaskRepositoryError::persistence)?;

    let mut runs_by_task: HashMap<Uuid, Vec<TaskRun>> = HashMap::new();
    for run_row in run_rows {
        let task_id = run_row.task_id;
        runs_by_task
            .entry(task_id)
            .or_default()
            .push(row_to_run(run_row)?);
    }

    rows.into_iter()
        .map(|row| {
            let runs = runs_by_task.remove(&row.id).unwrap_or_default();
            row_to_task(row, runs)
        })
        .collect()
}

fn upsert_runs(connection: &mut PgConnection, task: &Task) -> TaskRepositoryResult<()> {
    let rows = task
        .runs()
        .iter()
        .map(|run| to_run_row(task.id(), run))
        .collect::<TaskRepositoryResult<Vec<_>>>()?;
    if rows.is_empty() {
        return Ok(());
    }

    diesel::insert_into(task_runs::table)
        .values(&rows)
        .on_conflict(task_runs::id)
        .do_update()
        .set((
            task_runs::status.eq(excluded(task_runs::status)),
            task_runs::updater_id.eq(excluded(task_runs::updater_id)),
            task_runs::updated_at.eq(excluded(task_runs::updated_at)),
        ))
        .execute(connection)
        .map_err(TaskRepositoryError::persistence)?;
    Ok(())
}

fn to_new_row(task: &Task) -> TaskRepositoryResult<NewTaskRow> {
    let payload = serde_json::to_value(task.payload()).map_err(TaskRepositoryError::persistence)?;
    let placement = task.placement();

    Ok(NewTaskRow {
        id: task.id().into_inner(),
        workspace_id: placement.workspace_id.value(),
        pipeline_id: placement.pipeline_id.value(),
        stage_id: placement.stage_id.value(),
        database_id: placement.database_id.value(),
        name: task.name().as_str().to_owned(),
        task_type: task.task_type().as_str().to_owned(),
        trigger_when: task.when().as_str().to_owned(),
        payload,
        status: task.status().as_str().to_owned(),
        creator_id: task.creator_id().value(),
        updater_id: task.updater_id().value(),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    })
}

fn to_run_row(task_id: TaskId, run: &TaskRun) -> TaskRepositoryResult<TaskRunRow> {
    Ok(TaskRunRow {
        id: run.id().into_inner(),
        task_id: task_id.into_inner(),
        attempt: i32::try_from(run.attempt()).map_err(TaskRepositoryError::persistence)?,
        status: run.status().as_str().to_owned(),
        creator_id: run.creator_id().value(),
        updater_id: run.updater_id().value(),
        created_at: run.created_at(),
        updated_at: run.updated_at(),
    })
}

fn row_to_task(row: TaskRow, runs: Vec<TaskRun>) -> TaskRepositoryResult<Task> {
    let TaskRow {
        id,
        workspace_id,
        pipeline_id,
        stage_id,
        database_id,
        name,
        task_type: persisted_type,
        trigger_when,
        payload: persisted_payload,
        status: persisted_status,
        creator_id,
        updater_id,
        created_at,
        updated_at,
    } = row;

    let placement = TaskPlacement {
        workspace_id: WorkspaceId::new(workspace_id).map_err(TaskRepositoryError::persistence)?,
        pipeline_id: PipelineId::new(pipeline_id).map_err(TaskRepositoryError::persistence)?,
        stage_id: StageId::new(stage_id).map_err(TaskRepositoryError::persistence)?,
        database_id: DatabaseId::new(database_id).map_err(TaskRepositoryError::persistence)?,
    };
    let payload = serde_json::from_value::<TaskPayload>(persisted_payload)
        .map_err(TaskRepositoryError::persistence)?;
    let task_type =
        TaskType::try_from(persisted_type.as_str()).map_err(TaskRepositoryError::persistence)?;
    if payload.task_type() != task_type {
        return Err(TaskRepositoryError::persistence(std::io::Error::other(
            format!(
                "task {id} has type {task_type} but its payload is tagged {}",
                payload.task_type()
            ),
        )));
    }

    let data = PersistedTaskData {
        id: TaskId::from_uuid(id),
        placement,
        name: TaskName::new(name).map_err(TaskRepositoryError::persistence)?,
        payload,
        when: TaskWhen::try_from(trigger_when.as_str())
            .map_err(TaskRepositoryError::persistence)?,
        status: TaskStatus::try_from(persisted_status.as_str())
            .map_err(TaskRepositoryError::persistence)?,
        runs,
        creator_id: PrincipalId::new(creator_id).map_err(TaskRepositoryError::persistence)?,
        updater_id: PrincipalId::new(updater_id).map_err(TaskRepositoryError::persistence)?,
        created_at,
        updated_at,
    };
    Ok(Task::from_persisted(data))
}

fn row_to_run(row: TaskRunRow) -> TaskRepositoryResult<TaskRun> {
    let data = PersistedTaskRunData {
        id: TaskRunId::from_uuid(row.id),
        attempt: u32::try_from(row.attempt).map_err(TaskRepositoryError::persistence)?,
        status: TaskRunStatus::try_from(row.status.as_str())
            .map_err(TaskRepositoryError::persistence)?,
        creator_id: PrincipalId::new(row.creator_id).map_err(TaskRepositoryError::persistence)?,
        updater_id: PrincipalId::new(row.updater_id).map_err(TaskRepositoryError::persistence)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };
    Ok(TaskRun::from_persisted(data))
}
