//! Shared test helpers for in-memory integration tests.

use std::sync::Arc;

use mockable::DefaultClock;
use pipewright::task::{
    adapters::{ids::RandomIdSource, memory::InMemoryTaskRepository},
    domain::{Task, TaskId, TaskStatus},
    services::{CreateTaskRequest, PatchTaskStatusRequest, TaskLifecycleResult, TaskLifecycleService},
};
use rstest::fixture;

/// Service type used by the in-memory integration tests.
pub type TestService = TaskLifecycleService<InMemoryTaskRepository, DefaultClock, RandomIdSource>;

/// Workspace shared by every task the helpers create.
pub const WORKSPACE: i64 = 3;

/// Pipeline shared by every task the helpers create.
pub const PIPELINE: i64 = 500;

/// Principal reported as the updater of status patches.
pub const EXECUTOR: i64 = 77;

/// Provides a service backed by a fresh repository.
#[fixture]
pub fn service() -> TestService {
    TaskLifecycleService::new(
        Arc::new(InMemoryTaskRepository::new()),
        Arc::new(DefaultClock),
        Arc::new(RandomIdSource),
    )
}

/// Creates a task in the shared pipeline.
///
/// # Errors
///
/// Returns the service error if creation fails.
pub async fn create_task(
    service: &TestService,
    name: &str,
    stage: i64,
    database: i64,
    when: &str,
) -> TaskLifecycleResult<Task> {
    service
        .create_task(
            CreateTaskRequest::new(name, 1)
                .in_workspace(WORKSPACE)
                .in_pipeline(PIPELINE)
                .in_stage(stage)
                .on_database(database)
                .with_when(when),
        )
        .await
}

/// Patches a task to `status` as the shared executor.
///
/// # Errors
///
/// Returns the service error if the patch is rejected.
pub async fn patch(service: &TestService, id: TaskId, status: &str) -> TaskLifecycleResult<Task> {
    service
        .patch_status(PatchTaskStatusRequest::new(id, status, EXECUTOR).in_workspace(WORKSPACE))
        .await
}

/// Reads the current status of a task.
///
/// # Errors
///
/// Returns an error when the lookup fails or the task does not exist.
pub async fn status_of(service: &TestService, id: TaskId) -> Result<TaskStatus, eyre::Report> {
    let task = service
        .find_task_by_id(id)
        .await?
        .ok_or_else(|| eyre::eyre!("task {id} should exist"))?;
    Ok(task.status())
}
