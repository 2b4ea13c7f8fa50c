//! Repository-level tests against `PostgreSQL`.

use super::helpers::{fresh_pipeline, repository};
use chrono::SubsecRound;
use eyre::{ensure, eyre};
use mockable::DefaultClock;
use pipewright::task::{
    domain::{
        DatabaseId, NewTaskData, PipelineId, PrincipalId, SchemaUpdatePayload, StageId,
        StatusChange, Task, TaskFilter, TaskId, TaskName, TaskPayload, TaskPlacement, TaskRunId,
        TaskStatus, TaskWhen, WorkspaceId,
    },
    ports::{TaskRepository, TaskRepositoryError},
};
use rstest::rstest;
use uuid::Uuid;

fn new_task(pipeline: i64, stage: i64, payload: TaskPayload) -> eyre::Result<Task> {
    Ok(Task::new(
        NewTaskData {
            id: TaskId::from_uuid(Uuid::new_v4()),
            placement: TaskPlacement {
                workspace_id: WorkspaceId::new(1)?,
                pipeline_id: PipelineId::new(pipeline)?,
                stage_id: StageId::new(stage)?,
                database_id: DatabaseId::new(1)?,
            },
            name: TaskName::new("pg task")?,
            payload,
            when: TaskWhen::OnSuccess,
            creator_id: PrincipalId::new(1)?,
        },
        &DefaultClock,
    ))
}

/// Postgres keeps microseconds; align the in-memory copy before comparing.
fn same_record(stored: &Task, expected: &Task) -> bool {
    stored.id() == expected.id()
        && stored.status() == expected.status()
        && stored.payload() == expected.payload()
        && stored.runs().len() == expected.runs().len()
        && stored.created_at().trunc_subsecs(6) == expected.created_at().trunc_subsecs(6)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs PIPEWRIGHT_DATABASE_URL"]
async fn stored_task_round_trips_with_payload() -> eyre::Result<()> {
    let repo = repository()?;
    let payload = TaskPayload::DatabaseSchemaUpdate(SchemaUpdatePayload::new(
        "CREATE TABLE pg_check (id int);",
        "DROP TABLE pg_check;",
    ));
    let task = new_task(fresh_pipeline(), 1, payload)?;

    repo.store(&task).await?;
    let stored = repo
        .find_by_id(task.id())
        .await?
        .ok_or_else(|| eyre!("stored task should be found"))?;

    ensure!(same_record(&stored, &task));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs PIPEWRIGHT_DATABASE_URL"]
async fn duplicate_store_is_reported() -> eyre::Result<()> {
    let repo = repository()?;
    let task = new_task(fresh_pipeline(), 1, TaskPayload::General)?;
    repo.store(&task).await?;

    let result = repo.store(&task).await;

    ensure!(matches!(result, Err(TaskRepositoryError::DuplicateTask(id)) if id == task.id()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs PIPEWRIGHT_DATABASE_URL"]
async fn save_persists_runs_and_rejects_stale_status() -> eyre::Result<()> {
    let repo = repository()?;
    let mut task = new_task(fresh_pipeline(), 1, TaskPayload::General)?;
    repo.store(&task).await?;
    task.transition_to(
        StatusChange::new(TaskStatus::Running, PrincipalId::new(2)?),
        || TaskRunId::from_uuid(Uuid::new_v4()),
        &DefaultClock,
    )?;

    let running = task.clone();
    repo.transaction(move |transaction| transaction.save(&running, TaskStatus::Pending))
        .await?;
    let stale = task.clone();
    let conflict = repo
        .transaction(move |transaction| transaction.save(&stale, TaskStatus::Pending))
        .await;
    let stored = repo
        .find_by_id(task.id())
        .await?
        .ok_or_else(|| eyre!("task should exist"))?;

    ensure!(matches!(conflict, Err(TaskRepositoryError::Conflict { .. })));
    ensure!(stored.status() == TaskStatus::Running);
    ensure!(stored.runs().len() == 1);
    ensure!(stored.active_run().map(|run| run.id()) == task.active_run().map(|run| run.id()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs PIPEWRIGHT_DATABASE_URL"]
async fn lock_stage_and_find_are_ordered_by_id() -> eyre::Result<()> {
    let repo = repository()?;
    let pipeline = fresh_pipeline();
    for stage in [2, 1, 2, 3] {
        let task = new_task(pipeline, stage, TaskPayload::General)?;
        repo.store(&task).await?;
    }
    let pipeline_id = PipelineId::new(pipeline)?;
    let stage_two = StageId::new(2)?;

    let (locked, stages) = repo
        .transaction(move |transaction| {
            let locked = transaction.lock_stage(pipeline_id, stage_two)?;
            let stages = transaction.pipeline_stages(pipeline_id)?;
            Ok::<_, TaskRepositoryError>((locked, stages))
        })
        .await?;
    let found = repo
        .find(&TaskFilter::new().with_pipeline(pipeline_id))
        .await?;

    let locked_ids: Vec<_> = locked.iter().map(Task::id).collect();
    let mut sorted = locked_ids.clone();
    sorted.sort();
    ensure!(locked_ids.len() == 2 && locked_ids == sorted);
    ensure!(stages.iter().map(|stage| stage.value()).collect::<Vec<_>>() == vec![1, 2, 3]);
    ensure!(found.len() == 4);
    ensure!(found.windows(2).all(|pair| pair[0].id() < pair[1].id()));
    Ok(())
}
