//! In-memory integration tests for pipeline lifecycle operations.

use super::helpers::{
    EXECUTOR, PIPELINE, TestService, WORKSPACE, create_task, patch, service, status_of,
};
use eyre::ensure;
use pipewright::task::{
    domain::{PipelineId, StageId, Task, TaskFilter, TaskRunStatus, TaskStatus, TaskType},
    services::{CreateTenantMigrationRequest, ErrorKind},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn three_stage_pipeline_runs_to_completion(service: TestService) -> eyre::Result<()> {
    let first = create_task(&service, "backup", 1, 1, "ON_SUCCESS").await?;
    let second = create_task(&service, "migrate", 2, 1, "ON_SUCCESS").await?;
    let third = create_task(&service, "verify", 3, 1, "ON_SUCCESS").await?;

    let started = service.start_pipeline(PIPELINE, EXECUTOR).await?;
    ensure!(started.len() == 1 && started[0].id() == first.id());

    patch(&service, first.id(), "DONE").await?;
    ensure!(status_of(&service, second.id()).await? == TaskStatus::Running);
    ensure!(status_of(&service, third.id()).await? == TaskStatus::Pending);

    patch(&service, second.id(), "DONE").await?;
    let finished = patch(&service, third.id(), "DONE").await;
    ensure!(status_of(&service, third.id()).await? == TaskStatus::Done);

    let all = service
        .find_task_list(&TaskFilter::new().with_pipeline(PipelineId::new(PIPELINE)?))
        .await?;
    ensure!(all.iter().all(|task| task.status() == TaskStatus::Done));
    ensure!(
        finished.is_ok_and(|task| task.runs().iter().all(|run| run.status() == TaskRunStatus::Done))
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn canceled_task_blocks_until_retried_and_finished(service: TestService) -> eyre::Result<()> {
    let flaky = create_task(&service, "flaky", 1, 1, "ON_SUCCESS").await?;
    let steady = create_task(&service, "steady", 1, 2, "ON_SUCCESS").await?;
    let next = create_task(&service, "next", 2, 1, "ON_SUCCESS").await?;
    service.start_pipeline(PIPELINE, EXECUTOR).await?;

    patch(&service, steady.id(), "DONE").await?;
    patch(&service, flaky.id(), "CANCELED").await?;
    ensure!(status_of(&service, next.id()).await? == TaskStatus::Pending);

    let retried = patch(&service, flaky.id(), "RUNNING").await?;
    ensure!(retried.runs().len() == 2);
    ensure!(status_of(&service, next.id()).await? == TaskStatus::Pending);

    patch(&service, flaky.id(), "DONE").await?;
    ensure!(status_of(&service, next.id()).await? == TaskStatus::Running);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn manual_task_must_be_started_explicitly(service: TestService) -> eyre::Result<()> {
    let gate = create_task(&service, "gate", 1, 1, "ON_SUCCESS").await?;
    let approval = create_task(&service, "approval", 2, 1, "MANUAL").await?;
    let after = create_task(&service, "after", 3, 1, "ON_SUCCESS").await?;
    service.start_pipeline(PIPELINE, EXECUTOR).await?;

    patch(&service, gate.id(), "DONE").await?;
    ensure!(status_of(&service, approval.id()).await? == TaskStatus::Pending);
    ensure!(status_of(&service, after.id()).await? == TaskStatus::Pending);

    patch(&service, approval.id(), "RUNNING").await?;
    patch(&service, approval.id(), "DONE").await?;
    ensure!(status_of(&service, after.id()).await? == TaskStatus::Running);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn starting_a_halted_pipeline_activates_nothing(service: TestService) -> eyre::Result<()> {
    let only = create_task(&service, "only", 1, 1, "ON_SUCCESS").await?;
    create_task(&service, "later", 2, 1, "ON_SUCCESS").await?;
    service.start_pipeline(PIPELINE, EXECUTOR).await?;
    patch(&service, only.id(), "FAILED").await?;

    let restarted = service.start_pipeline(PIPELINE, EXECUTOR).await?;

    ensure!(restarted.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tenant_migration_fans_out_to_one_stage(service: TestService) -> eyre::Result<()> {
    let request = CreateTenantMigrationRequest::new(
        "add tenant column",
        1,
        "ALTER TABLE accounts ADD tenant_id bigint;",
        "ALTER TABLE accounts DROP tenant_id;",
    )
    .in_workspace(WORKSPACE)
    .in_pipeline(PIPELINE)
    .in_stage(4)
    .on_databases([21, 22]);

    let created = service.create_tenant_migration(request).await?;
    let in_stage = service
        .find_task_list(&TaskFilter::new().with_stage(StageId::new(4)?))
        .await?;

    let mut created_ids: Vec<_> = created.iter().map(Task::id).collect();
    created_ids.sort();
    ensure!(in_stage.iter().map(Task::id).collect::<Vec<_>>() == created_ids);
    ensure!(
        created
            .iter()
            .all(|task| task.task_type() == TaskType::DatabaseSchemaUpdate)
    );
    let versions: Vec<_> = created
        .iter()
        .filter_map(|task| task.payload().schema_update())
        .filter_map(|payload| payload.schema_version())
        .collect();
    ensure!(versions.len() == 2 && versions[0] == versions[1]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn terminal_task_rejects_further_changes(service: TestService) -> eyre::Result<()> {
    let task = create_task(&service, "once", 1, 1, "ON_SUCCESS").await?;
    patch(&service, task.id(), "SKIPPED").await?;

    let err = patch(&service, task.id(), "RUNNING")
        .await
        .err()
        .ok_or_else(|| eyre::eyre!("SKIPPED is terminal"))?;

    ensure!(err.kind() == ErrorKind::InvalidTransition);
    ensure!(status_of(&service, task.id()).await? == TaskStatus::Skipped);
    Ok(())
}
