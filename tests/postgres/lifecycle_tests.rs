//! Service flows end to end over `PostgreSQL`.

use std::sync::Arc;

use super::helpers::{fresh_pipeline, repository, service};
use eyre::ensure;
use pipewright::task::{
    domain::TaskStatus,
    services::{CreateTaskRequest, ErrorKind, PatchTaskStatusRequest},
};
use rstest::rstest;

fn request(name: &str, pipeline: i64, stage: i64, database: i64) -> CreateTaskRequest {
    CreateTaskRequest::new(name, 1)
        .in_workspace(1)
        .in_pipeline(pipeline)
        .in_stage(stage)
        .on_database(database)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs PIPEWRIGHT_DATABASE_URL"]
async fn failed_task_blocks_stage_until_skipped() -> eyre::Result<()> {
    let repo = repository()?;
    let service = service(repo);
    let pipeline = fresh_pipeline();
    let task_a = service.create_task(request("a", pipeline, 1, 1)).await?;
    let task_b = service.create_task(request("b", pipeline, 1, 2)).await?;
    let task_c = service.create_task(request("c", pipeline, 2, 1)).await?;
    service.start_pipeline(pipeline, 9).await?;

    service
        .patch_status(PatchTaskStatusRequest::new(task_a.id(), "DONE", 9))
        .await?;
    service
        .patch_status(PatchTaskStatusRequest::new(task_b.id(), "FAILED", 9))
        .await?;
    let held = service.find_task_by_id(task_c.id()).await?;
    service
        .patch_status(PatchTaskStatusRequest::new(task_b.id(), "SKIPPED", 9))
        .await?;
    let released = service.find_task_by_id(task_c.id()).await?;

    ensure!(held.map(|task| task.status()) == Some(TaskStatus::Pending));
    ensure!(released.as_ref().map(|task| task.status()) == Some(TaskStatus::Running));
    ensure!(released.is_some_and(|task| task.runs().len() == 1));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "needs PIPEWRIGHT_DATABASE_URL"]
async fn concurrent_reports_serialize_on_the_stage_lock() -> eyre::Result<()> {
    let repo = repository()?;
    let service = Arc::new(service(repo));
    let pipeline = fresh_pipeline();
    let task = service.create_task(request("raced", pipeline, 1, 1)).await?;
    service.start_pipeline(pipeline, 9).await?;

    let handles: Vec<_> = ["DONE", "FAILED"]
        .into_iter()
        .map(|status| {
            let service = Arc::clone(&service);
            let id = task.id();
            tokio::spawn(async move {
                service
                    .patch_status(PatchTaskStatusRequest::new(id, status, 9))
                    .await
            })
        })
        .collect();

    let mut winners = 0_usize;
    for handle in handles {
        match handle.await? {
            Ok(_) => winners += 1,
            Err(err) => ensure!(err.kind() == ErrorKind::InvalidTransition),
        }
    }
    ensure!(winners == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs PIPEWRIGHT_DATABASE_URL"]
async fn failed_stage_holds_later_stages_after_manual_work() -> eyre::Result<()> {
    let repo = repository()?;
    let service = service(repo);
    let pipeline = fresh_pipeline();
    let task_a = service.create_task(request("a", pipeline, 1, 1)).await?;
    let task_b = service.create_task(request("b", pipeline, 1, 2)).await?;
    let manual = service
        .create_task(request("m", pipeline, 2, 1).with_when("MANUAL"))
        .await?;
    let task_d = service.create_task(request("d", pipeline, 3, 1)).await?;
    service.start_pipeline(pipeline, 9).await?;

    for (id, status) in [
        (task_a.id(), "DONE"),
        (task_b.id(), "FAILED"),
        (manual.id(), "RUNNING"),
        (manual.id(), "DONE"),
    ] {
        service
            .patch_status(PatchTaskStatusRequest::new(id, status, 9))
            .await?;
    }
    let held = service.find_task_by_id(task_d.id()).await?;
    service
        .patch_status(PatchTaskStatusRequest::new(task_b.id(), "SKIPPED", 9))
        .await?;
    let released = service.find_task_by_id(task_d.id()).await?;

    ensure!(held.map(|task| task.status()) == Some(TaskStatus::Pending));
    ensure!(released.map(|task| task.status()) == Some(TaskStatus::Running));
    Ok(())
}
