//! Concurrent status reports against a shared service.

use std::sync::Arc;

use super::helpers::{EXECUTOR, PIPELINE, TestService, create_task, patch, service, status_of};
use eyre::ensure;
use pipewright::task::{domain::TaskStatus, services::ErrorKind};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_reports_admit_exactly_one_outcome(service: TestService) -> eyre::Result<()> {
    let service = Arc::new(service);
    let task = create_task(&service, "contested", 1, 1, "ON_SUCCESS").await?;
    service.start_pipeline(PIPELINE, EXECUTOR).await?;

    let handles: Vec<_> = ["DONE", "FAILED", "CANCELED"]
        .into_iter()
        .map(|status| {
            let service = Arc::clone(&service);
            let id = task.id();
            tokio::spawn(async move { patch(&service, id, status).await })
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
    ensure!(status_of(&service, task.id()).await?.is_terminal());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_stage_completion_activates_next_stage_once(
    service: TestService,
) -> eyre::Result<()> {
    let service = Arc::new(service);
    let mut members = Vec::new();
    for database in 1..=4 {
        members.push(create_task(&service, "shard", 1, database, "ON_SUCCESS").await?);
    }
    let next = create_task(&service, "next", 2, 1, "ON_SUCCESS").await?;
    service.start_pipeline(PIPELINE, EXECUTOR).await?;

    let handles: Vec<_> = members
        .iter()
        .map(|task| {
            let service = Arc::clone(&service);
            let id = task.id();
            tokio::spawn(async move { patch(&service, id, "DONE").await })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }

    let activated = service
        .find_task_by_id(next.id())
        .await?
        .ok_or_else(|| eyre::eyre!("next-stage task should exist"))?;
    ensure!(activated.status() == TaskStatus::Running);
    ensure!(activated.runs().len() == 1);
    Ok(())
}
