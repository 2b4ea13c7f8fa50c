//! Then steps for pipeline advancement BDD scenarios.

use super::world::{PipelineWorld, run_async};
use pipewright::task::{
    domain::{Task, TaskStatus},
    services::{ErrorKind, TaskLifecycleError},
};
use rstest_bdd_macros::then;

fn stored_task(world: &PipelineWorld, name: &str) -> Result<Task, eyre::Report> {
    let id = world.task_id(name)?;
    run_async(world.service.find_task_by_id(id))?
        .ok_or_else(|| eyre::eyre!("task {name} is missing from the repository"))
}

fn last_patch(world: &PipelineWorld) -> Result<&Result<Task, TaskLifecycleError>, eyre::Report> {
    world
        .last_patch_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing patch result"))
}

#[then(r#"task "{name}" is "{status}""#)]
fn task_status_is(world: &PipelineWorld, name: String, status: String) -> Result<(), eyre::Report> {
    let expected = TaskStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let task = stored_task(world, &name)?;

    if task.status() != expected {
        return Err(eyre::eyre!(
            "expected task {name} to be {expected}, found {}",
            task.status()
        ));
    }
    Ok(())
}

#[then("the patch succeeds")]
fn patch_succeeds(world: &PipelineWorld) -> Result<(), eyre::Report> {
    if let Err(err) = last_patch(world)? {
        return Err(eyre::eyre!("expected the patch to succeed, got {err}"));
    }
    Ok(())
}

#[then("the patch fails with an invalid transition")]
fn patch_fails_with_invalid_transition(world: &PipelineWorld) -> Result<(), eyre::Report> {
    let result = last_patch(world)?;
    let kind = result.as_ref().err().map(TaskLifecycleError::kind);
    if kind != Some(ErrorKind::InvalidTransition) {
        return Err(eyre::eyre!(
            "expected an invalid transition error, got {result:?}"
        ));
    }
    Ok(())
}

#[then("the patch fails with an invalid status")]
fn patch_fails_with_invalid_status(world: &PipelineWorld) -> Result<(), eyre::Report> {
    let result = last_patch(world)?;
    if !matches!(result, Err(TaskLifecycleError::InvalidStatus(_))) {
        return Err(eyre::eyre!("expected an invalid status error, got {result:?}"));
    }
    Ok(())
}

#[then(r#"task "{name}" has {count:usize} run"#)]
fn task_has_runs(world: &PipelineWorld, name: String, count: usize) -> Result<(), eyre::Report> {
    let task = stored_task(world, &name)?;
    if task.runs().len() != count {
        return Err(eyre::eyre!(
            "expected {count} runs for task {name}, found {}",
            task.runs().len()
        ));
    }
    Ok(())
}
