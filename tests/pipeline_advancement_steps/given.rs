//! Given steps for pipeline advancement BDD scenarios.

use super::world::{ACTOR, PIPELINE, PipelineWorld, WORKSPACE, run_async};
use eyre::WrapErr;
use pipewright::task::services::CreateTaskRequest;
use rstest_bdd_macros::given;

fn create_named_task(
    world: &mut PipelineWorld,
    name: String,
    stage: i64,
    database: i64,
    when: &str,
) -> Result<(), eyre::Report> {
    let request = CreateTaskRequest::new(name.as_str(), ACTOR)
        .in_workspace(WORKSPACE)
        .in_pipeline(PIPELINE)
        .in_stage(stage)
        .on_database(database)
        .with_when(when);
    let created = run_async(world.service.create_task(request))
        .wrap_err_with(|| format!("create task {name} for scenario"))?;
    world.tasks.insert(name, created.id());
    Ok(())
}

#[given(r#"a task "{name}" in stage {stage:i64} on database {database:i64}"#)]
fn automatic_task(
    world: &mut PipelineWorld,
    name: String,
    stage: i64,
    database: i64,
) -> Result<(), eyre::Report> {
    create_named_task(world, name, stage, database, "ON_SUCCESS")
}

#[given(r#"a manual task "{name}" in stage {stage:i64} on database {database:i64}"#)]
fn manual_task(
    world: &mut PipelineWorld,
    name: String,
    stage: i64,
    database: i64,
) -> Result<(), eyre::Report> {
    create_named_task(world, name, stage, database, "MANUAL")
}

#[given("the pipeline has been started")]
fn pipeline_started(world: &mut PipelineWorld) -> Result<(), eyre::Report> {
    run_async(world.service.start_pipeline(PIPELINE, ACTOR))
        .wrap_err("start pipeline for scenario")?;
    Ok(())
}
