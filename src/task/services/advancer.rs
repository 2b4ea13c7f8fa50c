//! Stage completion checks and activation of downstream tasks.

use super::TaskLifecycleResult;
use crate::task::{
    domain::{PipelineId, PrincipalId, StageId, StatusChange, Task, TaskRunId, TaskStatus},
    ports::{IdSource, TaskTransaction},
};
use mockable::Clock;
use tracing::{debug, info};

/// Returns `true` when a stage has passed.
///
/// A stage passes once it has at least one task and every task is `DONE`
/// or `SKIPPED`. A single `FAILED` or `CANCELED` task holds the stage back.
#[must_use]
pub fn stage_passed(tasks: &[Task]) -> bool {
    !tasks.is_empty() && tasks.iter().all(|task| task.status().is_progressing())
}

/// Locks every stage of a pipeline below `stage_id`, lowest first, and
/// reports whether all of them have passed.
///
/// Stops at the first stage that has not passed. A pipeline only moves past
/// `stage_id` when this returns `true`, so a `FAILED` or `CANCELED` task
/// anywhere upstream keeps later stages idle.
///
/// # Errors
///
/// Returns the repository error raised while reading or locking a stage.
pub fn earlier_stages_passed(
    transaction: &mut dyn TaskTransaction,
    pipeline_id: PipelineId,
    stage_id: StageId,
) -> TaskLifecycleResult<bool> {
    let stages = transaction.pipeline_stages(pipeline_id)?;
    for earlier in stages.into_iter().take_while(|earlier| *earlier < stage_id) {
        if !stage_passed(&transaction.lock_stage(pipeline_id, earlier)?) {
            debug!(
                pipeline_id = %pipeline_id,
                stage_id = %stage_id,
                held_by = %earlier,
                "earlier stage has not passed"
            );
            return Ok(false);
        }
    }
    Ok(true)
}

/// Stages passed and tasks started during one advancement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advancement {
    /// Stages found passed, in ascending order.
    pub passed_stages: Vec<StageId>,
    /// Tasks moved from `PENDING` to `RUNNING`, by stage then task
    /// identifier.
    pub activated: Vec<Task>,
}

/// Moves a pipeline forward once its stages pass.
///
/// Runs inside the caller's [`TaskTransaction`], so the stage read and the
/// activations commit together with the patch that triggered them.
pub struct PipelineAdvancer<'a, C, I: ?Sized> {
    clock: &'a C,
    ids: &'a I,
    actor: PrincipalId,
}

impl<'a, C, I> PipelineAdvancer<'a, C, I>
where
    C: Clock,
    I: IdSource + ?Sized,
{
    /// Creates an advancer that records activations as made by `actor`.
    #[must_use]
    pub const fn new(clock: &'a C, ids: &'a I, actor: PrincipalId) -> Self {
        Self { clock, ids, actor }
    }

    /// Re-evaluates a stage after one of its tasks reached `DONE` or
    /// `SKIPPED`, and starts the following stage when it and every stage
    /// before it have passed.
    ///
    /// # Errors
    ///
    /// Returns the repository or domain error that stopped the walk; the
    /// enclosing transaction is then rolled back.
    pub fn on_task_progressed(
        &self,
        transaction: &mut dyn TaskTransaction,
        pipeline_id: PipelineId,
        stage_id: StageId,
    ) -> TaskLifecycleResult<Advancement> {
        if !earlier_stages_passed(transaction, pipeline_id, stage_id)? {
            return Ok(Advancement::default());
        }
        let members = transaction.lock_stage(pipeline_id, stage_id)?;
        if !stage_passed(&members) {
            debug!(
                pipeline_id = %pipeline_id,
                stage_id = %stage_id,
                "stage has not passed yet"
            );
            return Ok(Advancement::default());
        }

        info!(pipeline_id = %pipeline_id, stage_id = %stage_id, "stage passed");
        let mut advancement = Advancement {
            passed_stages: vec![stage_id],
            activated: Vec::new(),
        };
        self.walk(transaction, pipeline_id, Some(stage_id), &mut advancement)?;
        Ok(advancement)
    }

    /// Starts the automatically triggered tasks of the lowest stage that has
    /// not passed.
    ///
    /// # Errors
    ///
    /// Returns the repository or domain error that stopped the walk.
    pub fn start(
        &self,
        transaction: &mut dyn TaskTransaction,
        pipeline_id: PipelineId,
    ) -> TaskLifecycleResult<Advancement> {
        let mut advancement = Advancement::default();
        self.walk(transaction, pipeline_id, None, &mut advancement)?;
        Ok(advancement)
    }

    /// Visits stages after `after` in ascending order, activating each one
    /// and continuing only while the visited stage has already passed.
    fn walk(
        &self,
        transaction: &mut dyn TaskTransaction,
        pipeline_id: PipelineId,
        after: Option<StageId>,
        advancement: &mut Advancement,
    ) -> TaskLifecycleResult<()> {
        let stages = transaction.pipeline_stages(pipeline_id)?;
        for stage_id in stages
            .into_iter()
            .filter(|stage_id| after.is_none_or(|floor| *stage_id > floor))
        {
            if !self.activate_stage(transaction, pipeline_id, stage_id, advancement)? {
                break;
            }
            advancement.passed_stages.push(stage_id);
        }
        Ok(())
    }

    /// Starts every pending `ON_SUCCESS` task of a stage.
    ///
    /// Returns `true` when the stage had nothing to start and has already
    /// passed.
    fn activate_stage(
        &self,
        transaction: &mut dyn TaskTransaction,
        pipeline_id: PipelineId,
        stage_id: StageId,
        advancement: &mut Advancement,
    ) -> TaskLifecycleResult<bool> {
        let members = transaction.lock_stage(pipeline_id, stage_id)?;
        let mut started = 0_usize;
        for member in members.iter().filter(|task| task.is_auto_activatable()) {
            let mut task = member.clone();
            let expected = task.status();
            task.transition_to(
                StatusChange::new(TaskStatus::Running, self.actor),
                || TaskRunId::from_uuid(self.ids.next_uuid()),
                self.clock,
            )?;
            transaction.save(&task, expected)?;
            info!(
                task_id = %task.id(),
                pipeline_id = %pipeline_id,
                stage_id = %stage_id,
                "activated task"
            );
            advancement.activated.push(task);
            started += 1;
        }

        if started > 0 {
            return Ok(false);
        }
        Ok(stage_passed(&members))
    }
}
