//! Query filters for task lookup.

use super::{PipelineId, StageId, Task, TaskId, WorkspaceId};
use serde::Serialize;
use std::fmt;

/// Conjunctive task filter.
///
/// Unset fields match every task; set fields must all match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskFilter {
    /// Task identifier.
    pub id: Option<TaskId>,
    /// Owning workspace.
    pub workspace_id: Option<WorkspaceId>,
    /// Owning pipeline.
    pub pipeline_id: Option<PipelineId>,
    /// Owning stage.
    pub stage_id: Option<StageId>,
}

impl TaskFilter {
    /// Creates a filter that matches every task.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter for a single task identifier.
    #[must_use]
    pub fn by_id(id: TaskId) -> Self {
        Self::new().with_id(id)
    }

    /// Restricts the filter to one task identifier.
    #[must_use]
    pub const fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    /// Restricts the filter to one workspace.
    #[must_use]
    pub const fn with_workspace(mut self, workspace_id: WorkspaceId) -> Self {
        self.workspace_id = Some(workspace_id);
        self
    }

    /// Restricts the filter to one pipeline.
    #[must_use]
    pub const fn with_pipeline(mut self, pipeline_id: PipelineId) -> Self {
        self.pipeline_id = Some(pipeline_id);
        self
    }

    /// Restricts the filter to one stage.
    #[must_use]
    pub const fn with_stage(mut self, stage_id: StageId) -> Self {
        self.stage_id = Some(stage_id);
        self
    }

    /// Returns `true` when every set field matches the task.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.id.is_none_or(|id| id == task.id())
            && self
                .workspace_id
                .is_none_or(|workspace_id| workspace_id == task.workspace_id())
            && self
                .pipeline_id
                .is_none_or(|pipeline_id| pipeline_id == task.pipeline_id())
            && self
                .stage_id
                .is_none_or(|stage_id| stage_id == task.stage_id())
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(err) => write!(f, "{err}"),
        }
    }
}
