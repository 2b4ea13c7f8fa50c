//! Domain model for task lifecycle management.
//!
//! The task domain models task placement within a pipeline, the status
//! state machine, execution runs, and migration versioning while keeping
//! all infrastructure concerns outside of the domain boundary.

mod error;
mod filter;
mod ids;
mod payload;
mod run;
mod status;
mod task;
mod version;

pub use error::{
    ParseTaskRunStatusError, ParseTaskStatusError, ParseTaskTypeError, ParseTaskWhenError,
    TaskDomainError,
};
pub use filter::TaskFilter;
pub use ids::{DatabaseId, PipelineId, PrincipalId, StageId, TaskId, TaskName, TaskRunId, WorkspaceId};
pub use payload::{SchemaUpdatePayload, TaskPayload, TaskType, TaskWhen};
pub use run::{PersistedTaskRunData, TaskRun};
pub use status::{TaskRunStatus, TaskStatus};
pub use task::{
    NewTaskData, PersistedTaskData, StatusChange, Task, TaskPlacement, TaskRunUpdate,
    TransitionOutcome,
};
pub use version::{MIGRATION_VERSION_FORMAT, MigrationVersion};
