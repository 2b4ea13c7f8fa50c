//! Application services for task lifecycle orchestration.

mod advancer;
mod error;
mod lifecycle;
mod version;

pub use advancer::{Advancement, PipelineAdvancer, earlier_stages_passed, stage_passed};
pub use error::{ErrorKind, TaskLifecycleError, TaskLifecycleResult};
pub use lifecycle::{
    CreateTaskRequest, CreateTenantMigrationRequest, PatchTaskStatusRequest, TaskLifecycleService,
};
pub use version::VersionGenerator;
