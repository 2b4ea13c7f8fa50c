//! Diesel row models for task persistence.

use super::schema::{task_runs, tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Internal task identifier.
    pub id: uuid::Uuid,
    /// Owning workspace.
    pub workspace_id: i64,
    /// Owning pipeline.
    pub pipeline_id: i64,
    /// Stage position.
    pub stage_id: i64,
    /// Target database.
    pub database_id: i64,
    /// Task name.
    pub name: String,
    /// Task type.
    pub task_type: String,
    /// Trigger condition.
    pub trigger_when: String,
    /// Tagged payload JSON.
    pub payload: Value,
    /// Lifecycle status.
    pub status: String,
    /// Creating principal.
    pub creator_id: i64,
    /// Latest updating principal.
    pub updater_id: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTaskRow {
    /// Internal task identifier.
    pub id: uuid::Uuid,
    /// Owning workspace.
    pub workspace_id: i64,
    /// Owning pipeline.
    pub pipeline_id: i64,
    /// Stage position.
    pub stage_id: i64,
    /// Target database.
    pub database_id: i64,
    /// Task name.
    pub name: String,
    /// Task type.
    pub task_type: String,
    /// Trigger condition.
    pub trigger_when: String,
    /// Tagged payload JSON.
    pub payload: Value,
    /// Lifecycle status.
    pub status: String,
    /// Creating principal.
    pub creator_id: i64,
    /// Latest updating principal.
    pub updater_id: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Row model for task run records, used for both reads and upserts.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = task_runs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRunRow {
    /// Internal run identifier.
    pub id: uuid::Uuid,
    /// Owning task.
    pub task_id: uuid::Uuid,
    /// 1-based attempt number.
    pub attempt: i32,
    /// Run status.
    pub status: String,
    /// Principal that started the run.
    pub creator_id: i64,
    /// Latest updating principal.
    pub updater_id: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
