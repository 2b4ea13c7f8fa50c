//! Task classification, trigger conditions, and payloads.

use super::{MigrationVersion, ParseTaskTypeError, ParseTaskWhenError, TaskDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    /// Generic work item with no structured payload.
    #[serde(rename = "bb.task.general")]
    General,
    /// Schema change applied to a target database.
    #[serde(rename = "bb.task.database.schema.update")]
    DatabaseSchemaUpdate,
}

impl TaskType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "bb.task.general",
            Self::DatabaseSchemaUpdate => "bb.task.database.schema.update",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskType {
    type Error = ParseTaskTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "bb.task.general" => Ok(Self::General),
            "bb.task.database.schema.update" => Ok(Self::DatabaseSchemaUpdate),
            _ => Err(ParseTaskTypeError(value.to_owned())),
        }
    }
}

/// Condition under which a pending task is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskWhen {
    /// Started automatically once the preceding stage has passed.
    OnSuccess,
    /// Started only by an explicit status patch.
    Manual,
}

impl TaskWhen {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnSuccess => "ON_SUCCESS",
            Self::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for TaskWhen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskWhen {
    type Error = ParseTaskWhenError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "ON_SUCCESS" => Ok(Self::OnSuccess),
            "MANUAL" => Ok(Self::Manual),
            _ => Err(ParseTaskWhenError(value.to_owned())),
        }
    }
}

/// Forward and rollback SQL carried by a schema update task.
///
/// The statements are opaque here; execution happens outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaUpdatePayload {
    sql: String,
    #[serde(default)]
    rollback_sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema_version: Option<MigrationVersion>,
}

impl SchemaUpdatePayload {
    /// Creates a payload from forward and rollback statements.
    #[must_use]
    pub fn new(sql: impl Into<String>, rollback_sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            rollback_sql: rollback_sql.into(),
            schema_version: None,
        }
    }

    /// Stamps the payload with a migration version.
    #[must_use]
    pub fn with_schema_version(mut self, version: MigrationVersion) -> Self {
        self.schema_version = Some(version);
        self
    }

    /// Returns the forward SQL.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the rollback SQL.
    #[must_use]
    pub fn rollback_sql(&self) -> &str {
        &self.rollback_sql
    }

    /// Returns the migration version, if stamped.
    #[must_use]
    pub const fn schema_version(&self) -> Option<&MigrationVersion> {
        self.schema_version.as_ref()
    }
}

/// Task type together with the payload it requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskPayload {
    /// Generic task.
    #[serde(rename = "bb.task.general")]
    General,
    /// Schema update task with its SQL payload.
    #[serde(rename = "bb.task.database.schema.update")]
    DatabaseSchemaUpdate(SchemaUpdatePayload),
}

impl TaskPayload {
    /// Decodes a payload for the given task type from raw JSON bytes.
    ///
    /// General tasks carry no structured payload and ignore `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::MissingPayload`] when a schema update has
    /// no payload, or [`TaskDomainError::InvalidPayload`] when it does not
    /// decode to forward and rollback SQL.
    pub fn decode(task_type: TaskType, raw: Option<&[u8]>) -> Result<Self, TaskDomainError> {
        match task_type {
            TaskType::General => Ok(Self::General),
            TaskType::DatabaseSchemaUpdate => {
                let bytes = raw.ok_or(TaskDomainError::MissingPayload(task_type))?;
                let payload = serde_json::from_slice::<SchemaUpdatePayload>(bytes)
                    .map_err(|err| TaskDomainError::InvalidPayload(err.to_string()))?;
                Ok(Self::DatabaseSchemaUpdate(payload))
            }
        }
    }

    /// Returns the task type this payload belongs to.
    #[must_use]
    pub const fn task_type(&self) -> TaskType {
        match self {
            Self::General => TaskType::General,
            Self::DatabaseSchemaUpdate(_) => TaskType::DatabaseSchemaUpdate,
        }
    }

    /// Returns the schema update payload, if this is a schema update.
    #[must_use]
    pub const fn schema_update(&self) -> Option<&SchemaUpdatePayload> {
        match self {
            Self::General => None,
            Self::DatabaseSchemaUpdate(payload) => Some(payload),
        }
    }
}
