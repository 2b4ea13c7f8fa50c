//! Execution attempts recorded against a task.

use super::{PrincipalId, TaskRunId, TaskRunStatus};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// One execution attempt of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRun {
    id: TaskRunId,
    attempt: u32,
    status: TaskRunStatus,
    creator_id: PrincipalId,
    updater_id: PrincipalId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskRunData {
    /// Persisted run identifier.
    pub id: TaskRunId,
    /// Persisted 1-based attempt number.
    pub attempt: u32,
    /// Persisted run status.
    pub status: TaskRunStatus,
    /// Principal that started the run.
    pub creator_id: PrincipalId,
    /// Principal that last updated the run.
    pub updater_id: PrincipalId,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TaskRun {
    /// Starts a new run in [`TaskRunStatus::Running`].
    pub(super) fn start(
        id: TaskRunId,
        attempt: u32,
        creator_id: PrincipalId,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id,
            attempt,
            status: TaskRunStatus::Running,
            creator_id,
            updater_id: creator_id,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a run from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskRunData) -> Self {
        Self {
            id: data.id,
            attempt: data.attempt,
            status: data.status,
            creator_id: data.creator_id,
            updater_id: data.updater_id,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the run identifier.
    #[must_use]
    pub const fn id(&self) -> TaskRunId {
        self.id
    }

    /// Returns the 1-based attempt number.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the run status.
    #[must_use]
    pub const fn status(&self) -> TaskRunStatus {
        self.status
    }

    /// Returns `true` while the run has not reached a terminal status.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Returns the principal that started the run.
    #[must_use]
    pub const fn creator_id(&self) -> PrincipalId {
        self.creator_id
    }

    /// Returns the principal that last updated the run.
    #[must_use]
    pub const fn updater_id(&self) -> PrincipalId {
        self.updater_id
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Records a validated status change.
    pub(super) fn finish(
        &mut self,
        status: TaskRunStatus,
        updater_id: PrincipalId,
        clock: &impl Clock,
    ) {
        self.status = status;
        self.updater_id = updater_id;
        self.updated_at = clock.utc();
    }
}
