//! Task and task run lifecycle statuses.

use super::{ParseTaskRunStatusError, ParseTaskStatusError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task has been created and is waiting to be started.
    Pending,
    /// Task has an active run.
    Running,
    /// Task finished successfully.
    Done,
    /// Task run reported a failure.
    Failed,
    /// Task run was canceled.
    Canceled,
    /// Task was skipped manually.
    Skipped,
}

impl TaskStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Running,
        Self::Done,
        Self::Failed,
        Self::Canceled,
        Self::Skipped,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::Skipped => "SKIPPED",
        }
    }

    /// Returns `true` when no automatic transition leaves this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Done | Self::Failed | Self::Canceled | Self::Skipped
        )
    }

    /// Returns `true` when the status counts toward stage completion.
    ///
    /// `FAILED` and `CANCELED` are terminal but halt the pipeline until the
    /// task is retried or skipped.
    #[must_use]
    pub const fn is_progressing(self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }

    /// Returns `true` when moving from `self` to `target` is a legal change.
    ///
    /// Re-applying the current status is not a transition and returns
    /// `false`; callers treat it as an idempotent no-op.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Done | Self::Failed | Self::Canceled)
                | (Self::Pending | Self::Failed | Self::Canceled, Self::Skipped)
                | (Self::Failed | Self::Canceled, Self::Running)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            "SKIPPED" => Ok(Self::Skipped),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

/// Status of a single execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskRunStatus {
    /// The run is executing.
    Running,
    /// The run completed successfully.
    Done,
    /// The run failed.
    Failed,
    /// The run was canceled.
    Canceled,
}

impl TaskRunStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }

    /// Returns `true` once the run can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns `true` when moving from `self` to `target` is legal.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(self, Self::Running) && target.is_terminal()
    }

    /// Returns the run status that mirrors a task leaving `RUNNING` for
    /// `status`, if any.
    #[must_use]
    pub const fn closing(status: TaskStatus) -> Option<Self> {
        match status {
            TaskStatus::Done => Some(Self::Done),
            TaskStatus::Failed => Some(Self::Failed),
            TaskStatus::Canceled => Some(Self::Canceled),
            TaskStatus::Pending | TaskStatus::Running | TaskStatus::Skipped => None,
        }
    }
}

impl fmt::Display for TaskRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskRunStatus {
    type Error = ParseTaskRunStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "RUNNING" => Ok(Self::Running),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            _ => Err(ParseTaskRunStatusError(value.to_owned())),
        }
    }
}
