//! Identifier source port.

use uuid::Uuid;

/// Source of fresh identifiers for tasks and task runs.
///
/// Production code draws random identifiers; tests inject a deterministic
/// source so that identifier order is reproducible.
#[cfg_attr(test, mockall::automock)]
pub trait IdSource: Send + Sync {
    /// Returns an identifier that has not been returned before.
    fn next_uuid(&self) -> Uuid;
}
