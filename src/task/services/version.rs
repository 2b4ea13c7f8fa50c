//! Migration version generation.

use crate::task::domain::MigrationVersion;
use mockable::Clock;
use std::sync::Arc;

/// Issues migration versions from the injected clock.
///
/// Callers applying one migration to several databases must request a
/// single version and share it, rather than calling
/// [`next_version`](Self::next_version) once per database.
#[derive(Debug)]
pub struct VersionGenerator<C> {
    clock: Arc<C>,
}

impl<C: Clock> VersionGenerator<C> {
    /// Creates a generator reading from `clock`.
    #[must_use]
    pub const fn new(clock: Arc<C>) -> Self {
        Self { clock }
    }

    /// Returns the version for the current second.
    #[must_use]
    pub fn next_version(&self) -> MigrationVersion {
        MigrationVersion::at(self.clock.utc())
    }
}

impl<C> Clone for VersionGenerator<C> {
    fn clone(&self) -> Self {
        Self {
            clock: Arc::clone(&self.clock),
        }
    }
}
