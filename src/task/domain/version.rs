//! Migration version tokens for schema update tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `strftime` layout of a migration version: UTC time to the second.
pub const MIGRATION_VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

/// Version token shared by every database in one logical migration.
///
/// Tokens are fixed-width digit strings, so lexical order matches
/// chronological order. Two migrations issued within the same second in the
/// same workspace produce the same token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationVersion(String);

impl MigrationVersion {
    /// Formats the version for the given instant.
    #[must_use]
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant.format(MIGRATION_VERSION_FORMAT).to_string())
    }

    /// Returns the version as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for MigrationVersion {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
