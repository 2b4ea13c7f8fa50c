//! Port contracts for task lifecycle management.
//!
//! Ports define infrastructure-agnostic interfaces used by task services.

pub mod id_source;
pub mod repository;

pub use id_source::IdSource;
#[cfg(test)]
pub use id_source::MockIdSource;
pub use repository::{TaskRepository, TaskRepositoryError, TaskRepositoryResult, TaskTransaction};
