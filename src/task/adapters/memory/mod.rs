//! In-memory adapters for task lifecycle tests and embedded use.

mod task;

pub use task::InMemoryTaskRepository;
