//! Pipewright: staged execution of database-change tasks.
//!
//! This crate tracks tasks that carry database changes (schema migrations
//! and general work items) through an ordered pipeline of stages. It owns
//! the task status state machine and the engine that decides when a stage
//! has passed and the next one may start.
//!
//! # Architecture
//!
//! Pipewright follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, identifiers)
//!
//! # Modules
//!
//! - [`task`]: Task creation, status patching, and pipeline advancement

pub mod task;
