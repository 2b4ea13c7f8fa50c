//! Task lifecycle and pipeline advancement.
//!
//! A task belongs to exactly one stage of a pipeline and moves through the
//! `PENDING -> RUNNING -> DONE | FAILED | CANCELED` lifecycle, with `SKIPPED`
//! as a manual escape hatch. Every execution attempt is recorded as a task
//! run. Whenever a task reaches `DONE` or `SKIPPED` the owning stage is
//! re-evaluated and, once every member task has progressed, the next stage's
//! automatically triggered tasks are started. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
