//! Adapter implementations for task lifecycle ports.

pub mod ids;
pub mod memory;
pub mod postgres;
