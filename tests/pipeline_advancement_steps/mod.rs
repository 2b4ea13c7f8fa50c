//! Step definitions for pipeline advancement scenarios.

pub mod given;
pub mod then;
