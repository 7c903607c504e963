//! Shared type definitions for the chainrun workspace.
//!
//! The plan schema, the run event model, and the aggregate execution result
//! live here so the engine, the store, and the CLI all speak the same types.

pub mod event;
pub mod plan;

pub use event::{ExecutionResult, RunEvent, Verdict};
pub use plan::{Plan, Step, ValidationError};
