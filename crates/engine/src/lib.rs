//! Execution engine for declarative tool plans.
//!
//! A [`chainrun_types::Plan`] is a linear sequence of steps. Each step names a
//! tool from a [`ToolRegistry`], binds its arguments against the outputs of
//! earlier steps, and may be guarded by `run_if` / flagged by `intervention_if`
//! conditions. The orchestrator in [`executor`] walks the steps in order and
//! streams [`chainrun_types::RunEvent`]s over an unbounded channel so callers
//! can render progress live or drain the stream into a final
//! [`chainrun_types::ExecutionResult`].

pub mod condition;
pub mod error;
pub mod executor;
pub mod resolve;
pub mod tool;

pub use condition::evaluate_condition;
pub use error::EngineError;
pub use executor::{execute_plan, run_plan};
pub use resolve::{ExecutionContext, bind_args, resolve_reference};
pub use tool::{Tool, ToolRegistry};
