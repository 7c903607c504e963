//! Error taxonomy for the execution engine.

use chainrun_types::ValidationError;

/// Everything that can go wrong while preparing or driving a plan run.
///
/// Structural problems ([`EngineError::Validation`]) are surfaced before any
/// event is emitted; the remaining variants describe per-step failures and are
/// folded into the event stream by the orchestrator rather than returned to
/// the caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The plan failed structural validation before execution started.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A step turned out to have a blank id or tool name at execution time.
    #[error("invalid step at index {index}: missing id or tool")]
    StepDefinition { index: usize },

    /// The step named a tool the registry does not know.
    #[error("tool '{tool}' not found in collection")]
    ToolNotFound { tool: String },

    /// The tool ran and reported failure. `message` is the tool's own error
    /// text, kept verbatim so it can be surfaced unchanged in the run result.
    #[error("tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// A `run_if` or `intervention_if` expression could not be parsed.
    #[error("failed to evaluate condition '{expression}': {message}")]
    Condition { expression: String, message: String },

    #[error("{0}")]
    Internal(String),
}
