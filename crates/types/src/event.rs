//! Lifecycle events and the aggregate execution result.
//!
//! Every run emits exactly one `START` event first and one `FINISH` event
//! last; in between, each step contributes a `STEP_START` followed by exactly
//! one of `STEP_SKIPPED`, `STEP_COMPLETE` (optionally preceded by
//! `INTERVENTION_NEEDED`), or `ERROR`. Events are immutable once created and
//! are produced by a single producer in plan-declaration order, so consumers
//! may treat `FINISH` as end-of-stream.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

/// Final classification of a plan run.
///
/// `Unknown` is the pre-run sentinel only; a validated, non-empty plan always
/// terminates with one of the other three verdicts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Every step either completed or was skipped by its guard.
    Success,
    /// A fatal error aborted the run.
    Failure,
    /// At least one `intervention_if` guard fired and nothing was fatal.
    InterventionNeeded,
    /// Pre-run sentinel; never terminal for a validated plan.
    Unknown,
}

/// A single lifecycle event emitted during plan execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunEvent {
    /// Execution is beginning.
    Start {
        /// Identifier of the plan being executed, when it has one.
        plan_id: Option<String>,
        /// Wall-clock time the run began.
        at: DateTime<Utc>,
    },
    /// A step is about to be evaluated.
    StepStart {
        /// Zero-based position of the step in the plan.
        step_index: usize,
        /// Identifier of the step.
        step_id: String,
        /// Tool the step names.
        tool: String,
        /// Human-readable progress line.
        message: String,
    },
    /// A step's guard declined to run it.
    StepSkipped {
        /// Identifier of the skipped step.
        step_id: String,
        /// Why the step did not run.
        reason: String,
    },
    /// A step's tool returned and its output entered the context.
    StepComplete {
        /// Identifier of the completed step.
        step_id: String,
        /// The tool's structured output.
        output: Value,
        /// Point-in-time deep copy of the full context after this step.
        context_snapshot: JsonMap<String, Value>,
    },
    /// A fatal condition aborted the run.
    Error {
        /// Identifier of the step where the failure occurred.
        step_id: String,
        /// Error message, captured verbatim.
        error: String,
        /// Supporting detail such as the tool name and bound arguments.
        details: Option<String>,
    },
    /// An `intervention_if` guard fired; the run continues.
    InterventionNeeded {
        /// Identifier of the triggering step.
        step_id: String,
        /// Why intervention is warranted.
        reason: String,
        /// The step output that satisfied the guard.
        output: Value,
    },
    /// Execution ended; always the final event.
    Finish {
        /// Final verdict for the run.
        verdict: Verdict,
        /// Full context at the end of the run.
        final_context: JsonMap<String, Value>,
        /// Total execution time in milliseconds.
        duration_ms: u64,
        /// Number of steps that completed (skipped steps do not count).
        steps_completed: usize,
        /// Outputs of steps flagged `key_finding`, keyed by step id.
        critical_findings: IndexMap<String, Value>,
        /// Error message when the verdict is `Failure`.
        error: Option<String>,
        /// Last intervention reason when any guard fired.
        intervention_reason: Option<String>,
        /// Wall-clock time the run ended.
        at: DateTime<Utc>,
    },
}

impl RunEvent {
    /// Returns the event's wire tag, matching its serialized `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "START",
            Self::StepStart { .. } => "STEP_START",
            Self::StepSkipped { .. } => "STEP_SKIPPED",
            Self::StepComplete { .. } => "STEP_COMPLETE",
            Self::Error { .. } => "ERROR",
            Self::InterventionNeeded { .. } => "INTERVENTION_NEEDED",
            Self::Finish { .. } => "FINISH",
        }
    }

    /// True when this event terminates the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. })
    }
}

/// Aggregate outcome of a plan run, built from the terminal `FINISH` event
/// once the stream has been fully drained.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    /// Final verdict.
    pub verdict: Verdict,
    /// Final context: every completed step's output keyed by step id.
    pub outputs: JsonMap<String, Value>,
    /// The complete ordered event log.
    pub events: Vec<RunEvent>,
    /// Total execution time in milliseconds.
    pub duration_ms: u64,
    /// Number of steps that completed.
    pub steps_completed: usize,
    /// Outputs of steps flagged `key_finding`, keyed by step id.
    pub critical_findings: IndexMap<String, Value>,
    /// Error message when the run failed.
    pub error: Option<String>,
    /// Last intervention reason when any guard fired.
    pub intervention_reason: Option<String>,
}

impl ExecutionResult {
    /// Builds the aggregate result from a drained event log.
    ///
    /// The terminal `FINISH` event carries everything the result needs; the
    /// log is retained in full for consumers that replay it. Returns `None`
    /// when the log does not end with `FINISH`.
    pub fn from_events(events: Vec<RunEvent>) -> Option<Self> {
        let Some(RunEvent::Finish {
            verdict,
            final_context,
            duration_ms,
            steps_completed,
            critical_findings,
            error,
            intervention_reason,
            ..
        }) = events.last().cloned()
        else {
            return None;
        };

        Some(Self {
            verdict,
            outputs: final_context,
            events,
            duration_ms,
            steps_completed,
            critical_findings,
            error,
            intervention_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_serialize_with_screaming_type_tags() {
        let event = RunEvent::StepSkipped {
            step_id: "s2".into(),
            reason: "condition not met: $s1.flag".into(),
        };
        let value = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(value["type"], "STEP_SKIPPED");
        assert_eq!(value["step_id"], "s2");
        assert_eq!(event.kind(), "STEP_SKIPPED");
    }

    #[test]
    fn verdict_round_trips_screaming_snake_case() {
        let text = serde_json::to_string(&Verdict::InterventionNeeded).expect("serialize verdict");
        assert_eq!(text, "\"INTERVENTION_NEEDED\"");
        let parsed: Verdict = serde_json::from_str(&text).expect("deserialize verdict");
        assert_eq!(parsed, Verdict::InterventionNeeded);
    }

    #[test]
    fn result_is_built_from_terminal_finish_event() {
        let mut context = JsonMap::new();
        context.insert("s1".into(), json!({"level": 14.5}));

        let events = vec![
            RunEvent::Start {
                plan_id: Some("demo".into()),
                at: Utc::now(),
            },
            RunEvent::Finish {
                verdict: Verdict::Success,
                final_context: context.clone(),
                duration_ms: 12,
                steps_completed: 1,
                critical_findings: IndexMap::new(),
                error: None,
                intervention_reason: None,
                at: Utc::now(),
            },
        ];

        let result = ExecutionResult::from_events(events).expect("finish event present");
        assert_eq!(result.verdict, Verdict::Success);
        assert_eq!(result.outputs, context);
        assert_eq!(result.steps_completed, 1);
        assert_eq!(result.events.len(), 2);
    }

    #[test]
    fn result_requires_a_finish_event() {
        let events = vec![RunEvent::Start {
            plan_id: None,
            at: Utc::now(),
        }];
        assert!(ExecutionResult::from_events(events).is_none());
    }
}
