//! The step orchestrator.
//!
//! [`drive_plan_run`] walks a validated plan step by step and pushes
//! [`RunEvent`]s into an unbounded channel as it goes. Exactly one `START`
//! and one `FINISH` are emitted per run, with one `STEP_START` per attempted
//! step in between. [`run_plan`] spawns the driver and hands back the
//! receiving end; [`execute_plan`] drains the stream into a final
//! [`ExecutionResult`] for callers that only want the outcome.
//!
//! If every receiver of the stream is dropped mid-run, the driver stops
//! before starting the next step. Steps already in flight run to completion;
//! nothing is interrupted mid-invocation.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use chainrun_types::{ExecutionResult, Plan, RunEvent, Step, Verdict};

use crate::condition::evaluate_condition;
use crate::error::EngineError;
use crate::resolve::{ExecutionContext, bind_args};
use crate::tool::ToolRegistry;

/// Validates `plan` and spawns its run on the current runtime, returning the
/// event stream. The first event is always `START`; the stream ends after
/// `FINISH`.
pub fn run_plan(
    plan: &Plan,
    registry: Arc<ToolRegistry>,
) -> Result<UnboundedReceiver<RunEvent>, EngineError> {
    plan.validate()?;
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let plan = plan.clone();
    tokio::spawn(drive_plan_run(plan, registry, event_tx));
    Ok(event_rx)
}

/// Runs `plan` to completion and returns the summarized result, discarding
/// the intermediate event stream.
pub async fn execute_plan(
    plan: &Plan,
    registry: Arc<ToolRegistry>,
) -> Result<ExecutionResult, EngineError> {
    let mut event_rx = run_plan(plan, registry)?;
    let mut events = Vec::new();
    while let Some(event) = event_rx.recv().await {
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }
    ExecutionResult::from_events(events)
        .ok_or_else(|| EngineError::Internal("event stream ended without a FINISH event".into()))
}

/// Drives one plan run, emitting events on `event_tx`.
///
/// The plan is assumed to have passed [`Plan::validate`]; blank step fields
/// are still re-checked here so a hand-built plan fails loudly instead of
/// invoking a nameless tool.
pub async fn drive_plan_run(
    plan: Plan,
    registry: Arc<ToolRegistry>,
    event_tx: UnboundedSender<RunEvent>,
) {
    let started_at = Instant::now();
    let mut context = ExecutionContext::new();
    let mut critical_findings: IndexMap<String, Value> = IndexMap::new();
    let mut verdict = Verdict::Unknown;
    let mut final_error: Option<String> = None;
    let mut intervention_reason: Option<String> = None;
    let mut steps_completed = 0usize;

    if event_tx
        .send(RunEvent::Start {
            plan_id: plan.id.clone().or_else(|| plan.name.clone()),
            at: Utc::now(),
        })
        .is_err()
    {
        return;
    }

    for (step_index, step) in plan.steps.iter().enumerate() {
        // Receiver gone means nobody is listening anymore.
        if event_tx.is_closed() {
            tracing::debug!(plan_id = %plan.display_id(), step_index, "event stream closed, abandoning run");
            return;
        }

        if step.id.trim().is_empty() || step.tool.trim().is_empty() {
            let error = EngineError::StepDefinition { index: step_index }.to_string();
            verdict = Verdict::Failure;
            final_error = Some(error.clone());
            let _ = event_tx.send(RunEvent::Error {
                step_id: format!("step_{step_index}"),
                error,
                details: step_details(step, None),
            });
            break;
        }

        let _ = event_tx.send(RunEvent::StepStart {
            step_index,
            step_id: step.id.clone(),
            tool: step.tool.clone(),
            message: step_start_message(step),
        });

        if let Some(run_if) = guard(&step.run_if) {
            match evaluate_condition(run_if, &context) {
                Ok(true) => {}
                Ok(false) => {
                    let _ = event_tx.send(RunEvent::StepSkipped {
                        step_id: step.id.clone(),
                        reason: format!("condition not met: {run_if}"),
                    });
                    continue;
                }
                Err(err) => {
                    let _ = event_tx.send(RunEvent::StepSkipped {
                        step_id: step.id.clone(),
                        reason: format!("condition evaluation error: {err}"),
                    });
                    continue;
                }
            }
        }

        if !registry.contains(&step.tool) {
            let error = EngineError::ToolNotFound {
                tool: step.tool.clone(),
            }
            .to_string();
            verdict = Verdict::Failure;
            final_error = Some(error.clone());
            let _ = event_tx.send(RunEvent::Error {
                step_id: step.id.clone(),
                error,
                details: None,
            });
            break;
        }

        let bound_args = match &step.args {
            Some(args) => bind_args(args, &context),
            None => serde_json::Map::new(),
        };

        let output = match registry.invoke(&step.tool, bound_args.clone()).await {
            Ok(output) => output,
            Err(err) => {
                // surface the tool's own message, not the wrapper
                let error = match &err {
                    EngineError::ToolExecution { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                verdict = Verdict::Failure;
                final_error = Some(error.clone());
                let _ = event_tx.send(RunEvent::Error {
                    step_id: step.id.clone(),
                    error,
                    details: step_details(step, Some(&bound_args)),
                });
                break;
            }
        };

        context.insert(step.id.clone(), output.clone());
        if step.key_finding {
            critical_findings.insert(step.id.clone(), output.clone());
        }

        if let Some(intervention_if) = guard(&step.intervention_if) {
            match evaluate_condition(intervention_if, &context) {
                Ok(true) => {
                    verdict = Verdict::InterventionNeeded;
                    // a later trigger overwrites an earlier reason
                    intervention_reason = Some(format!("condition met: {intervention_if}"));
                    let _ = event_tx.send(RunEvent::InterventionNeeded {
                        step_id: step.id.clone(),
                        reason: format!("condition met: {intervention_if}"),
                        output: output.clone(),
                    });
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(
                        step_id = %step.id,
                        expression = intervention_if,
                        error = %err,
                        "intervention guard failed to evaluate, treating as not triggered"
                    );
                }
            }
        }

        let _ = event_tx.send(RunEvent::StepComplete {
            step_id: step.id.clone(),
            output,
            context_snapshot: context.snapshot(),
        });
        steps_completed += 1;
    }

    if verdict == Verdict::Unknown {
        verdict = Verdict::Success;
    }

    let _ = event_tx.send(RunEvent::Finish {
        verdict,
        final_context: context.snapshot(),
        duration_ms: started_at.elapsed().as_millis() as u64,
        steps_completed,
        critical_findings,
        error: final_error,
        intervention_reason,
        at: Utc::now(),
    });
}

/// A guard counts as present only when it has non-whitespace content.
fn guard(expression: &Option<String>) -> Option<&str> {
    expression
        .as_deref()
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
}

fn step_start_message(step: &Step) -> String {
    match step.description.as_deref().map(str::trim) {
        Some(description) if !description.is_empty() => {
            format!("Running {}... {description}", step.tool)
        }
        _ => format!("Running {}...", step.tool),
    }
}

fn step_details(step: &Step, args: Option<&serde_json::Map<String, Value>>) -> Option<String> {
    let step_json = serde_json::to_string(step).ok()?;
    match args {
        Some(args) => {
            let args_json = serde_json::to_string(args).ok()?;
            Some(format!("step: {step_json}, args: {args_json}"))
        }
        None => Some(format!("step: {step_json}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainrun_types::Step;
    use serde_json::json;

    fn echo_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register_blocking("echo", |args| Ok(Value::Object(args)));
        registry.register_blocking("fail", |_| anyhow::bail!("deliberate failure"));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn rejects_invalid_plans_before_emitting_anything() {
        let plan = Plan::new("empty", Vec::new());
        let err = run_plan(&plan, echo_registry()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn single_step_run_succeeds() {
        let plan = Plan::new(
            "one",
            vec![Step::new("only", "echo").with_args([("value", json!(7))])],
        );
        let result = execute_plan(&plan, echo_registry()).await.unwrap();
        assert_eq!(result.verdict, Verdict::Success);
        assert_eq!(result.steps_completed, 1);
        assert_eq!(result.outputs["only"], json!({"value": 7}));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn failure_halts_the_run_with_verbatim_message() {
        let plan = Plan::new(
            "halts",
            vec![
                Step::new("boom", "fail"),
                Step::new("never", "echo"),
            ],
        );
        let result = execute_plan(&plan, echo_registry()).await.unwrap();
        assert_eq!(result.verdict, Verdict::Failure);
        assert_eq!(result.error.as_deref(), Some("deliberate failure"));
        assert_eq!(result.steps_completed, 0);
        assert!(!result.outputs.contains_key("never"));
    }

    #[tokio::test]
    async fn unknown_tool_fails_the_run() {
        let plan = Plan::new("missing", vec![Step::new("s1", "no_such_tool")]);
        let result = execute_plan(&plan, echo_registry()).await.unwrap();
        assert_eq!(result.verdict, Verdict::Failure);
        assert_eq!(
            result.error.as_deref(),
            Some("tool 'no_such_tool' not found in collection")
        );
    }

    #[tokio::test]
    async fn streaming_run_starts_with_start_and_ends_with_finish() {
        let plan = Plan::new("stream", vec![Step::new("s1", "echo")]);
        let mut event_rx = run_plan(&plan, echo_registry()).unwrap();

        let mut events = Vec::new();
        while let Some(event) = event_rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(RunEvent::Start { .. })));
        assert!(matches!(events.last(), Some(RunEvent::Finish { .. })));
    }
}
