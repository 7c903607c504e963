//! Strongly typed plan schema shared across the store, engine, and CLI.
//!
//! A plan is an ordered tool chain: each step names a tool, optionally binds
//! arguments (which may embed `$step_id.path` references into earlier step
//! outputs), and optionally carries guard expressions controlling whether the
//! step runs (`run_if`) or flags the run for human attention
//! (`intervention_if`). Argument order is preserved via `IndexMap` so plans
//! round-trip through YAML/JSON the way they were authored.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Structural validation failure raised before any execution begins.
///
/// A plan that fails validation is never handed to the engine; these are
/// distinct from in-run failures, which surface as `ERROR` events.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The plan declared no steps at all.
    #[error("plan must declare at least one step")]
    NoSteps,
    /// A step was authored with an empty or whitespace-only id.
    #[error("step at index {index} has a blank id")]
    BlankStepId {
        /// Zero-based position of the offending step.
        index: usize,
    },
    /// A step was authored without naming a tool.
    #[error("step '{step_id}' has a blank tool name")]
    BlankTool {
        /// Identifier of the offending step.
        step_id: String,
    },
    /// Two steps share the same identifier.
    #[error("duplicate step identifier detected: '{step_id}'")]
    DuplicateStepId {
        /// The identifier that appeared more than once.
        step_id: String,
    },
}

/// A single tool invocation unit within a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Step {
    /// Unique step identifier referenced by later bindings and guards.
    pub id: String,
    /// Name of the tool to invoke, resolved against the tool collection.
    pub tool: String,
    /// Optional descriptive copy surfaced in event messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Named arguments passed to the tool; string values starting with `$`
    /// are resolved against earlier step outputs at execution time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<IndexMap<String, Value>>,
    /// Guard expression; when present and false (or failing to evaluate),
    /// the step is skipped without touching the context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_if: Option<String>,
    /// Guard expression evaluated after the step completes; when true the
    /// run is flagged for human intervention but execution continues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intervention_if: Option<String>,
    /// Marks this step's output as a critical finding collected separately.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub key_finding: bool,
}

impl Step {
    /// Creates a minimal step with just an id and a tool name.
    pub fn new(id: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            description: None,
            args: None,
            run_if: None,
            intervention_if: None,
            key_finding: false,
        }
    }

    /// Attaches an argument map to the step.
    #[must_use]
    pub fn with_args<K, I>(mut self, args: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        self.args = Some(args.into_iter().map(|(key, value)| (key.into(), value)).collect());
        self
    }

    /// Attaches a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attaches a `run_if` guard expression.
    #[must_use]
    pub fn with_run_if(mut self, expression: impl Into<String>) -> Self {
        self.run_if = Some(expression.into());
        self
    }

    /// Attaches an `intervention_if` guard expression.
    #[must_use]
    pub fn with_intervention_if(mut self, expression: impl Into<String>) -> Self {
        self.intervention_if = Some(expression.into());
        self
    }

    /// Flags this step's output as a critical finding.
    #[must_use]
    pub fn key_finding(mut self) -> Self {
        self.key_finding = true;
        self
    }
}

/// An ordered tool chain ready for validation and execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Plan {
    /// Canonical identifier used for store lookups and the `START` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Optional human-readable name for menus and listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional descriptive copy explaining what the chain does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered execution steps.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Plan {
    /// Creates a plan from an id and a list of steps.
    pub fn new(id: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
            description: None,
            steps,
        }
    }

    /// Validates the plan's structure once, before execution.
    ///
    /// Rejects an empty step list, blank step ids or tool names, and
    /// duplicate step ids. A validated plan is treated as immutable by the
    /// engine; step ids being unique is what makes context writes
    /// write-once.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.steps.is_empty() {
            return Err(ValidationError::NoSteps);
        }

        let mut seen_ids: HashSet<&str> = HashSet::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let id = step.id.trim();
            if id.is_empty() {
                return Err(ValidationError::BlankStepId { index });
            }
            if step.tool.trim().is_empty() {
                return Err(ValidationError::BlankTool { step_id: id.to_string() });
            }
            if !seen_ids.insert(id) {
                return Err(ValidationError::DuplicateStepId { step_id: id.to_string() });
            }
        }

        Ok(())
    }

    /// Returns the identifier used in listings, falling back to the name.
    pub fn display_id(&self) -> &str {
        self.id
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("<unnamed>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_step_plan() -> Plan {
        Plan::new(
            "diagnostic",
            vec![
                Step::new("s1", "scan_hull"),
                Step::new("s2", "check_oxygen").key_finding(),
            ],
        )
    }

    #[test]
    fn valid_plan_passes_validation() {
        assert_eq!(two_step_plan().validate(), Ok(()));
    }

    #[test]
    fn rejects_empty_step_list() {
        let plan = Plan::new("empty", vec![]);
        assert_eq!(plan.validate(), Err(ValidationError::NoSteps));
    }

    #[test]
    fn rejects_blank_id_and_tool() {
        let plan = Plan::new("bad", vec![Step::new("  ", "scan_hull")]);
        assert_eq!(plan.validate(), Err(ValidationError::BlankStepId { index: 0 }));

        let plan = Plan::new("bad", vec![Step::new("s1", "")]);
        assert_eq!(
            plan.validate(),
            Err(ValidationError::BlankTool { step_id: "s1".into() })
        );
    }

    #[test]
    fn rejects_duplicate_step_ids() {
        let plan = Plan::new(
            "dup",
            vec![Step::new("s1", "scan_hull"), Step::new("s1", "check_oxygen")],
        );
        assert_eq!(
            plan.validate(),
            Err(ValidationError::DuplicateStepId { step_id: "s1".into() })
        );
    }

    #[test]
    fn deserializes_yaml_plan_with_references() {
        let yaml_text = r#"
id: diagnostic_sequence
name: Diagnostic Sequence
steps:
  - id: s1
    tool: check_oxygen
    key_finding: true
  - id: s2
    tool: analyze_atmosphere
    args:
      o2_level: $s1.level
    intervention_if: "$s2.severity == 'HIGH'"
"#;
        let plan: Plan = serde_yaml::from_str(yaml_text).expect("deserialize plan");
        assert_eq!(plan.id.as_deref(), Some("diagnostic_sequence"));
        assert_eq!(plan.steps.len(), 2);
        assert!(plan.steps[0].key_finding);
        assert_eq!(plan.steps[1].args.as_ref().unwrap()["o2_level"], json!("$s1.level"));
        assert_eq!(plan.validate(), Ok(()));
    }

    #[test]
    fn rejects_unknown_step_fields() {
        let yaml_text = r#"
id: bad
steps:
  - id: s1
    tool: scan_hull
    retries: 3
"#;
        let parsed: Result<Plan, _> = serde_yaml::from_str(yaml_text);
        assert!(parsed.is_err(), "unknown step field should be rejected");
    }
}
