//! Reference resolution and argument binding.
//!
//! Steps refer to the outputs of earlier steps with `$` references:
//! `"$scan"` is the whole output stored under step id `scan`, and
//! `"$scan.status"` descends into that output one map key per dot segment.
//! Binding happens immediately before a tool is invoked, so a reference always
//! sees the context as of that moment in the run.

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value};

/// Accumulated step outputs for one plan run, keyed by step id.
///
/// Insertion order is preserved so snapshots read in execution order. Each
/// step writes its output exactly once; later steps only read.
#[derive(Debug, Default, Clone)]
pub struct ExecutionContext {
    outputs: IndexMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the output of a completed step under its id.
    pub fn insert(&mut self, step_id: impl Into<String>, output: Value) {
        self.outputs.insert(step_id.into(), output);
    }

    pub fn get(&self, step_id: &str) -> Option<&Value> {
        self.outputs.get(step_id)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// A point-in-time copy of the whole context as a JSON object, in
    /// execution order. Attached to `STEP_COMPLETE` and `FINISH` events.
    pub fn snapshot(&self) -> JsonMap<String, Value> {
        self.outputs
            .iter()
            .map(|(id, output)| (id.clone(), output.clone()))
            .collect()
    }
}

/// Resolves one string against the context.
///
/// Strings that do not start with `$` are plain values and come back
/// unchanged. A `$` string is split on dots: the first segment selects a step
/// output, each further segment descends into a JSON object by key. Descent
/// only ever enters objects; indexing arrays or scalars resolves to `None`,
/// as does any absent step id or key.
pub fn resolve_reference(raw: &str, context: &ExecutionContext) -> Option<Value> {
    let Some(path) = raw.strip_prefix('$') else {
        return Some(Value::String(raw.to_string()));
    };

    let mut segments = path.split('.');
    let step_id = segments.next()?;
    let mut current = context.get(step_id)?;
    for segment in segments {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }
    Some(current.clone())
}

/// Binds a step's declared arguments against the context.
///
/// Map values are bound recursively. Inside sequences only direct string
/// elements are candidates for substitution; nested structures within a
/// sequence pass through untouched. A reference that resolves to nothing
/// binds as JSON `null` so the tool still receives every declared key.
pub fn bind_args(
    args: &IndexMap<String, Value>,
    context: &ExecutionContext,
) -> JsonMap<String, Value> {
    args.iter()
        .map(|(key, value)| (key.clone(), bind_value(value, context)))
        .collect()
}

fn bind_value(value: &Value, context: &ExecutionContext) -> Value {
    match value {
        Value::String(text) => resolve_reference(text, context).unwrap_or(Value::Null),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, nested)| (key.clone(), bind_value(nested, context)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::String(text) => {
                        resolve_reference(text, context).unwrap_or(Value::Null)
                    }
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}
