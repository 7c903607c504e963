//! Tool trait and registry.
//!
//! Tools come in two flavors. Suspending tools implement [`Tool`] and await
//! freely on the runtime. Blocking tools are plain functions registered with
//! [`ToolRegistry::register_blocking`]; the registry offloads them to the
//! blocking thread pool so a slow probe never stalls the event stream.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value};

use crate::error::EngineError;

/// An invocable tool. Receives its bound arguments as a JSON object and
/// returns an arbitrary JSON output, which the orchestrator stores in the run
/// context under the step's id.
#[async_trait]
pub trait Tool: Send + Sync {
    async fn invoke(&self, args: JsonMap<String, Value>) -> anyhow::Result<Value>;
}

type BlockingToolFn = dyn Fn(JsonMap<String, Value>) -> anyhow::Result<Value> + Send + Sync;

#[derive(Clone)]
enum Handler {
    Blocking(Arc<BlockingToolFn>),
    Suspending(Arc<dyn Tool>),
}

struct Registration {
    handler: Handler,
    description: Option<String>,
}

/// Named collection of tools a plan can call, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, Registration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a suspending tool under `name`, replacing any previous
    /// registration with that name.
    pub fn register(&mut self, name: impl Into<String>, tool: impl Tool + 'static) {
        self.tools.insert(
            name.into(),
            Registration {
                handler: Handler::Suspending(Arc::new(tool)),
                description: None,
            },
        );
    }

    /// Registers a blocking function under `name`. It will run on the
    /// blocking pool, never on the async worker threads.
    pub fn register_blocking<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(JsonMap<String, Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.tools.insert(
            name.into(),
            Registration {
                handler: Handler::Blocking(Arc::new(func)),
                description: None,
            },
        );
    }

    /// Attaches a human-readable description to an already registered tool.
    pub fn annotate(&mut self, name: &str, description: impl Into<String>) {
        if let Some(registration) = self.tools.get_mut(name) {
            registration.description = Some(description.into());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names with their descriptions, in registration order.
    pub fn list(&self) -> Vec<(&str, Option<&str>)> {
        self.tools
            .iter()
            .map(|(name, registration)| (name.as_str(), registration.description.as_deref()))
            .collect()
    }

    /// Invokes a tool by name with already-bound arguments.
    pub async fn invoke(
        &self,
        name: &str,
        args: JsonMap<String, Value>,
    ) -> Result<Value, EngineError> {
        let registration = self.tools.get(name).ok_or_else(|| EngineError::ToolNotFound {
            tool: name.to_string(),
        })?;
        match registration.handler.clone() {
            Handler::Suspending(tool) => {
                tool.invoke(args).await.map_err(|err| EngineError::ToolExecution {
                    tool: name.to_string(),
                    message: err.to_string(),
                })
            }
            Handler::Blocking(func) => {
                let outcome = tokio::task::spawn_blocking(move || func(args)).await;
                match outcome {
                    Ok(Ok(output)) => Ok(output),
                    Ok(Err(err)) => Err(EngineError::ToolExecution {
                        tool: name.to_string(),
                        message: err.to_string(),
                    }),
                    Err(join_err) => Err(EngineError::ToolExecution {
                        tool: name.to_string(),
                        message: format!("tool task failed to complete: {join_err}"),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Doubler;

    #[async_trait]
    impl Tool for Doubler {
        async fn invoke(&self, args: JsonMap<String, Value>) -> anyhow::Result<Value> {
            let input = args
                .get("value")
                .and_then(Value::as_f64)
                .unwrap_or_default();
            Ok(json!({"doubled": input * 2.0}))
        }
    }

    #[tokio::test]
    async fn dispatches_suspending_tools() {
        let mut registry = ToolRegistry::new();
        registry.register("double", Doubler);

        let mut args = JsonMap::new();
        args.insert("value".to_string(), json!(21.0));
        let output = registry.invoke("double", args).await.unwrap();
        assert_eq!(output, json!({"doubled": 42.0}));
    }

    #[tokio::test]
    async fn dispatches_blocking_tools_off_the_runtime() {
        let mut registry = ToolRegistry::new();
        registry.register_blocking("echo", |args| Ok(Value::Object(args)));

        let mut args = JsonMap::new();
        args.insert("ping".to_string(), json!("pong"));
        let output = registry.invoke("echo", args).await.unwrap();
        assert_eq!(output, json!({"ping": "pong"}));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("ghost", JsonMap::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn tool_failure_keeps_the_message() {
        let mut registry = ToolRegistry::new();
        registry.register_blocking("broken", |_| anyhow::bail!("sensor offline"));

        let err = registry.invoke("broken", JsonMap::new()).await.unwrap_err();
        match err {
            EngineError::ToolExecution { message, .. } => assert_eq!(message, "sensor offline"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn listing_preserves_registration_order_and_descriptions() {
        let mut registry = ToolRegistry::new();
        registry.register_blocking("first", |args| Ok(Value::Object(args)));
        registry.register_blocking("second", |args| Ok(Value::Object(args)));
        registry.annotate("second", "the second tool");

        let listed = registry.list();
        assert_eq!(listed[0], ("first", None));
        assert_eq!(listed[1], ("second", Some("the second tool")));
    }
}
