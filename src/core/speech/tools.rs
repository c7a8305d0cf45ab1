//! Tool declarations and the dispatch table.
//!
//! Callers declare tools (name, description, JSON schema) and supply async
//! handlers. When the model requests a tool invocation, the session looks the
//! name up here; a missing handler or a failed call produces a structured
//! error envelope rather than a session failure.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Value, json};

use super::events::{ToolInputSchema, ToolSpecInner, ToolSpecWire};

/// Async tool handler: JSON input to JSON output or an error message.
pub type ToolHandler = Arc<
    dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>> + Send + Sync,
>;

/// One tool declared to the model.
#[derive(Clone)]
pub struct ToolSpec {
    /// Tool name referenced by toolUse events
    pub name: String,
    /// Human-readable description
    pub description: Option<String>,
    /// JSON schema for the tool input
    pub input_schema: Value,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema: schema,
        }
    }

    /// Convert to the wire shape (schema carried as a JSON string).
    pub fn to_wire(&self) -> ToolSpecWire {
        ToolSpecWire {
            tool_spec: ToolSpecInner {
                name: self.name.clone(),
                description: self.description.clone(),
                input_schema: ToolInputSchema {
                    json: self.input_schema.to_string(),
                },
            },
        }
    }
}

/// Dispatch table mapping tool names to handlers.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a tool name, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, handler: ToolHandler) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Invoke the named tool and envelope the outcome as a JSON string.
    ///
    /// All three outcomes (success, handler error, no handler) produce a
    /// result string for the model; nothing here fails the session.
    pub async fn dispatch(&self, name: &str, input_json: &str) -> String {
        let Some(handler) = self.handlers.get(name) else {
            tracing::warn!(tool = name, "No handler registered for requested tool");
            return json!({
                "error": "No handler registered for tool",
                "toolName": name,
            })
            .to_string();
        };

        let input: Value = match serde_json::from_str(input_json) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "Tool input is not valid JSON");
                return json!({
                    "error": format!("Invalid tool input: {}", e),
                    "toolName": name,
                })
                .to_string();
            }
        };

        match handler(input).await {
            Ok(result) => result.to_string(),
            Err(message) => {
                tracing::warn!(tool = name, error = %message, "Tool handler failed");
                json!({
                    "error": message,
                    "toolName": name,
                })
                .to_string()
            }
        }
    }
}

/// Tool declarations plus their dispatch table, carried by the session config.
#[derive(Clone)]
pub struct ToolConfig {
    /// Tools declared to the model on promptStart
    pub specs: Vec<ToolSpec>,
    /// Handlers invoked on toolUse events
    pub registry: Arc<ToolRegistry>,
}

impl ToolConfig {
    pub fn new(specs: Vec<ToolSpec>, registry: ToolRegistry) -> Self {
        Self {
            specs,
            registry: Arc::new(registry),
        }
    }

    /// Wire-shaped tool declarations for promptStart.
    pub fn wire_specs(&self) -> Vec<ToolSpecWire> {
        self.specs.iter().map(ToolSpec::to_wire).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_handler() -> ToolHandler {
        Arc::new(|input| Box::pin(async move { Ok(json!({ "echo": input })) }))
    }

    fn failing_handler() -> ToolHandler {
        Arc::new(|_| Box::pin(async { Err("backend unreachable".to_string()) }))
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let mut registry = ToolRegistry::new();
        registry.register("echo", echo_handler());

        let result = registry.dispatch("echo", r#"{"q":"weather"}"#).await;
        let value: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(value["echo"]["q"], "weather");
    }

    #[tokio::test]
    async fn test_dispatch_missing_handler() {
        let registry = ToolRegistry::new();
        let result = registry.dispatch("unknown_tool", "{}").await;
        let value: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(value["error"], "No handler registered for tool");
        assert_eq!(value["toolName"], "unknown_tool");
    }

    #[tokio::test]
    async fn test_dispatch_handler_error() {
        let mut registry = ToolRegistry::new();
        registry.register("flaky", failing_handler());

        let result = registry.dispatch("flaky", "{}").await;
        let value: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(value["error"], "backend unreachable");
    }

    #[tokio::test]
    async fn test_dispatch_bad_input() {
        let mut registry = ToolRegistry::new();
        registry.register("echo", echo_handler());

        let result = registry.dispatch("echo", "not json").await;
        let value: Value = serde_json::from_str(&result).unwrap();
        assert!(value["error"].as_str().unwrap().contains("Invalid tool input"));
    }

    #[test]
    fn test_spec_to_wire() {
        let spec = ToolSpec::new(
            "get_weather",
            "Look up current weather",
            json!({ "type": "object", "properties": { "city": { "type": "string" } } }),
        );
        let wire = spec.to_wire();
        assert_eq!(wire.tool_spec.name, "get_weather");
        let schema: Value = serde_json::from_str(&wire.tool_spec.input_schema.json).unwrap();
        assert_eq!(schema["type"], "object");
    }
}
