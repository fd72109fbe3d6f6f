//! In-process tool registry.
//!
//! Implements `DispatchCore` for `tools/list` and `tools/call` over a set of
//! named async handlers.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::dispatch::{DispatchCore, DispatchError};
use crate::rpc::envelope::{INVALID_PARAMS, METHOD_NOT_FOUND};

pub const TOOLS_LIST: &str = "tools/list";
pub const TOOLS_CALL: &str = "tools/call";

type ToolFuture = Pin<Box<dyn Future<Output = Result<Value, DispatchError>> + Send>>;
type ToolHandler = Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>;

/// Tool metadata returned by `tools/list`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

struct RegisteredTool {
    definition: ToolDefinition,
    handler: ToolHandler,
}

/// Named tools, listed in name order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration with the same name replaces the earlier one.
    pub fn register<F, Fut>(mut self, definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, DispatchError>> + Send + 'static,
    {
        let handler: ToolHandler = Arc::new(move |args| -> ToolFuture { Box::pin(handler(args)) });
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool { definition, handler },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn list(&self) -> Value {
        let tools: Vec<&ToolDefinition> = self.tools.values().map(|t| &t.definition).collect();
        json!({ "tools": tools })
    }

    async fn call(&self, params: Option<Value>) -> Result<Value, DispatchError> {
        let params = params.unwrap_or(Value::Null);
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| DispatchError::rpc(INVALID_PARAMS, "tools/call requires a string 'name'"))?;

        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| DispatchError::rpc(INVALID_PARAMS, format!("Unknown tool: {}", name)))?;

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        tracing::debug!(tool = %name, "Invoking tool");
        (tool.handler)(arguments).await
    }
}

#[async_trait]
impl DispatchCore for ToolRegistry {
    fn recognizes(&self, method: &str) -> bool {
        matches!(method, TOOLS_LIST | TOOLS_CALL)
    }

    async fn handle(&self, method: &str, params: Option<Value>) -> Result<Value, DispatchError> {
        match method {
            TOOLS_LIST => Ok(self.list()),
            TOOLS_CALL => self.call(params).await,
            other => Err(DispatchError::rpc(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        }
    }

    fn describe(&self) -> Value {
        json!({ "tools": self.tools.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .register(ToolDefinition::new("echo", "Echo arguments"), |args| async move {
                Ok::<Value, DispatchError>(
                    json!({ "content": [{ "type": "text", "text": args.to_string() }] }),
                )
            })
            .register(ToolDefinition::new("fail", "Always fails"), |_| async move {
                Err::<Value, DispatchError>(DispatchError::Internal("boom".into()))
            })
    }

    #[tokio::test]
    async fn lists_tools_in_name_order() {
        let result = registry().handle(TOOLS_LIST, None).await.unwrap();
        assert_eq!(result["tools"][0]["name"], "echo");
        assert_eq!(result["tools"][1]["name"], "fail");
        assert!(result["tools"][0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn empty_registry_lists_nothing() {
        let result = ToolRegistry::new().handle(TOOLS_LIST, None).await.unwrap();
        assert_eq!(result, json!({ "tools": [] }));
    }

    #[tokio::test]
    async fn calls_tool_with_arguments() {
        let result = registry()
            .handle(TOOLS_CALL, Some(json!({ "name": "echo", "arguments": { "x": 1 } })))
            .await
            .unwrap();
        assert_eq!(result["content"][0]["text"], r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let err = registry()
            .handle(TOOLS_CALL, Some(json!({ "name": "nope" })))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Rpc { code: INVALID_PARAMS, .. }));

        let err = registry().handle(TOOLS_CALL, None).await.unwrap_err();
        assert!(matches!(err, DispatchError::Rpc { code: INVALID_PARAMS, .. }));
    }

    #[test]
    fn recognizes_only_tool_methods() {
        let registry = ToolRegistry::new();
        assert!(registry.recognizes(TOOLS_LIST));
        assert!(registry.recognizes(TOOLS_CALL));
        assert!(!registry.recognizes("initialize"));
        assert!(!registry.recognizes("bogus"));
    }
}
