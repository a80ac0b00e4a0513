//! Tool executor contract and the name-keyed registry that implements it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::tool::{Tool, ToolContext};
use super::types::ToolDefinition;
use crate::error::PalaverError;

/// Executes tool calls requested by the model.
///
/// Implementations must not be assumed idempotent or side-effect free; the
/// engine calls `execute` at most once per tool-call request.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Tools advertised to the model.
    fn catalog(&self) -> Vec<ToolDefinition>;

    /// Run `name` with `arguments`. An `Err` becomes an error tool message.
    async fn execute(
        &self,
        name: &str,
        arguments: &serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, PalaverError>;
}

/// In-process registry of [`Tool`] implementations.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; a later registration with the same name replaces it.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.definition().name.clone();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn catalog(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition().clone())
            .collect()
    }

    async fn execute(
        &self,
        name: &str,
        arguments: &serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, PalaverError> {
        let tool = self.tools.get(name).ok_or_else(|| PalaverError::ToolExecution {
            tool_name: name.to_string(),
            message: format!("Tool '{name}' not found"),
        })?;
        validate_arguments(arguments, &tool.definition().parameters).map_err(|message| {
            PalaverError::ToolExecution {
                tool_name: name.to_string(),
                message: format!("argument validation failed: {message}"),
            }
        })?;
        tool.execute(&ToolArguments::new(arguments.clone()), ctx)
            .await
    }
}

/// Top-level schema check: object shape, required keys, property types.
pub fn validate_arguments(
    args: &serde_json::Value,
    schema: &serde_json::Value,
) -> Result<(), String> {
    let expects_object = schema.get("type").and_then(|v| v.as_str()) == Some("object");
    let Some(obj) = args.as_object() else {
        return if expects_object {
            Err(format!("expected object arguments, got {}", type_name(args)))
        } else {
            Ok(())
        };
    };

    let required = schema
        .get("required")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str());
    for field in required {
        if !obj.contains_key(field) {
            return Err(format!("missing required field '{field}'"));
        }
    }

    let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) else {
        return Ok(());
    };
    for (key, value) in obj {
        let expected = properties
            .get(key)
            .and_then(|p| p.get("type"))
            .and_then(|t| t.as_str());
        if let Some(expected) = expected {
            if !matches_type(value, expected) {
                return Err(format!(
                    "field '{key}' expected type '{expected}', got {}",
                    type_name(value)
                ));
            }
        }
    }
    Ok(())
}

fn matches_type(value: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
