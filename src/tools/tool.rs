//! Tool trait and closure-backed tools.

use std::future::Future;

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::types::{ToolDefinition, ToolParameters};
use crate::error::PalaverError;

/// Context handed to a tool for one invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub thread_id: Option<String>,
    pub tool_call_id: Option<String>,
}

/// A capability the model may call.
///
/// The definition is what the model sees; its `parameters` schema is also
/// what the registry validates arguments against before `execute` runs.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, PalaverError>;
}

/// A tool whose body is an async closure.
pub struct FnTool<F> {
    definition: ToolDefinition,
    handler: F,
}

impl<F, Fut> FnTool<F>
where
    F: Fn(ToolArguments, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, PalaverError>> + Send + 'static,
{
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self {
        Self {
            definition: ToolDefinition {
                name: name.into(),
                description: description.into(),
                parameters: parameters.schema,
            },
            handler,
        }
    }
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(ToolArguments, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, PalaverError>> + Send + 'static,
{
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, PalaverError> {
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl<F> std::fmt::Debug for FnTool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.definition.name)
            .finish_non_exhaustive()
    }
}
