use futures::future;
use tracing::{debug, warn};

use crate::tools::{ToolContext, ToolExecutor};
use crate::types::{Message, ToolCallRequest, ToolResult};

pub(super) const INTERRUPTED_TOOL_CALL: &str = "tool call interrupted before completion";

/// Execute every call concurrently; results come back in request order.
///
/// A failing call yields an error tool message instead of failing the step.
pub(super) async fn run_tool_phase(
    tools: &dyn ToolExecutor,
    thread_id: &str,
    calls: &[ToolCallRequest],
) -> Vec<Message> {
    let executions = calls.iter().map(|call| execute_tool_call(tools, thread_id, call));
    future::join_all(executions).await
}

async fn execute_tool_call(
    tools: &dyn ToolExecutor,
    thread_id: &str,
    call: &ToolCallRequest,
) -> Message {
    let ctx = ToolContext {
        thread_id: Some(thread_id.to_string()),
        tool_call_id: Some(call.id.clone()),
    };
    let result = match tools.execute(&call.name, &call.arguments, &ctx).await {
        Ok(value) => {
            debug!(thread_id, tool = %call.name, call_id = %call.id, "tool call succeeded");
            ToolResult::success(&call.id, value)
        }
        Err(err) => {
            warn!(thread_id, tool = %call.name, call_id = %call.id, error = %err, "tool call failed");
            ToolResult::failure(&call.id, err.to_string())
        }
    };
    Message::tool(&call.name, result)
}

/// Error tool messages for calls whose results were never recorded.
pub(super) fn interrupted_tool_messages(calls: &[ToolCallRequest]) -> Vec<Message> {
    calls
        .iter()
        .map(|call| Message::tool(&call.name, ToolResult::failure(&call.id, INTERRUPTED_TOOL_CALL)))
        .collect()
}
