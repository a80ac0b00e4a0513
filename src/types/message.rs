//! Conversation messages and tool-call payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// A message in a thread's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: MessageContent,
    /// Tool calls requested by the model (agent messages only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Call id this message answers (tool messages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: MessageContent) -> Self {
        Self {
            id: new_message_id(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            is_error: false,
            created_at: Utc::now(),
        }
    }

    /// Create a human message from plain text.
    pub fn human(text: impl Into<String>) -> Self {
        Self::with_role(Role::Human, MessageContent::Text(text.into()))
    }

    /// Create a human message from content parts.
    pub fn human_parts(parts: Vec<ContentPart>) -> Self {
        Self::with_role(Role::Human, MessageContent::from_parts(parts))
    }

    /// Create an agent message carrying a final answer.
    pub fn agent(text: impl Into<String>) -> Self {
        Self::with_role(Role::Agent, MessageContent::Text(text.into()))
    }

    /// Create an agent message that requests tool calls.
    pub fn agent_with_tool_calls(text: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        let mut message = Self::agent(text);
        message.tool_calls = calls;
        message
    }

    /// Create a tool message answering `result.tool_call_id`.
    pub fn tool(tool_name: impl Into<String>, result: ToolResult) -> Self {
        let content = match &result.result {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        let mut message = Self::with_role(Role::Tool, MessageContent::Text(content));
        message.tool_call_id = Some(result.tool_call_id);
        message.name = Some(tool_name.into());
        message.is_error = result.is_error;
        message
    }

    /// Override the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.content.text()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Generate a fresh message id.
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Human,
    Agent,
    Tool,
}

/// Message content: plain text or a list of parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Collapse text-only part lists into plain text.
    pub fn from_parts(parts: Vec<ContentPart>) -> Self {
        if parts.iter().all(|p| matches!(p, ContentPart::Text { .. })) {
            let text = parts
                .into_iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            Self::Text(text)
        } else {
            Self::Parts(parts)
        }
    }

    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// True when there is nothing to show: empty text or no non-empty parts.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Parts(parts) => parts.iter().all(ContentPart::is_empty),
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A single part of structured message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<ImageDetail>,
    },
}

impl ContentPart {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text { text } => text.is_empty(),
            Self::ImageUrl { image_url, .. } => image_url.is_empty(),
        }
    }
}

/// Requested image fidelity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageDetail {
    Auto,
    Low,
    High,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A tool execution result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub result: serde_json::Value,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            result,
            is_error: false,
        }
    }

    pub fn failure(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            result: serde_json::json!({ "error": error.into() }),
            is_error: true,
        }
    }
}

/// Tool calls on the last agent message that have no answering tool message.
pub fn pending_tool_calls(messages: &[Message]) -> Vec<ToolCallRequest> {
    let Some(agent_idx) = messages.iter().rposition(|m| m.role == Role::Agent) else {
        return Vec::new();
    };
    let answered: Vec<&str> = messages[agent_idx + 1..]
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    messages[agent_idx]
        .tool_calls
        .iter()
        .filter(|call| !answered.contains(&call.id.as_str()))
        .cloned()
        .collect()
}
