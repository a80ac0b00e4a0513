//! Streaming types: model fragments and relay frames.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::message::{new_message_id, Message, MessageContent, Role, ToolCallRequest};

/// One incremental chunk of a model response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageFragment {
    pub id: String,
    pub role: Role,
    /// Text delta carried by this chunk.
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_call_chunks: Vec<ToolCallChunk>,
}

impl MessageFragment {
    /// A text-only agent fragment.
    pub fn text(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Agent,
            content: content.into(),
            tool_call_chunks: Vec::new(),
        }
    }

    /// An agent fragment carrying only a tool-call chunk.
    pub fn tool_call(id: impl Into<String>, chunk: ToolCallChunk) -> Self {
        Self {
            id: id.into(),
            role: Role::Agent,
            content: String::new(),
            tool_call_chunks: vec![chunk],
        }
    }

    pub fn has_text(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Partial tool call; chunks sharing an `index` are merged in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallChunk {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Raw JSON argument text delta.
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Folds a fragment sequence into the final message.
#[derive(Debug, Default)]
pub struct FragmentAccumulator {
    id: Option<String>,
    text: String,
    calls: BTreeMap<usize, PartialCall>,
}

impl FragmentAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &MessageFragment) {
        if self.id.is_none() && !fragment.id.is_empty() {
            self.id = Some(fragment.id.clone());
        }
        self.text.push_str(&fragment.content);
        for chunk in &fragment.tool_call_chunks {
            let call = self.calls.entry(chunk.index).or_default();
            if call.id.is_none() {
                call.id = chunk.id.clone();
            }
            if let Some(name) = &chunk.name {
                call.name.push_str(name);
            }
            call.arguments.push_str(&chunk.arguments);
        }
    }

    /// Build the agent message. Unparseable argument text is kept as a JSON string.
    pub fn finish(self) -> Message {
        let tool_calls = self
            .calls
            .into_values()
            .map(|call| ToolCallRequest {
                id: call.id.unwrap_or_else(new_message_id),
                name: call.name,
                arguments: parse_arguments(&call.arguments),
            })
            .collect();
        let mut message = Message::agent_with_tool_calls(self.text, tool_calls);
        if let Some(id) = self.id {
            message.id = id;
        }
        message
    }
}

/// Parse streamed tool arguments; empty text means no arguments.
pub fn parse_arguments(raw: &str) -> serde_json::Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

/// Payload of a `message` frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameMessage {
    pub id: String,
    pub role: Role,
    pub content: MessageContent,
}

/// Payload of an `error` frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameError {
    pub message: String,
}

/// One unit of the streaming wire protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamFrame {
    Message(FrameMessage),
    Done,
    Error(FrameError),
}

impl StreamFrame {
    pub fn message(fragment: &MessageFragment) -> Self {
        Self::Message(FrameMessage {
            id: fragment.id.clone(),
            role: fragment.role,
            content: MessageContent::Text(fragment.content.clone()),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(FrameError {
            message: message.into(),
        })
    }

    /// `done` and `error` end a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
