//! OpenAI Chat Completions gateway (also serves OpenAI-compatible servers).

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::error::PalaverError;
use crate::tools::ToolDefinition;
use crate::types::*;

use super::http::{bearer_headers, parse_sse_data, shared_client, status_to_error, SseLineBuffer};
use super::{ModelGateway, ModelRequest};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiGateway {
    model: String,
    api_key: Option<String>,
    base_url: String,
    provider_name: String,
    client: reqwest::Client,
}

impl OpenAiGateway {
    pub fn new(
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, PalaverError> {
        Ok(Self {
            model: model.into(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            provider_name: "openai".to_string(),
            client: shared_client()?,
        })
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    fn build_request_body(&self, request: &ModelRequest, stream: bool) -> serde_json::Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(instructions) = request.instructions.as_deref().filter(|s| !s.is_empty()) {
            messages.push(serde_json::json!({ "role": "system", "content": instructions }));
        }
        messages.extend(request.messages.iter().map(message_to_openai));

        let mut obj = serde_json::Map::new();
        obj.insert("model".into(), self.model.clone().into());
        obj.insert("messages".into(), messages.into());
        obj.insert("stream".into(), stream.into());

        let settings = &request.settings;
        if let Some(max) = settings.max_tokens {
            obj.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            obj.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            obj.insert("top_p".into(), top_p.into());
        }
        if let Some(ref stops) = settings.stop_sequences {
            obj.insert("stop".into(), serde_json::json!(stops));
        }
        if let Some(seed) = settings.seed {
            obj.insert("seed".into(), seed.into());
        }
        if let Some(ref user) = settings.user {
            obj.insert("user".into(), user.clone().into());
        }

        if !request.tools.is_empty() {
            let tool_defs: Vec<serde_json::Value> =
                request.tools.iter().map(tool_to_openai).collect();
            obj.insert("tools".into(), tool_defs.into());
        }

        serde_json::Value::Object(obj)
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, PalaverError> {
        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .headers(bearer_headers(self.api_key.as_deref()))
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }
        Ok(resp)
    }
}

impl std::fmt::Debug for OpenAiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGateway")
            .field("provider", &self.provider_name)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<Message, PalaverError> {
        let body = self.build_request_body(request, false);
        debug!(model = %self.model, messages = request.messages.len(), "OpenAI invoke");

        let data: OpenAiChatResponse = self.post(&body).await?.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PalaverError::Model("No choices in OpenAI response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCallRequest::new(tc.id, tc.function.name, parse_arguments(&tc.function.arguments)))
            .collect();

        let message =
            Message::agent_with_tool_calls(choice.message.content.unwrap_or_default(), tool_calls);
        Ok(match data.id {
            Some(id) if !id.is_empty() => message.with_id(id),
            _ => message,
        })
    }

    async fn stream_invoke(
        &self,
        request: &ModelRequest,
    ) -> Result<BoxStream<'static, Result<MessageFragment, PalaverError>>, PalaverError> {
        let body = self.build_request_body(request, true);
        debug!(model = %self.model, messages = request.messages.len(), "OpenAI stream_invoke");

        let byte_stream = self.post(&body).await?.bytes_stream();
        let fallback_id = new_message_id();

        let stream = async_stream::stream! {
            let mut lines = SseLineBuffer::default();
            futures::pin_mut!(byte_stream);

            'read: while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(PalaverError::Network(e));
                        break 'read;
                    }
                };

                for line in lines.push(&chunk) {
                    let Some(data) = parse_sse_data(&line) else {
                        continue;
                    };
                    let chunk = match serde_json::from_str::<OpenAiStreamChunk>(data) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            debug!(error = %e, "skipping unparseable stream chunk");
                            continue;
                        }
                    };
                    if let Some(error) = chunk.error {
                        yield Err(PalaverError::Model(error.message));
                        break 'read;
                    }
                    if let Some(fragment) = chunk_to_fragment(chunk, &fallback_id) {
                        yield Ok(fragment);
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn chunk_to_fragment(chunk: OpenAiStreamChunk, fallback_id: &str) -> Option<MessageFragment> {
    let choice = chunk.choices.into_iter().next()?;
    let tool_call_chunks: Vec<ToolCallChunk> = choice
        .delta
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCallChunk {
            index: tc.index,
            id: tc.id,
            name: tc.function.as_ref().and_then(|f| f.name.clone()),
            arguments: tc.function.and_then(|f| f.arguments).unwrap_or_default(),
        })
        .collect();
    let content = choice.delta.content.unwrap_or_default();
    if content.is_empty() && tool_call_chunks.is_empty() {
        return None;
    }
    Some(MessageFragment {
        id: chunk
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| fallback_id.to_string()),
        role: Role::Agent,
        content,
        tool_call_chunks,
    })
}

fn tool_to_openai(tool: &ToolDefinition) -> serde_json::Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn content_to_openai(content: &MessageContent) -> serde_json::Value {
    match content {
        MessageContent::Text(text) => serde_json::Value::String(text.clone()),
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => serde_json::json!({ "type": "text", "text": text }),
                ContentPart::ImageUrl { image_url, detail } => {
                    let mut url = serde_json::json!({ "url": image_url });
                    if let Some(detail) = detail {
                        url["detail"] = detail.to_string().into();
                    }
                    serde_json::json!({ "type": "image_url", "image_url": url })
                }
            })
            .collect::<Vec<_>>()
            .into(),
    }
}

fn message_to_openai(msg: &Message) -> serde_json::Value {
    match msg.role {
        Role::Human => serde_json::json!({
            "role": "user",
            "content": content_to_openai(&msg.content),
        }),
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id,
            "content": msg.text(),
        }),
        Role::Agent if msg.has_tool_calls() => {
            let tc_json: Vec<serde_json::Value> = msg
                .tool_calls
                .iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.arguments.to_string(),
                        }
                    })
                })
                .collect();
            let text = msg.text();
            serde_json::json!({
                "role": "assistant",
                "content": if text.is_empty() { serde_json::Value::Null } else { serde_json::Value::String(text) },
                "tool_calls": tc_json,
            })
        }
        Role::Agent => serde_json::json!({
            "role": "assistant",
            "content": msg.text(),
        }),
    }
}

// OpenAI API response types (internal)

#[derive(Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    id: Option<String>,
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    error: Option<OpenAiStreamError>,
}

#[derive(Deserialize)]
struct OpenAiStreamError {
    message: String,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
}

#[derive(Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiStreamToolCall {
    index: usize,
    id: Option<String>,
    function: Option<OpenAiStreamFunction>,
}

#[derive(Deserialize)]
struct OpenAiStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
