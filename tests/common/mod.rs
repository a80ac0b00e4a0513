//! Shared test helpers and a scripted model gateway.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::json;

use palaver::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use palaver::engine::{AgentEngine, EngineLimits};
use palaver::error::PalaverError;
use palaver::provider::{ModelGateway, ModelRequest};
use palaver::tools::{FnTool, ToolParameters, ToolRegistry};
use palaver::types::*;

enum Scripted {
    Reply(Message),
    Fail(String),
    FailMidStream { partial: String, error: String },
}

/// A gateway that replays queued responses in order.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a final text answer.
    pub fn queue_response(&self, text: &str) {
        self.push(Scripted::Reply(Message::agent(text)));
    }

    /// Queue an agent message requesting tool calls.
    pub fn queue_tool_calls(&self, calls: &[(&str, &str, serde_json::Value)]) {
        let calls = calls
            .iter()
            .map(|(id, name, args)| ToolCallRequest::new(*id, *name, args.clone()))
            .collect();
        self.push(Scripted::Reply(Message::agent_with_tool_calls("", calls)));
    }

    pub fn queue_failure(&self, error: &str) {
        self.push(Scripted::Fail(error.to_string()));
    }

    /// Streams `partial` then fails; `invoke` fails outright.
    pub fn queue_mid_stream_failure(&self, partial: &str, error: &str) {
        self.push(Scripted::FailMidStream {
            partial: partial.to_string(),
            error: error.to_string(),
        });
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }

    fn push(&self, item: Scripted) {
        self.script.lock().unwrap().push_back(item);
    }

    fn next(&self, request: &ModelRequest) -> Scripted {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Scripted::Reply(Message::agent("Mock response")))
    }
}

fn text_fragments(id: &str, text: &str) -> Vec<MessageFragment> {
    text.chars()
        .collect::<Vec<_>>()
        .chunks(5)
        .map(|chunk| MessageFragment::text(id, chunk.iter().collect::<String>()))
        .collect()
}

fn message_fragments(message: &Message) -> Vec<MessageFragment> {
    let mut fragments = text_fragments(&message.id, &message.text());
    for (index, call) in message.tool_calls.iter().enumerate() {
        let args = call.arguments.to_string();
        let (head, tail) = args.split_at(args.len() / 2);
        fragments.push(MessageFragment::tool_call(
            &message.id,
            ToolCallChunk {
                index,
                id: Some(call.id.clone()),
                name: Some(call.name.clone()),
                arguments: head.to_string(),
            },
        ));
        fragments.push(MessageFragment::tool_call(
            &message.id,
            ToolCallChunk {
                index,
                id: None,
                name: None,
                arguments: tail.to_string(),
            },
        ));
    }
    fragments
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<Message, PalaverError> {
        match self.next(request) {
            Scripted::Reply(message) => Ok(message),
            Scripted::Fail(error) | Scripted::FailMidStream { error, .. } => {
                Err(PalaverError::Model(error))
            }
        }
    }

    async fn stream_invoke(
        &self,
        request: &ModelRequest,
    ) -> Result<BoxStream<'static, Result<MessageFragment, PalaverError>>, PalaverError> {
        let items: Vec<Result<MessageFragment, PalaverError>> = match self.next(request) {
            Scripted::Reply(message) => message_fragments(&message).into_iter().map(Ok).collect(),
            Scripted::Fail(error) => return Err(PalaverError::Model(error)),
            Scripted::FailMidStream { partial, error } => text_fragments("partial", &partial)
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(PalaverError::Stream(error))))
                .collect(),
        };
        let stream = async_stream::stream! {
            for item in items {
                tokio::task::yield_now().await;
                yield item;
            }
        };
        Ok(Box::pin(stream))
    }
}

/// Registry with `calc` (adds `a` and `b`) and `explode` (always fails).
pub fn calc_registry() -> Arc<ToolRegistry> {
    Arc::new(
        ToolRegistry::new()
            .with_tool(Arc::new(FnTool::new(
                "calc",
                "Add two integers",
                ToolParameters::object()
                    .integer("a", "left operand", true)
                    .integer("b", "right operand", true)
                    .build(),
                |args, _ctx| async move {
                    let sum = args.get_i64("a")? + args.get_i64("b")?;
                    Ok::<_, PalaverError>(json!(sum))
                },
            )))
            .with_tool(Arc::new(FnTool::new(
                "explode",
                "Always fails",
                ToolParameters::empty(),
                |_args, _ctx| async {
                    Err::<serde_json::Value, _>(PalaverError::ToolExecution {
                        tool_name: "explode".into(),
                        message: "boom".into(),
                    })
                },
            ))),
    )
}

pub fn engine_with(
    gateway: Arc<ScriptedGateway>,
    store: Arc<dyn CheckpointStore>,
    max_steps: usize,
) -> AgentEngine {
    AgentEngine::builder()
        .gateway(gateway)
        .tools(calc_registry())
        .store(store)
        .system_prompt("You are a careful assistant.")
        .limits(EngineLimits::new(max_steps))
        .build()
        .unwrap()
}

pub fn memory_store() -> Arc<MemoryCheckpointStore> {
    Arc::new(MemoryCheckpointStore::new())
}
