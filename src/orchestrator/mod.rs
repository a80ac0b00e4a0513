//! Chat, stream and history entry points over the agent engine.

mod dto;
mod locks;

pub use dto::{ChatRequest, InboundPart, MessageResponse, StreamRequest};
pub use locks::ThreadLocks;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::config::PalaverConfig;
use crate::engine::{AgentEngine, TurnEvent, TurnEventSink};
use crate::error::PalaverError;
use crate::provider::{create_gateway, ModelGateway};
use crate::tools::ToolExecutor;
use crate::relay::{channel_for_thread, pump_turn, FrameRelay, FrameSubscription, RelayOutcome};
use crate::types::Message;

use dto::{to_content_parts, validate_thread_id};

/// Conversation front door shared by every transport.
///
/// Turns on the same thread id are queued; turns on different threads run
/// concurrently.
#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<AgentEngine>,
    store: Arc<dyn CheckpointStore>,
    relay: Arc<dyn FrameRelay>,
    locks: Arc<ThreadLocks>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// History is read from the engine's own checkpoint store.
    pub fn new(engine: AgentEngine, relay: Arc<dyn FrameRelay>) -> Self {
        let store = engine.store().clone();
        Self {
            engine: Arc::new(engine),
            store,
            relay,
            locks: Arc::new(ThreadLocks::new()),
        }
    }

    /// Wire gateway, store, relay and limits from configuration.
    pub fn from_config(
        config: &PalaverConfig,
        tools: Arc<dyn ToolExecutor>,
    ) -> Result<Self, PalaverError> {
        let gateway: Arc<dyn ModelGateway> = Arc::from(create_gateway(&config.model)?);
        let mut builder = AgentEngine::builder()
            .gateway(gateway)
            .tools(tools)
            .store(config.checkpoint_store())
            .settings(config.model.generation_settings())
            .limits(config.engine_limits());
        if let Some(prompt) = &config.system_prompt {
            builder = builder.system_prompt(prompt.clone());
        }
        Ok(Self::new(builder.build()?, config.relay()))
    }

    /// Prepare the checkpoint store. Call once before serving requests.
    pub async fn initialize(&self) -> Result<(), PalaverError> {
        self.store.initialize().await.map_err(|err| {
            error!(error = %err, "checkpoint store failed to initialize");
            err
        })
    }

    pub async fn shutdown(&self) -> Result<(), PalaverError> {
        self.store.shutdown().await
    }

    /// Run one turn and return the final message.
    pub async fn chat(&self, request: ChatRequest) -> Result<MessageResponse, PalaverError> {
        validate_thread_id(&request.thread_id)?;
        let parts = to_content_parts(&request.content)?;
        let input = Message::human_parts(parts);

        let _guard = self.locks.lock(&request.thread_id).await;
        match self.engine.run_turn(&request.thread_id, input).await {
            Ok(output) => {
                info!(thread_id = %request.thread_id, steps = output.steps, "chat turn complete");
                Ok(MessageResponse::from(&output.final_message))
            }
            Err(err) => {
                error!(
                    thread_id = %request.thread_id,
                    category = ?err.category(),
                    error = %err,
                    "chat turn failed"
                );
                Err(err)
            }
        }
    }

    /// Start a streaming turn and return its frame subscription.
    ///
    /// The subscription is established before the turn starts, so no frame
    /// of this turn is missed. It always ends with a `done` or `error` frame
    /// unless the relay itself fails.
    pub async fn stream(&self, request: StreamRequest) -> Result<FrameSubscription, PalaverError> {
        validate_thread_id(&request.thread_id)?;
        if request.content.is_empty() {
            return Err(PalaverError::InvalidInput("content must not be empty".into()));
        }
        let thread_id = request.thread_id;
        let input = Message::human(request.content);
        let channel = channel_for_thread(&thread_id);

        // Hold the thread before subscribing so a queued turn's frames never
        // reach this subscriber.
        let guard = self.locks.lock(&thread_id).await;
        let subscription = self.relay.subscribe(&channel).await?;
        info!(thread_id = %thread_id, channel = %channel, "streaming turn started");

        let engine = self.engine.clone();
        let relay = self.relay.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let (tx, rx) = mpsc::unbounded_channel();
            let sink: TurnEventSink = Arc::new(move |event: TurnEvent| {
                let _ = tx.send(event);
            });
            let run = engine.run_turn_streaming(&thread_id, input, sink);
            match pump_turn(relay.as_ref(), &channel, rx, run).await {
                RelayOutcome::Completed(output) => {
                    info!(thread_id = %thread_id, steps = output.steps, "streaming turn complete");
                }
                RelayOutcome::Failed(err) => {
                    error!(
                        thread_id = %thread_id,
                        category = ?err.category(),
                        error = %err,
                        "streaming turn failed"
                    );
                }
                RelayOutcome::Interrupted(err) => {
                    warn!(thread_id = %thread_id, error = %err, "streaming relay interrupted");
                }
                RelayOutcome::PublishFailed(err) => {
                    warn!(thread_id = %thread_id, error = %err, "streaming relay failed");
                }
            }
        });

        Ok(subscription)
    }

    /// Stored messages of a thread, skipping those with empty content.
    pub async fn history(&self, thread_id: &str) -> Result<Vec<MessageResponse>, PalaverError> {
        validate_thread_id(thread_id)?;
        let checkpoint = self.store.get(thread_id).await.map_err(|err| {
            error!(thread_id, error = %err, "history read failed");
            err
        })?;
        Ok(checkpoint
            .map(|c| c.messages)
            .unwrap_or_default()
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(MessageResponse::from)
            .collect())
    }
}
