//! The bounded agent/tool state machine.
//!
//! One turn appends a human message to a thread and alternates between an
//! [`EngineStep::Agent`] step (one model call) and an [`EngineStep::Tools`]
//! step (all requested tool calls) until the model answers without tool
//! calls. The checkpoint is written after every step, so a restart resumes
//! from the last completed step.

mod limits;
mod model_phase;
mod tool_phase;

pub use limits::EngineLimits;
pub(crate) use limits::{parse_positive_usize, MAX_STEPS_ENV};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info_span, warn, Instrument};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::PalaverError;
use crate::provider::{ModelGateway, ModelRequest};
use crate::tools::ToolExecutor;
use crate::types::{pending_tool_calls, GenerationSettings, Message, MessageFragment, Role};

use model_phase::run_model_phase;
use tool_phase::{interrupted_tool_messages, run_tool_phase};

/// Position in the agent/tool cycle.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EngineStep {
    Agent,
    Tools,
    #[default]
    Done,
}

/// Progress observed during a streaming turn.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// A chunk of the model's current response.
    ModelFragment(MessageFragment),
    /// A tool result appended to history.
    ToolMessage(Message),
}

/// Callback receiving [`TurnEvent`]s in production order.
pub type TurnEventSink = Arc<dyn Fn(TurnEvent) + Send + Sync>;

/// Result of a completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub thread_id: String,
    /// Final agent message (no tool calls).
    pub final_message: Message,
    /// Steps executed in this turn.
    pub steps: usize,
    /// Messages appended by this turn, starting with the human input.
    pub new_messages: Vec<Message>,
}

/// Drives turns for any number of threads.
///
/// The engine does not serialize turns on a thread; callers must not run two
/// turns for the same thread id at once.
#[derive(Clone)]
pub struct AgentEngine {
    gateway: Arc<dyn ModelGateway>,
    tools: Arc<dyn ToolExecutor>,
    store: Arc<dyn CheckpointStore>,
    system_prompt: Option<String>,
    settings: GenerationSettings,
    limits: EngineLimits,
}

impl std::fmt::Debug for AgentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentEngine")
            .field("provider", &self.gateway.provider_name())
            .field("model", &self.gateway.model_id())
            .field("tools", &self.tools.catalog().len())
            .field("limits", &self.limits)
            .finish()
    }
}

impl AgentEngine {
    pub fn builder() -> AgentEngineBuilder {
        AgentEngineBuilder::default()
    }

    pub fn limits(&self) -> EngineLimits {
        self.limits
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Run one turn to completion.
    pub async fn run_turn(&self, thread_id: &str, input: Message) -> Result<TurnOutput, PalaverError> {
        self.run(thread_id, input, None).await
    }

    /// Run one turn, streaming model fragments and tool messages to `sink`.
    pub async fn run_turn_streaming(
        &self,
        thread_id: &str,
        input: Message,
        sink: TurnEventSink,
    ) -> Result<TurnOutput, PalaverError> {
        self.run(thread_id, input, Some(sink)).await
    }

    async fn run(
        &self,
        thread_id: &str,
        input: Message,
        sink: Option<TurnEventSink>,
    ) -> Result<TurnOutput, PalaverError> {
        let span = info_span!("turn", thread_id, streaming = sink.is_some());
        self.run_inner(thread_id, input, sink.as_ref())
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        thread_id: &str,
        input: Message,
        sink: Option<&TurnEventSink>,
    ) -> Result<TurnOutput, PalaverError> {
        let mut checkpoint = self.store.get(thread_id).await?.unwrap_or_default();

        let dangling = pending_tool_calls(&checkpoint.messages);
        if !dangling.is_empty() {
            warn!(thread_id, calls = dangling.len(), "repairing interrupted tool calls");
            checkpoint
                .messages
                .extend(interrupted_tool_messages(&dangling));
        }

        let turn_start = checkpoint.messages.len();
        checkpoint.messages.push(input);
        checkpoint.state.turn += 1;
        checkpoint.state.steps = 0;
        checkpoint.state.last_step = None;
        checkpoint.state.next_step = EngineStep::Agent;
        self.save(thread_id, &mut checkpoint).await?;

        let catalog = self.tools.catalog();
        let mut step = EngineStep::Agent;
        while step != EngineStep::Done {
            if checkpoint.state.steps >= self.limits.max_steps {
                warn!(
                    thread_id,
                    max_steps = self.limits.max_steps,
                    next_step = %step,
                    "step limit reached"
                );
                return Err(PalaverError::StepLimitExceeded {
                    max_steps: self.limits.max_steps,
                });
            }

            let next = match step {
                EngineStep::Agent => {
                    let request = ModelRequest {
                        instructions: self.system_prompt.clone(),
                        messages: checkpoint.messages.clone(),
                        tools: catalog.clone(),
                        settings: self.settings.clone(),
                    };
                    let reply = run_model_phase(self.gateway.as_ref(), &request, sink).await?;
                    let next = if reply.has_tool_calls() {
                        EngineStep::Tools
                    } else {
                        EngineStep::Done
                    };
                    checkpoint.messages.push(reply);
                    next
                }
                EngineStep::Tools => {
                    let calls = pending_tool_calls(&checkpoint.messages);
                    let results = run_tool_phase(self.tools.as_ref(), thread_id, &calls).await;
                    for message in results {
                        if let Some(sink) = sink {
                            sink(TurnEvent::ToolMessage(message.clone()));
                        }
                        checkpoint.messages.push(message);
                    }
                    EngineStep::Agent
                }
                EngineStep::Done => EngineStep::Done,
            };

            checkpoint.state.steps += 1;
            checkpoint.state.last_step = Some(step);
            checkpoint.state.next_step = next;
            self.save(thread_id, &mut checkpoint).await?;
            debug!(
                thread_id,
                step = %step,
                next_step = %next,
                steps = checkpoint.state.steps,
                "step complete"
            );
            step = next;
        }

        let new_messages = checkpoint.messages.split_off(turn_start);
        let final_message = new_messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Agent)
            .cloned()
            .ok_or_else(|| PalaverError::Model("turn finished without an agent message".into()))?;

        Ok(TurnOutput {
            thread_id: thread_id.to_string(),
            final_message,
            steps: checkpoint.state.steps,
            new_messages,
        })
    }

    async fn save(&self, thread_id: &str, checkpoint: &mut Checkpoint) -> Result<(), PalaverError> {
        checkpoint.updated_at = chrono::Utc::now();
        self.store.put(thread_id, checkpoint).await
    }
}

/// Builder for [`AgentEngine`].
#[derive(Default)]
pub struct AgentEngineBuilder {
    gateway: Option<Arc<dyn ModelGateway>>,
    tools: Option<Arc<dyn ToolExecutor>>,
    store: Option<Arc<dyn CheckpointStore>>,
    system_prompt: Option<String>,
    settings: GenerationSettings,
    limits: Option<EngineLimits>,
}

impl AgentEngineBuilder {
    pub fn gateway(mut self, gateway: Arc<dyn ModelGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn tools(mut self, tools: Arc<dyn ToolExecutor>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Instructions prepended to every model call.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Defaults to [`EngineLimits::from_env`].
    pub fn limits(mut self, limits: EngineLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn build(self) -> Result<AgentEngine, PalaverError> {
        let missing = |what: &str| PalaverError::Configuration(format!("AgentEngine requires a {what}"));
        Ok(AgentEngine {
            gateway: self.gateway.ok_or_else(|| missing("model gateway"))?,
            tools: self.tools.ok_or_else(|| missing("tool executor"))?,
            store: self.store.ok_or_else(|| missing("checkpoint store"))?,
            system_prompt: self.system_prompt.filter(|p| !p.trim().is_empty()),
            settings: self.settings,
            limits: self.limits.unwrap_or_else(EngineLimits::from_env),
        })
    }
}
