//! Convenience re-exports for common use.

pub use crate::checkpoint::{
    Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore,
};
pub use crate::config::PalaverConfig;
pub use crate::engine::{AgentEngine, EngineLimits, TurnEvent, TurnOutput};
pub use crate::error::{PalaverError, Result};
pub use crate::orchestrator::{ChatRequest, MessageResponse, Orchestrator, StreamRequest};
pub use crate::provider::{ModelGateway, ModelRequest};
pub use crate::relay::{FrameRelay, InMemoryRelay};
pub use crate::tools::{FnTool, Tool, ToolArguments, ToolExecutor, ToolParameters, ToolRegistry};
pub use crate::types::{ContentPart, Message, MessageContent, Role, StreamFrame};
