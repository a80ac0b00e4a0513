//! Durable per-thread conversation state.
//!
//! A [`Checkpoint`] holds the full message history of one thread plus the
//! engine's position in its state machine. Stores are keyed by thread id and
//! provide per-key atomic `put`; callers serialize turns on a thread.

pub mod file;
pub mod memory;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::EngineStep;
use crate::error::PalaverError;
use crate::types::Message;

/// Where the engine stands for a thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineState {
    /// Step completed most recently, if any.
    pub last_step: Option<EngineStep>,
    /// Step the engine will run next; `Done` when the thread is at rest.
    pub next_step: EngineStep,
    /// Number of turns started on this thread.
    pub turn: u64,
    /// Steps executed in the current (or most recent) turn.
    pub steps: usize,
}

/// Snapshot of one thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub messages: Vec<Message>,
    pub state: EngineState,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(messages: Vec<Message>, state: EngineState) -> Self {
        Self {
            messages,
            state,
            updated_at: Utc::now(),
        }
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new(Vec::new(), EngineState::default())
    }
}

/// Thread-keyed checkpoint persistence.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Prepare backing storage. Idempotent; failure is [`PalaverError::StoreUnavailable`].
    async fn initialize(&self) -> Result<(), PalaverError>;

    /// Latest checkpoint for `thread_id`, or `None` for an unknown thread.
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, PalaverError>;

    /// Replace the checkpoint for `thread_id`.
    async fn put(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), PalaverError>;

    async fn shutdown(&self) -> Result<(), PalaverError> {
        Ok(())
    }
}
