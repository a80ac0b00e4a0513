//! Publish/subscribe delivery of [`StreamFrame`]s for streaming turns.
//!
//! Each thread streams on its own channel (see [`channel_for_thread`]).
//! Delivery is at-most-once: frames published while nobody is subscribed are
//! dropped, so a client must subscribe before the turn starts producing.

pub mod memory;
mod pump;
mod subscription;

pub use memory::InMemoryRelay;
pub use pump::{pump_turn, RelayOutcome};
pub use subscription::FrameSubscription;

use async_trait::async_trait;

use crate::error::PalaverError;
use crate::types::StreamFrame;

const CHANNEL_PREFIX: &str = "agent-stream:";

/// Channel name carrying the frames of one thread.
pub fn channel_for_thread(thread_id: &str) -> String {
    format!("{CHANNEL_PREFIX}{thread_id}")
}

/// A named-channel message bus carrying serialized frames.
#[async_trait]
pub trait FrameRelay: Send + Sync {
    /// Publish one frame. Succeeds even when nobody is listening.
    async fn publish(&self, channel: &str, frame: &StreamFrame) -> Result<(), PalaverError>;

    /// Receive every frame published on `channel` from now on.
    async fn subscribe(&self, channel: &str) -> Result<FrameSubscription, PalaverError>;
}
