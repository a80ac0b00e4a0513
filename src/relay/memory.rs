//! In-process relay backed by one tokio broadcast channel per name.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use super::{FrameRelay, FrameSubscription};
use crate::error::PalaverError;
use crate::types::StreamFrame;

pub const DEFAULT_CAPACITY: usize = 256;

type Channels = Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>;

/// Channels exist only while they have subscribers; the last subscription to
/// drop removes its entry.
#[derive(Debug)]
pub struct InMemoryRelay {
    channels: Channels,
    capacity: usize,
}

impl Default for InMemoryRelay {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InMemoryRelay {
    /// `capacity` frames may be buffered per subscriber before it lags.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Live subscribers on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .ok()
            .and_then(|channels| channels.get(channel).map(|tx| tx.receiver_count()))
            .unwrap_or(0)
    }

    fn poisoned(channel: &str) -> PalaverError {
        PalaverError::relay(channel, "channel registry lock poisoned")
    }
}

#[async_trait]
impl FrameRelay for InMemoryRelay {
    async fn publish(&self, channel: &str, frame: &StreamFrame) -> Result<(), PalaverError> {
        let payload = frame
            .to_json()
            .map_err(|e| PalaverError::relay(channel, format!("serialize frame failed: {e}")))?;
        let mut channels = self.channels.lock().map_err(|_| Self::poisoned(channel))?;
        let Some(sender) = channels.get(channel) else {
            debug!(channel, "no subscribers; frame dropped");
            return Ok(());
        };
        if sender.send(payload).is_err() {
            debug!(channel, "all subscribers gone; frame dropped");
            channels.remove(channel);
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<FrameSubscription, PalaverError> {
        let receiver = {
            let mut channels = self.channels.lock().map_err(|_| Self::poisoned(channel))?;
            channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };
        let payloads = ChannelStream {
            inner: Some(BroadcastStream::new(receiver)),
            channel: channel.to_string(),
            channels: self.channels.clone(),
        }
        .boxed();
        Ok(FrameSubscription::new(channel, payloads))
    }
}

/// Payloads of one channel; dropping it prunes the channel once idle.
struct ChannelStream {
    inner: Option<BroadcastStream<String>>,
    channel: String,
    channels: Channels,
}

impl Stream for ChannelStream {
    type Item = Result<String, PalaverError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        loop {
            match inner.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(payload))) => return Poll::Ready(Some(Ok(payload))),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(channel = %this.channel, skipped, "subscriber lagged; frames lost");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for ChannelStream {
    fn drop(&mut self) {
        // Release the receiver before counting what is left.
        self.inner.take();
        let Ok(mut channels) = self.channels.lock() else {
            return;
        };
        if channels
            .get(&self.channel)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&self.channel);
            debug!(channel = %self.channel, "last subscriber gone; channel removed");
        }
    }
}
