use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream};

use crate::error::PalaverError;
use crate::types::StreamFrame;

/// Frames received on one channel, ending after the first terminal frame.
///
/// Dropping the subscription unsubscribes.
pub struct FrameSubscription {
    channel: String,
    payloads: BoxStream<'static, Result<String, PalaverError>>,
    finished: bool,
}

impl FrameSubscription {
    /// Wrap a stream of raw JSON payloads.
    pub fn new(
        channel: impl Into<String>,
        payloads: BoxStream<'static, Result<String, PalaverError>>,
    ) -> Self {
        Self {
            channel: channel.into(),
            payloads,
            finished: false,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl std::fmt::Debug for FrameSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSubscription")
            .field("channel", &self.channel)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Stream for FrameSubscription {
    type Item = Result<StreamFrame, PalaverError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.payloads.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(payload))) => {
                let frame = StreamFrame::from_json(&payload).map_err(|e| {
                    PalaverError::relay(&this.channel, format!("malformed frame: {e}"))
                });
                if matches!(&frame, Ok(frame) if frame.is_terminal()) {
                    this.finished = true;
                }
                Poll::Ready(Some(frame))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err))),
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
