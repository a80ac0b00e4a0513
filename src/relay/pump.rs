use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::FrameRelay;
use crate::engine::{TurnEvent, TurnOutput};
use crate::error::PalaverError;
use crate::types::{Role, StreamFrame};

/// How a relayed turn ended.
#[derive(Debug)]
pub enum RelayOutcome {
    /// The turn completed and `done` was published.
    Completed(TurnOutput),
    /// The turn failed and `error` was published.
    Failed(PalaverError),
    /// A `message` frame failed to publish. Forwarding stopped, the run still
    /// finished, and an `error` frame carrying this error ended the stream.
    Interrupted(PalaverError),
    /// The terminal frame itself could not be published.
    PublishFailed(PalaverError),
}

/// Drive `run` while forwarding its events to `channel` as frames.
///
/// Only agent fragments carrying text are published; tool-call deltas and
/// tool messages stay internal. Exactly one terminal frame follows the last
/// message frame. If a message publish fails, forwarding stops, `run` still
/// completes, and the stream is closed with an `error` frame instead.
pub async fn pump_turn<F>(
    relay: &dyn FrameRelay,
    channel: &str,
    mut events: mpsc::UnboundedReceiver<TurnEvent>,
    run: F,
) -> RelayOutcome
where
    F: Future<Output = Result<TurnOutput, PalaverError>>,
{
    let forward = async {
        let mut failure = None;
        let mut published = 0usize;
        while let Some(event) = events.recv().await {
            if failure.is_some() {
                continue;
            }
            let TurnEvent::ModelFragment(fragment) = event else {
                continue;
            };
            if fragment.role != Role::Agent || !fragment.has_text() {
                continue;
            }
            match relay.publish(channel, &StreamFrame::message(&fragment)).await {
                Ok(()) => published += 1,
                Err(err) => {
                    warn!(channel, error = %err, "publish failed; forwarding stopped");
                    failure = Some(err);
                }
            }
        }
        (published, failure)
    };

    let (result, (published, failure)) = tokio::join!(run, forward);
    if let Some(err) = failure {
        match &result {
            Ok(output) => debug!(channel, steps = output.steps, "turn finished after relay failure"),
            Err(run_err) => warn!(channel, error = %run_err, "turn failed after relay failure"),
        }
        return match relay.publish(channel, &StreamFrame::error(err.to_string())).await {
            Ok(()) => RelayOutcome::Interrupted(err),
            Err(terminal_err) => {
                warn!(channel, error = %terminal_err, "error frame publish failed");
                RelayOutcome::PublishFailed(terminal_err)
            }
        };
    }

    let terminal = match &result {
        Ok(_) => StreamFrame::Done,
        Err(err) => StreamFrame::error(err.to_string()),
    };
    if let Err(err) = relay.publish(channel, &terminal).await {
        warn!(channel, error = %err, "terminal frame publish failed");
        return RelayOutcome::PublishFailed(err);
    }
    debug!(channel, published, ok = result.is_ok(), "stream finished");

    match result {
        Ok(output) => RelayOutcome::Completed(output),
        Err(err) => RelayOutcome::Failed(err),
    }
}
