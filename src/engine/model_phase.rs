use futures::StreamExt;
use tracing::debug;

use crate::error::PalaverError;
use crate::provider::{ModelGateway, ModelRequest};
use crate::types::{FragmentAccumulator, Message};

use super::{TurnEvent, TurnEventSink};

/// Run one model call and return the complete agent message.
///
/// With a sink, the gateway is streamed and every fragment is forwarded
/// before it is folded into the result. A stream error aborts the call and
/// the partial message is discarded.
pub(super) async fn run_model_phase(
    gateway: &dyn ModelGateway,
    request: &ModelRequest,
    sink: Option<&TurnEventSink>,
) -> Result<Message, PalaverError> {
    let Some(sink) = sink else {
        return gateway.invoke(request).await;
    };

    let mut stream = gateway.stream_invoke(request).await?;
    let mut accumulator = FragmentAccumulator::new();
    let mut fragments = 0usize;
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        accumulator.push(&fragment);
        fragments += 1;
        sink(TurnEvent::ModelFragment(fragment));
    }
    debug!(fragments, model = gateway.model_id(), "model stream finished");
    Ok(accumulator.finish())
}
