use std::convert::Infallible;

use axum::response::sse::Event;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use strand_llm::StreamEvent;

/// What the relay saw by the time the stream ended.
///
/// `text` and `reasoning` hold everything accumulated so far, whether the
/// stream completed, errored, or was cut off by the client.
#[derive(Debug, Default)]
pub struct RelayOutcome {
    pub text: String,
    pub reasoning: String,
    pub aborted: bool,
    pub errored: bool,
    pub finish_reason: Option<String>,
}

/// Forward provider events to the SSE channel while accumulating the full
/// response text.
///
/// Client disconnects surface as a closed channel; both that and an explicit
/// cancellation mark the outcome as aborted. A provider error emits one
/// terminal `error` event and ends the relay with whatever text accumulated.
pub async fn run<S>(
    mut events: S,
    tx: mpsc::Sender<Result<Event, Infallible>>,
    cancel: CancellationToken,
) -> RelayOutcome
where
    S: Stream<Item = anyhow::Result<StreamEvent>> + Unpin,
{
    let mut outcome = RelayOutcome::default();

    loop {
        let item = tokio::select! {
            _ = tx.closed() => {
                outcome.aborted = true;
                break;
            }
            _ = cancel.cancelled() => {
                outcome.aborted = true;
                break;
            }
            item = events.next() => item,
        };

        let event = match item {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                tracing::error!("Provider stream error: {}", e);
                outcome.errored = true;
                let error_event = Event::default()
                    .event("error")
                    .json_data(serde_json::json!({ "error": "Upstream provider error" }))
                    .unwrap_or_else(|_| Event::default().event("error"));
                let _ = tx.send(Ok(error_event)).await;
                break;
            }
            None => break,
        };

        let sse_event = match &event {
            StreamEvent::Message { content } => {
                outcome.text.push_str(content);
                Event::default()
                    .event("message")
                    .json_data(serde_json::json!({ "content": content }))
            }
            StreamEvent::Reasoning { content } => {
                outcome.reasoning.push_str(content);
                Event::default()
                    .event("reasoning")
                    .json_data(serde_json::json!({ "content": content }))
            }
            StreamEvent::Done { finish_reason } => {
                outcome.finish_reason = finish_reason.clone();
                Event::default()
                    .event("done")
                    .json_data(serde_json::json!({ "status": "completed" }))
            }
        };

        let sse_event = match sse_event {
            Ok(e) => e,
            Err(e) => {
                tracing::error!("Failed to encode SSE event: {}", e);
                continue;
            }
        };

        // A send failure means the client is gone mid-event.
        if tx.send(Ok(sse_event)).await.is_err() {
            outcome.aborted = true;
            break;
        }

        if matches!(event, StreamEvent::Done { .. }) {
            break;
        }
    }

    outcome
}
