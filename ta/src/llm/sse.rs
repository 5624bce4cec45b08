//! Server-sent event helpers shared by the streaming clients

use reqwest::RequestBuilder;
use reqwest_eventsource::{Error as EventSourceError, EventSource};
use tokio::sync::mpsc;
use tracing::debug;

use super::{LlmError, StreamChunk};

/// Open an event source for a prepared POST request
pub(crate) fn open(request: RequestBuilder) -> Result<EventSource, LlmError> {
    EventSource::new(request).map_err(|e| LlmError::Stream(e.to_string()))
}

/// Map an event-source failure onto an [`LlmError`]
///
/// A non-2xx status carries the response body so the API's own message
/// reaches the user. `None` means the server closed the stream normally.
pub(crate) async fn map_error(err: EventSourceError) -> Option<LlmError> {
    match err {
        EventSourceError::StreamEnded => {
            debug!("map_error: stream ended");
            None
        }
        EventSourceError::InvalidStatusCode(status, response) => {
            let message = response.text().await.unwrap_or_default();
            debug!(%status, "map_error: invalid status");
            Some(LlmError::ApiError {
                status: status.as_u16(),
                message,
            })
        }
        EventSourceError::Transport(e) => Some(LlmError::Network(e)),
        other => Some(LlmError::Stream(other.to_string())),
    }
}

/// Close the source and tell the listener before the error is returned
pub(crate) async fn abort(es: &mut EventSource, chunk_tx: &mpsc::Sender<StreamChunk>, err: LlmError) -> LlmError {
    debug!(error = %err, "abort: closing stream");
    es.close();
    let _ = chunk_tx.send(StreamChunk::Error(err.to_string())).await;
    err
}
