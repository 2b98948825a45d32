//! Run event streaming endpoint (SSE).

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event as SseEvent, Sse},
};
use futures::{Stream, StreamExt};

use taliesin_types::RunId;

use crate::error::ServerError;
use crate::state::AppState;

/// GET /v1/stream/{run_id} - stream a run's events.
///
/// Each event is sent as `data: <json>`. Heartbeats are SSE comments, not
/// data lines, so clients can ignore them. After the terminal event one
/// keep-alive comment is sent and the connection closes. Cleanup of the
/// run's channel happens when the stream ends or the client disconnects.
pub async fn stream_handler(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Sse<impl Stream<Item = std::result::Result<SseEvent, Infallible>>>, ServerError> {
    let run_id: RunId = run_id
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("invalid run id: {}", run_id)))?;

    let events = state
        .registry()
        .consume(run_id)
        .ok_or_else(|| ServerError::NotFound(format!("no stream for run {}", run_id)))?;

    tracing::info!(%run_id, "Client attached to event stream");

    let sse_stream = async_stream::stream! {
        let mut events = events;
        while let Some(envelope) = events.next().await {
            if envelope.event.is_heartbeat() {
                yield Ok(SseEvent::default().comment("keep-alive"));
                continue;
            }

            let terminal = envelope.is_terminal();
            let event = match SseEvent::default().json_data(&envelope) {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(%run_id, error = %e, "Failed to serialize event");
                    SseEvent::default()
                }
            };
            yield Ok(event);

            if terminal {
                yield Ok(SseEvent::default().comment("keep-alive"));
                break;
            }
        }
        tracing::info!(%run_id, "Event stream closed");
    };

    Ok(Sse::new(sse_stream))
}
