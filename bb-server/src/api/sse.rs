//! Server-Sent Events (SSE) for generation and asset updates
//!
//! Each connection sees only the events of the authenticated user.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use bb_common::events::BlenderEvent;
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::CurrentUser;
use crate::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serialize an event for the wire, `None` if it belongs to someone else
fn event_for(user_id: &str, event: &BlenderEvent) -> Option<Event> {
    if event.user_id() != user_id {
        return None;
    }
    let event_type = event.event_type();
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event_type).data(json)),
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
            None
        }
    }
}

/// GET /api/events - SSE event stream
///
/// Streams GenerationSubmitted, GenerationProgress, GenerationCompleted,
/// GenerationFailed, GenerationCancelled, AssetCreated and AssetDeleted.
pub async fn event_stream(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let user_id = user.0;
    info!(user_id = %user_id, "New SSE client connected");

    let stream = user_events(user_id, state.event_bus.subscribe());
    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat"))
}

/// The caller's events from the bus until it closes
fn user_events(
    user_id: String,
    mut rx: broadcast::Receiver<BlenderEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(sse_event) = event_for(&user_id, &event) {
                        debug!(user_id = %user_id, "SSE: Sending {}", event.event_type());
                        yield Ok(sse_event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = %user_id, skipped, "SSE: Client lagging, events dropped");
                }
                Err(RecvError::Closed) => {
                    info!("SSE: Event bus closed, ending stream");
                    break;
                }
            }
        }
    }
}
