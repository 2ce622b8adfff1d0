//! Event types and EventBus
//!
//! Events are broadcast in-process via [`EventBus`] and serialized for SSE
//! transmission. Every event names the user it belongs to so the SSE layer
//! can deliver it to that user only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Binary Blender event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum BlenderEvent {
    /// Generation accepted by the provider and tracking started
    GenerationSubmitted {
        generation_id: Uuid,
        user_id: String,
        provider: String,
        provider_job_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Provider still working on a generation
    ///
    /// Emitted once per poll attempt that observed a pending job.
    GenerationProgress {
        generation_id: Uuid,
        user_id: String,
        attempt: u32,
        max_attempts: u32,
        /// Provider-reported detail (e.g. "processing", "THROTTLED")
        detail: String,
        timestamp: DateTime<Utc>,
    },

    /// Generation finished and its outputs were stored as assets
    GenerationCompleted {
        generation_id: Uuid,
        user_id: String,
        asset_ids: Vec<Uuid>,
        timestamp: DateTime<Utc>,
    },

    /// Generation failed or timed out
    GenerationFailed {
        generation_id: Uuid,
        user_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Generation cancelled by the user
    GenerationCancelled {
        generation_id: Uuid,
        user_id: String,
        timestamp: DateTime<Utc>,
    },

    /// New asset stored (upload, text asset or generation output)
    AssetCreated {
        asset_id: Uuid,
        user_id: String,
        kind: String,
        timestamp: DateTime<Utc>,
    },

    /// Asset removed
    AssetDeleted {
        asset_id: Uuid,
        user_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl BlenderEvent {
    /// Event type name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            BlenderEvent::GenerationSubmitted { .. } => "GenerationSubmitted",
            BlenderEvent::GenerationProgress { .. } => "GenerationProgress",
            BlenderEvent::GenerationCompleted { .. } => "GenerationCompleted",
            BlenderEvent::GenerationFailed { .. } => "GenerationFailed",
            BlenderEvent::GenerationCancelled { .. } => "GenerationCancelled",
            BlenderEvent::AssetCreated { .. } => "AssetCreated",
            BlenderEvent::AssetDeleted { .. } => "AssetDeleted",
        }
    }

    /// Owner of the event
    pub fn user_id(&self) -> &str {
        match self {
            BlenderEvent::GenerationSubmitted { user_id, .. }
            | BlenderEvent::GenerationProgress { user_id, .. }
            | BlenderEvent::GenerationCompleted { user_id, .. }
            | BlenderEvent::GenerationFailed { user_id, .. }
            | BlenderEvent::GenerationCancelled { user_id, .. }
            | BlenderEvent::AssetCreated { user_id, .. }
            | BlenderEvent::AssetDeleted { user_id, .. } => user_id,
        }
    }
}

/// Central event distribution bus
///
/// Wraps a tokio broadcast channel:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged subscribers lose the oldest events
///
/// # Examples
///
/// ```
/// use bb_common::events::{BlenderEvent, EventBus};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(BlenderEvent::AssetDeleted {
///     asset_id: uuid::Uuid::new_v4(),
///     user_id: "alice".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().user_id(), "alice");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BlenderEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<BlenderEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: BlenderEvent,
    ) -> Result<usize, broadcast::error::SendError<BlenderEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: BlenderEvent) {
        let event_type = event.event_type();
        if self.tx.send(event).is_err() {
            debug!("No subscribers for {} event", event_type);
        }
    }

    /// Current number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_with_type_tag() {
        let event = BlenderEvent::GenerationFailed {
            generation_id: Uuid::nil(),
            user_id: "u1".to_string(),
            error: "timed out".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "GenerationFailed");
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["error"], "timed out");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        let result = bus.emit(BlenderEvent::GenerationCancelled {
            generation_id: Uuid::nil(),
            user_id: "u1".to_string(),
            timestamp: Utc::now(),
        });
        assert!(result.is_err());
        assert_eq!(bus.capacity(), 4);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive() {
        let bus = EventBus::new(4);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit_lossy(BlenderEvent::AssetCreated {
            asset_id: Uuid::nil(),
            user_id: "u2".to_string(),
            kind: "image".to_string(),
            timestamp: Utc::now(),
        });

        assert_eq!(a.recv().await.unwrap().event_type(), "AssetCreated");
        assert_eq!(b.recv().await.unwrap().user_id(), "u2");
    }
}
