//! Session lifecycle events, streamed to observers over SSE

use crate::types::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// What happened to a session; serialized with a `type` tag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventType {
    /// Review session opened
    SessionCreated {
        session_id: String,
        timeout_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// Reviewer asked for a new enhancement pass
    SessionReprocessed {
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Reviewer submitted a decision
    SessionCompleted {
        session_id: String,
        /// "edited", "original" or "end_conversation"
        outcome: String,
        timestamp: DateTime<Utc>,
    },
    /// Deadline passed without a decision
    SessionTimedOut {
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Gateway liveness ping, every few seconds
    Heartbeat {
        #[serde(default)]
        instance_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

/// Lifecycle event as sent to observers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique per event; doubles as the SSE `id:` field
    pub id: String,
    #[serde(flatten)]
    pub event_type: EventType,
}

impl Event {
    /// Create new event
    pub fn new(event_type: EventType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
        }
    }

    pub fn session_created(session_id: SessionId, timeout_ms: u64) -> Self {
        Self::new(EventType::SessionCreated {
            session_id: session_id.to_string(),
            timeout_ms,
            timestamp: Utc::now(),
        })
    }

    pub fn session_reprocessed(session_id: SessionId) -> Self {
        Self::new(EventType::SessionReprocessed {
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        })
    }

    pub fn session_completed(session_id: SessionId, outcome: &str) -> Self {
        Self::new(EventType::SessionCompleted {
            session_id: session_id.to_string(),
            outcome: outcome.to_string(),
            timestamp: Utc::now(),
        })
    }

    pub fn session_timed_out(session_id: SessionId) -> Self {
        Self::new(EventType::SessionTimedOut {
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        })
    }

    pub fn heartbeat(instance_id: String) -> Self {
        Self::new(EventType::Heartbeat {
            instance_id: Some(instance_id),
            timestamp: Utc::now(),
        })
    }

    /// Session id carried by the event, if any
    pub fn session_id(&self) -> Option<&str> {
        match &self.event_type {
            EventType::SessionCreated { session_id, .. }
            | EventType::SessionReprocessed { session_id, .. }
            | EventType::SessionCompleted { session_id, .. }
            | EventType::SessionTimedOut { session_id, .. } => Some(session_id),
            EventType::Heartbeat { .. } => None,
        }
    }

    /// Render as one SSE frame
    pub fn to_sse(&self) -> String {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("id: {}\ndata: {}\n\n", self.id, data)
    }
}

/// Fan-out of lifecycle events to any number of observers
///
/// Slow observers lag and lose the oldest events; publishing never blocks.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<Event>,
}

impl EventBroadcaster {
    /// `capacity` events are retained per lagging observer
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to current observers; returns how many received it
    pub fn publish(&self, event: Event) -> usize {
        // No observers is the normal state when nobody has the page open
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of live observers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_event_fields() {
        let id = SessionId::new();
        let event = Event::session_completed(id, "edited");

        assert_eq!(event.session_id(), Some(id.to_string().as_str()));
        let EventType::SessionCompleted { outcome, .. } = &event.event_type else {
            panic!("expected session_completed, got {:?}", event.event_type);
        };
        assert_eq!(outcome, "edited");
    }

    #[test]
    fn test_sse_frame() {
        let event = Event::session_timed_out(SessionId::new());
        let frame = event.to_sse();
        assert!(frame.starts_with(&format!("id: {}\n", event.id)));
        assert!(frame.contains("\"type\":\"session_timed_out\""));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn test_heartbeat_has_no_session() {
        assert_eq!(Event::heartbeat("42".to_string()).session_id(), None);
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let events = EventBroadcaster::new(10);
        assert_eq!(events.publish(Event::heartbeat("1".to_string())), 0);

        let mut rx = events.subscribe();
        let event = Event::session_created(SessionId::new(), 1000);
        assert_eq!(events.publish(event.clone()), 1);
        assert_eq!(rx.recv().await.unwrap().id, event.id);
    }
}
