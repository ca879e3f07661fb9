// App-wide update notifications.
// Screens publish typed events after mutations; other screens subscribe to refresh.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::store::{CIRCLES, DocumentPath, USERS};

/// Buffered events per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 64;

/// An update another screen may care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A user edited their profile.
    ProfileUpdated { user_id: String },
    /// A circle profile was edited.
    CircleUpdated { circle_id: String },
    /// Any other document was written (events, memberships, favorites).
    DocumentWritten { path: DocumentPath },
}

impl AppEvent {
    /// Whether this event touches the document at `path`.
    pub fn affects(&self, path: &DocumentPath) -> bool {
        match self {
            AppEvent::ProfileUpdated { user_id } => is_top_level(path, USERS, user_id),
            AppEvent::CircleUpdated { circle_id } => is_top_level(path, CIRCLES, circle_id),
            AppEvent::DocumentWritten { path: written } => written == path,
        }
    }
}

fn is_top_level(path: &DocumentPath, collection: &str, id: &str) -> bool {
    path.segments().count() == 2 && path.collection() == collection && path.id() == id
}

/// In-process event bus, created once at app start.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Returns how many subscribers received it.
    pub fn publish(&self, event: AppEvent) -> usize {
        trace!(event = ?event, "Publishing app event");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Guard for a background subscription task; dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> DocumentPath {
        DocumentPath::parse(raw).unwrap()
    }

    #[test]
    fn test_affects() {
        let circle = AppEvent::CircleUpdated {
            circle_id: "abc".to_string(),
        };
        assert!(circle.affects(&path("circles/abc")));
        assert!(!circle.affects(&path("circles/xyz")));
        assert!(!circle.affects(&path("users/abc")));
        assert!(!circle.affects(&path("circles/abc/events/e1")));

        let profile = AppEvent::ProfileUpdated {
            user_id: "u1".to_string(),
        };
        assert!(profile.affects(&path("users/u1")));

        let written = AppEvent::DocumentWritten {
            path: path("circles/abc/events/e1"),
        };
        assert!(written.affects(&path("circles/abc/events/e1")));
        assert!(!written.affects(&path("circles/abc")));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(
            bus.publish(AppEvent::ProfileUpdated {
                user_id: "u1".to_string()
            }),
            0
        );

        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        bus.publish(AppEvent::CircleUpdated {
            circle_id: "abc".to_string(),
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            AppEvent::CircleUpdated {
                circle_id: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = AppEvent::DocumentWritten {
            path: path("users/u1/favorites/abc"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "document_written", "path": "users/u1/favorites/abc"})
        );
    }
}
