// Document query bound to a screen.
// Tracks the current path and loads it once each time the path changes.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast::error::RecvError, watch};
use tracing::{debug, warn};

use crate::cache::{CacheOptions, DocumentCache};
use crate::events::{EventBus, Subscription};
use crate::store::{DocumentPath, DocumentStore};

use super::fetch::FetchState;

/// A screen's view of one document: current path, cache, and fetch state.
///
/// Cloning shares the same cache and path.
#[derive(Clone)]
pub struct DocumentQuery {
    cache: Arc<DocumentCache>,
    path: Arc<Mutex<Option<DocumentPath>>>,
}

impl DocumentQuery {
    /// Create a query with no path set.
    pub fn new(store: Arc<dyn DocumentStore>, options: CacheOptions) -> Self {
        Self::with_cache(DocumentCache::new(store, options))
    }

    pub fn with_cache(cache: DocumentCache) -> Self {
        Self {
            cache: Arc::new(cache),
            path: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a query and load `path` immediately.
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        path: DocumentPath,
        options: CacheOptions,
    ) -> Self {
        let query = Self::new(store, options);
        query.set_path(path).await;
        query
    }

    fn current(&self) -> MutexGuard<'_, Option<DocumentPath>> {
        self.path.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The path currently bound to this query.
    pub fn path(&self) -> Option<DocumentPath> {
        self.current().clone()
    }

    /// Bind the query to `path`, loading it if it differs from the current one.
    ///
    /// Returns whether a load ran.
    pub async fn set_path(&self, path: DocumentPath) -> bool {
        {
            let mut current = self.current();
            if current.as_ref() == Some(&path) {
                return false;
            }
            *current = Some(path.clone());
        }

        debug!(path = %path, "Document query path changed");
        self.cache.load(&path).await;
        true
    }

    /// Reload the current path, bypassing the freshness window.
    pub async fn reload(&self) -> FetchState {
        match self.path() {
            Some(path) => self.cache.reload(&path).await,
            None => self.cache.state(),
        }
    }

    pub fn snapshot(&self) -> FetchState {
        self.cache.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.cache.subscribe()
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    /// Reload whenever `bus` reports a change to the current path.
    ///
    /// The returned guard unsubscribes when dropped.
    pub fn follow(&self, bus: &EventBus) -> Subscription {
        let mut rx = bus.subscribe();
        let query = self.clone();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Some(path) = query.path().filter(|p| event.affects(p)) {
                            debug!(path = %path, "Reloading after app event");
                            query.reload().await;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Event subscriber lagged, reloading");
                        query.reload().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Subscription::new(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::AppEvent;
    use crate::state::FetchPhase;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    fn path(raw: &str) -> DocumentPath {
        DocumentPath::parse(raw).unwrap()
    }

    fn query_over(store: &Arc<MemoryStore>) -> DocumentQuery {
        DocumentQuery::with_cache(DocumentCache::with_clock(
            store.clone(),
            CacheOptions::default(),
            Arc::new(ManualClock::new(0)),
        ))
    }

    #[tokio::test]
    async fn test_key_change_triggers_exactly_one_load() {
        let store = Arc::new(MemoryStore::new());
        let k1 = path("circles/k1");
        let k2 = path("circles/k2");
        store.put(&k1, json!({"name": "One"}));
        store.put(&k2, json!({"name": "Two"}));

        let query = query_over(&store);
        assert!(query.set_path(k1.clone()).await);
        assert!(!query.set_path(k1.clone()).await);
        assert!(query.set_path(k2.clone()).await);
        assert!(!query.set_path(k2.clone()).await);

        assert_eq!(store.reads_of(&k1), 1);
        assert_eq!(store.reads_of(&k2), 1);
        assert_eq!(query.snapshot().data().map(|d| d.id.as_str()), Some("k2"));
    }

    #[tokio::test]
    async fn test_reload_uses_current_path() {
        let store = Arc::new(MemoryStore::new());
        let abc = path("circles/abc");
        store.put(&abc, json!({"name": "Tennis Club"}));

        let query = query_over(&store);
        assert_eq!(query.reload().await.phase(), FetchPhase::Idle);
        assert_eq!(store.reads(), 0);

        query.set_path(abc.clone()).await;
        query.reload().await;
        assert_eq!(store.reads_of(&abc), 2);
    }

    #[tokio::test]
    async fn test_open_scenarios() {
        let store = Arc::new(MemoryStore::new());
        let locked = path("circles/locked");
        store.deny(&locked);

        let ghost = DocumentQuery::open(store.clone(), path("circles/ghost"), CacheOptions::default())
            .await
            .snapshot();
        assert!(ghost.data.is_none());
        assert!(!ghost.loading);
        assert!(ghost.error.is_none());

        let denied = DocumentQuery::open(store.clone(), locked, CacheOptions::default())
            .await
            .snapshot();
        assert!(denied.data.is_none());
        assert!(!denied.loading);
        assert!(matches!(
            denied.error.as_deref(),
            Some(crate::error::CirclesError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_follow_reloads_on_matching_event() {
        let store = Arc::new(MemoryStore::new());
        let abc = path("circles/abc");
        store.put(&abc, json!({"name": "Tennis Club"}));

        let bus = EventBus::new();
        let query = query_over(&store);
        query.set_path(abc.clone()).await;
        let mut rx = query.subscribe();
        let _ = rx.borrow_and_update();

        let subscription = query.follow(&bus);
        store.put(&abc, json!({"name": "Tennis Club (renamed)"}));
        bus.publish(AppEvent::CircleUpdated {
            circle_id: "other".to_string(),
        });
        bus.publish(AppEvent::CircleUpdated {
            circle_id: "abc".to_string(),
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                rx.changed().await.unwrap();
                let name = rx
                    .borrow_and_update()
                    .data()
                    .and_then(|d| d.get_str("name").map(str::to_string));
                if name.as_deref() == Some("Tennis Club (renamed)") {
                    break;
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(store.reads_of(&abc), 2);
        assert!(subscription.is_active());

        drop(subscription);
        tokio::time::timeout(Duration::from_secs(5), async {
            while bus.subscriber_count() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
