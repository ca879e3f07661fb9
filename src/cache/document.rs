// Document cache with time-based revalidation.
// Serves fresh cached copies, reads through otherwise, and publishes every state change.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{CacheConfig, DEFAULT_DOCUMENT_TTL_MS};
use crate::error::Result;
use crate::state::FetchState;
use crate::store::{Document, DocumentPath, DocumentStore};

use super::entry::CacheEntry;

/// Options for a document cache.
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// Freshness window in milliseconds.
    pub cache_duration_ms: u64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            cache_duration_ms: DEFAULT_DOCUMENT_TTL_MS,
        }
    }
}

impl From<&CacheConfig> for CacheOptions {
    fn from(config: &CacheConfig) -> Self {
        Self {
            cache_duration_ms: config.document_ttl_ms,
        }
    }
}

/// Per-consumer document cache.
///
/// Holds at most one entry per path. Entries are never evicted, only replaced
/// by a newer fetch or dropped by [`invalidate`](Self::invalidate).
pub struct DocumentCache {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    options: CacheOptions,
    entries: Mutex<HashMap<DocumentPath, CacheEntry<Document>>>,
    state: watch::Sender<FetchState>,
    /// Bumped by every load; only the latest load may publish its outcome.
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DocumentCache {
    pub fn new(store: Arc<dyn DocumentStore>, options: CacheOptions) -> Self {
        Self::with_clock(store, options, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn DocumentStore>,
        options: CacheOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        Self {
            store,
            clock,
            options,
            entries: Mutex::new(HashMap::new()),
            state,
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn options(&self) -> CacheOptions {
        self.options
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<DocumentPath, CacheEntry<Document>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Load the document at `path`, from cache if fresh, else from the store.
    ///
    /// Never fails: store errors land in the returned state's `error`.
    pub async fn load(&self, path: &DocumentPath) -> FetchState {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(FetchState::begin);

        if let Some(cached) = self.fresh(path) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(path = %path, "Cache HIT for document");
            self.settle(generation, path, Ok(Some(cached)));
            return self.state();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(path = %path, "Cache MISS for document, reading from store");

        let outcome = match self.store.point_read(path).await {
            Ok(snapshot) if snapshot.exists => {
                let document = Arc::new(Document::from_snapshot(path, snapshot));
                self.insert(path, Arc::clone(&document));
                Ok(Some(document))
            }
            Ok(_) => {
                debug!(path = %path, "Document does not exist");
                Ok(None)
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Document load failed");
                Err(e)
            }
        };

        self.settle(generation, path, outcome);
        self.state()
    }

    /// Drop the entry for `path` and load it again from the store.
    pub async fn reload(&self, path: &DocumentPath) -> FetchState {
        self.invalidate(path);
        self.load(path).await
    }

    /// Publish a load outcome unless a newer load has started since.
    fn settle(
        &self,
        generation: u64,
        path: &DocumentPath,
        outcome: Result<Option<Arc<Document>>>,
    ) {
        // compared under the watch lock so a newer begin cannot slip in between
        let published = self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            match outcome {
                Ok(data) => state.resolve(data),
                Err(e) => state.fail(Arc::new(e)),
            }
            true
        });

        if !published {
            debug!(path = %path, "Discarding superseded document response");
        }
    }

    /// Fresh cached value for `path`, if any.
    pub fn fresh(&self, path: &DocumentPath) -> Option<Arc<Document>> {
        let now = self.clock.now_ms();
        self.entries()
            .get(path)
            .filter(|entry| entry.is_fresh(now, self.options.cache_duration_ms))
            .map(|entry| Arc::clone(&entry.value))
    }

    fn insert(&self, path: &DocumentPath, document: Arc<Document>) {
        let entry = CacheEntry::new(document, self.clock.now_ms());
        self.entries().insert(path.clone(), entry);
        debug!(path = %path, "Cached document");
    }

    /// Forget the entry for `path` so the next load reads the store.
    pub fn invalidate(&self, path: &DocumentPath) {
        self.entries().remove(path);
        debug!(path = %path, "Invalidated cached document");
    }

    /// Forget all entries and reset counters.
    pub fn clear(&self) {
        self.entries().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        debug!("Cleared document cache");
    }

    /// Number of entries held, fresh or not.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Current state snapshot.
    pub fn state(&self) -> FetchState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.state.subscribe()
    }

    /// Get cache statistics.
    ///
    /// Returns (hits, misses, hit_rate)
    pub fn stats(&self) -> (u64, u64, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        (hits, misses, hit_rate)
    }

    /// Log current cache metrics.
    pub fn log_metrics(&self) {
        let (hits, misses, hit_rate) = self.stats();
        debug!(
            hits = hits,
            misses = misses,
            hit_rate = format!("{:.1}%", hit_rate),
            entries = self.len(),
            "Document cache metrics"
        );
    }
}
