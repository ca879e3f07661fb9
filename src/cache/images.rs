// Image prefetch cache.
// Downloads image bytes ahead of display and keeps them for a fixed window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{CirclesError, Result};

use super::entry::CacheEntry;

/// Source of raw image bytes.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Image source backed by plain HTTP GETs.
pub struct HttpImageSource {
    client: Client,
}

impl HttpImageSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CirclesError::Http)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CirclesError::Server {
                status: status.as_u16(),
                message: format!("image fetch failed for {}", url),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Keeps prefetched image bytes keyed by URL.
///
/// Only successful downloads are remembered; a failed URL is fetched again on
/// the next request.
pub struct ImagePrefetcher {
    source: Arc<dyn ImageSource>,
    clock: Arc<dyn Clock>,
    ttl_ms: u64,
    entries: Mutex<HashMap<String, CacheEntry<Vec<u8>>>>,
}

impl ImagePrefetcher {
    pub fn new(source: Arc<dyn ImageSource>, ttl_ms: u64) -> Self {
        Self::with_clock(source, ttl_ms, Arc::new(SystemClock))
    }

    pub fn with_clock(source: Arc<dyn ImageSource>, ttl_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            ttl_ms,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<Vec<u8>>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fresh bytes for `url`, if prefetched.
    pub fn get(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        let now = self.clock.now_ms();
        self.entries()
            .get(url)
            .filter(|entry| entry.is_fresh(now, self.ttl_ms))
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Download `url` unless a fresh copy is held. Returns the bytes.
    pub async fn prefetch(&self, url: &str) -> Result<Arc<Vec<u8>>> {
        if let Some(bytes) = self.get(url) {
            trace!(url = url, "Image already prefetched");
            return Ok(bytes);
        }

        let bytes = Arc::new(self.source.fetch(url).await?);
        let entry = CacheEntry::new(Arc::clone(&bytes), self.clock.now_ms());
        self.entries().insert(url.to_string(), entry);
        debug!(url = url, size = bytes.len(), "Prefetched image");
        Ok(bytes)
    }

    /// Prefetch several URLs, skipping failures. Returns how many are now held.
    pub async fn prefetch_all<I, S>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ready = 0;
        for url in urls {
            let url = url.as_ref();
            match self.prefetch(url).await {
                Ok(_) => ready += 1,
                Err(e) => warn!(url = url, error = %e, "Image prefetch failed"),
            }
        }
        ready
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingSource {
        fetches: AtomicU64,
    }

    #[async_trait]
    impl ImageSource for CountingSource {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if url.contains("broken") {
                return Err(CirclesError::Server {
                    status: 404,
                    message: "missing".to_string(),
                });
            }
            Ok(url.as_bytes().to_vec())
        }
    }

    #[tokio::test]
    async fn test_prefetch_is_memoized_within_ttl() {
        let source = Arc::new(CountingSource::default());
        let clock = Arc::new(ManualClock::new(0));
        let images = ImagePrefetcher::with_clock(source.clone(), 1_000, clock.clone());

        images.prefetch("https://img/logo.png").await.unwrap();
        clock.set(999);
        images.prefetch("https://img/logo.png").await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        clock.set(1_000);
        assert!(images.get("https://img/logo.png").is_none());
        images.prefetch("https://img/logo.png").await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_memoized() {
        let source = Arc::new(CountingSource::default());
        let images = ImagePrefetcher::with_clock(source.clone(), 1_000, Arc::new(ManualClock::new(0)));

        let ready = images
            .prefetch_all(["https://img/a.png", "https://img/broken.png"])
            .await;
        assert_eq!(ready, 1);
        assert_eq!(images.len(), 1);

        assert!(images.prefetch("https://img/broken.png").await.is_err());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }
}
