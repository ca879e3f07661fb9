// In-memory document store.
// Backs tests and offline runs; counts point reads so callers can observe cache behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{CirclesError, Result};

use super::DocumentStore;
use super::path::DocumentPath;
use super::types::Snapshot;

/// Scripted failure for a path.
#[derive(Debug, Clone)]
enum Failure {
    PermissionDenied,
    Status(u16),
}

#[derive(Debug, Default)]
struct Inner {
    documents: HashMap<DocumentPath, Map<String, Value>>,
    failures: HashMap<DocumentPath, Failure>,
    reads: HashMap<DocumentPath, u64>,
}

/// Document store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    total_reads: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create or replace the document at `path`.
    ///
    /// Non-object values are stored as an empty document.
    pub fn put(&self, path: &DocumentPath, fields: Value) {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.lock().documents.insert(path.clone(), fields);
    }

    /// Delete the document at `path`.
    pub fn remove(&self, path: &DocumentPath) {
        self.lock().documents.remove(path);
    }

    /// Make reads of `path` fail with a permission error.
    pub fn deny(&self, path: &DocumentPath) {
        self.lock()
            .failures
            .insert(path.clone(), Failure::PermissionDenied);
    }

    /// Make reads of `path` fail with an HTTP status.
    pub fn fail_with_status(&self, path: &DocumentPath, status: u16) {
        self.lock()
            .failures
            .insert(path.clone(), Failure::Status(status));
    }

    /// Stop failing reads of `path`.
    pub fn clear_failure(&self, path: &DocumentPath) {
        self.lock().failures.remove(path);
    }

    /// Total point reads served, including failed ones.
    pub fn reads(&self) -> u64 {
        self.total_reads.load(Ordering::SeqCst)
    }

    /// Point reads of a single path.
    pub fn reads_of(&self, path: &DocumentPath) -> u64 {
        self.lock().reads.get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn point_read(&self, path: &DocumentPath) -> Result<Snapshot> {
        self.total_reads.fetch_add(1, Ordering::SeqCst);

        let mut inner = self.lock();
        *inner.reads.entry(path.clone()).or_insert(0) += 1;

        if let Some(failure) = inner.failures.get(path) {
            return Err(match failure {
                Failure::PermissionDenied => CirclesError::PermissionDenied(format!(
                    "read of {} denied",
                    path
                )),
                Failure::Status(status) => CirclesError::Server {
                    status: *status,
                    message: format!("read of {} failed", path),
                },
            });
        }

        Ok(match inner.documents.get(path) {
            Some(fields) => Snapshot::found(path.id(), fields.clone()),
            None => Snapshot::missing(path.id()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_read_and_count() {
        let store = MemoryStore::new();
        let path = DocumentPath::parse("circles/abc").unwrap();
        store.put(&path, json!({"name": "Tennis Club"}));

        let snapshot = store.point_read(&path).await.unwrap();
        assert!(snapshot.exists);
        assert_eq!(snapshot.fields["name"], json!("Tennis Club"));
        assert_eq!(store.reads(), 1);
        assert_eq!(store.reads_of(&path), 1);
    }

    #[tokio::test]
    async fn test_missing_and_failing_paths() {
        let store = MemoryStore::new();
        let ghost = DocumentPath::parse("circles/ghost").unwrap();
        let locked = DocumentPath::parse("circles/locked").unwrap();
        store.deny(&locked);

        assert!(!store.point_read(&ghost).await.unwrap().exists);
        assert!(matches!(
            store.point_read(&locked).await,
            Err(CirclesError::PermissionDenied(_))
        ));

        store.clear_failure(&locked);
        assert!(!store.point_read(&locked).await.unwrap().exists);
        assert_eq!(store.reads(), 3);
    }
}
