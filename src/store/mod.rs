// Document store module.
// Provides the point-read seam the cache depends on, plus REST and in-memory implementations.

pub mod client;
pub mod memory;
pub mod path;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use client::RestStore;
pub use memory::MemoryStore;
pub use path::{CIRCLES, DocumentPath, USERS};
pub use types::{Document, Snapshot};

/// Remote document store supporting point lookups by path.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read exactly one document.
    ///
    /// A missing document is `Ok` with `exists == false`; only transport and
    /// permission failures are errors.
    async fn point_read(&self, path: &DocumentPath) -> Result<Snapshot>;
}
