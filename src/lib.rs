// Data layer for the circles app.
// Cached document reads over a remote document store, plus app-wide update events.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod state;
pub mod store;

pub use cache::{CacheOptions, DocumentCache, ImagePrefetcher};
pub use config::Config;
pub use error::{CirclesError, Result};
pub use events::{AppEvent, EventBus, Subscription};
pub use state::{DocumentQuery, FetchPhase, FetchState};
pub use store::{Document, DocumentPath, DocumentStore, MemoryStore, RestStore, Snapshot};
