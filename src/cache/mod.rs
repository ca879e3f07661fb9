// Cache module for in-memory caching of remote data.
// Holds per-consumer document caches and the image prefetch cache.

pub mod document;
pub mod entry;
pub mod images;

pub use document::{CacheOptions, DocumentCache};
pub use entry::CacheEntry;
pub use images::{HttpImageSource, ImagePrefetcher, ImageSource};
