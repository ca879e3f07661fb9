// State management module.
// Handles per-screen document fetch state and the path-bound document query.

pub mod fetch;
pub mod query;

pub use fetch::{FetchPhase, FetchState};
pub use query::DocumentQuery;
