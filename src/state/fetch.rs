// Fetch state for a single document consumer.
// Tracks the current value, loading flag, and last error the UI renders from.

use std::sync::Arc;

use crate::error::CirclesError;
use crate::store::Document;

/// Lifecycle phase of a document fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPhase {
    /// No load has been issued yet.
    #[default]
    Idle,
    Loading,
    /// Last load produced a document.
    Ready,
    /// Last load found no document at the path.
    Empty,
    /// Last load failed.
    Errored,
}

/// Observable state of a document consumer.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    pub data: Option<Arc<Document>>,
    pub loading: bool,
    pub error: Option<Arc<CirclesError>>,
    settled: bool,
}

impl FetchState {
    pub fn phase(&self) -> FetchPhase {
        if self.loading {
            FetchPhase::Loading
        } else if self.error.is_some() {
            FetchPhase::Errored
        } else if self.data.is_some() {
            FetchPhase::Ready
        } else if self.settled {
            FetchPhase::Empty
        } else {
            FetchPhase::Idle
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn data(&self) -> Option<&Document> {
        self.data.as_deref()
    }

    /// Enter the loading phase. Keeps the previous value, clears the error.
    pub(crate) fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Settle with a document or with "not found".
    pub(crate) fn resolve(&mut self, data: Option<Arc<Document>>) {
        self.data = data;
        self.error = None;
        self.finish();
    }

    /// Settle with a failure. The value is cleared.
    pub(crate) fn fail(&mut self, error: Arc<CirclesError>) {
        self.data = None;
        self.error = Some(error);
        self.finish();
    }

    fn finish(&mut self) {
        self.loading = false;
        self.settled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn doc(id: &str) -> Arc<Document> {
        Arc::new(Document {
            id: id.to_string(),
            fields: Map::new(),
        })
    }

    #[test]
    fn test_phase_transitions() {
        let mut state = FetchState::default();
        assert_eq!(state.phase(), FetchPhase::Idle);

        state.begin();
        assert_eq!(state.phase(), FetchPhase::Loading);

        state.resolve(Some(doc("abc")));
        assert_eq!(state.phase(), FetchPhase::Ready);
        assert_eq!(state.data().map(|d| d.id.as_str()), Some("abc"));

        state.begin();
        state.resolve(None);
        assert_eq!(state.phase(), FetchPhase::Empty);
        assert!(state.data.is_none());
    }

    #[test]
    fn test_begin_keeps_value_and_clears_error() {
        let mut state = FetchState::default();
        state.resolve(Some(doc("abc")));
        state.begin();
        assert!(state.data.is_some());

        state.fail(Arc::new(CirclesError::Unauthorized));
        assert_eq!(state.phase(), FetchPhase::Errored);
        assert!(state.data.is_none());

        state.begin();
        assert!(state.error.is_none());
        assert!(state.is_loading());
    }
}
