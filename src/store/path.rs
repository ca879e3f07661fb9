// Document path parsing.
// A path is a slash-delimited sequence of collection/document segment pairs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CirclesError, Result};

/// Collection holding user profiles.
pub const USERS: &str = "users";
/// Collection holding circle profiles.
pub const CIRCLES: &str = "circles";

/// Validated path to a single document, e.g. `circles/abc/events/e1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentPath {
    segments: Vec<String>,
}

impl DocumentPath {
    /// Parse and validate a document path.
    ///
    /// Leading and trailing slashes are ignored. The remaining path must have
    /// an even, non-zero number of non-empty segments.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(invalid(raw, "path is empty"));
        }

        let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid(raw, "path contains an empty segment"));
        }
        if segments.len() % 2 != 0 {
            return Err(invalid(raw, "path must end with a document id, not a collection"));
        }

        Ok(Self { segments })
    }

    /// Build a path to a document directly under a top-level collection.
    pub fn document(collection: &str, id: &str) -> Result<Self> {
        Self::parse(&format!("{}/{}", collection, id))
    }

    /// The document id (final segment).
    pub fn id(&self) -> &str {
        // parse guarantees at least two segments
        &self.segments[self.segments.len() - 1]
    }

    /// The collection the document lives in (second-to-last segment).
    pub fn collection(&self) -> &str {
        &self.segments[self.segments.len() - 2]
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    /// Path to a document in a subcollection of this document.
    pub fn child(&self, collection: &str, id: &str) -> Result<Self> {
        Self::parse(&format!("{}/{}/{}", self, collection, id))
    }
}

fn invalid(raw: &str, reason: &'static str) -> CirclesError {
    CirclesError::InvalidPath {
        path: raw.to_string(),
        reason,
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl FromStr for DocumentPath {
    type Err = CirclesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocumentPath {
    type Error = CirclesError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<DocumentPath> for String {
    fn from(path: DocumentPath) -> Self {
        path.to_string()
    }
}
