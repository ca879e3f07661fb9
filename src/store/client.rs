// Document store HTTP client.
// Performs Firestore REST point reads and maps HTTP statuses onto store errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client, Response, StatusCode, Url,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{CirclesError, Result};

use super::DocumentStore;
use super::path::DocumentPath;
use super::types::{RawDocument, Snapshot};

/// Error envelope returned by the REST API on failure.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// REST client for a Firestore-compatible document store.
pub struct RestStore {
    client: Client,
    documents_root: Url,
    api_key: Option<String>,
    id_token: Option<String>,
}

impl RestStore {
    /// Create a client for the project and database named in `config`.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        if config.project_id.trim().is_empty() {
            return Err(CirclesError::Config(
                "store.project_id is required (set CIRCLES_STORE__PROJECT_ID)".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("circles"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(CirclesError::Http)?;

        let mut documents_root = Url::parse(&config.base_url)
            .map_err(|e| CirclesError::Config(format!("invalid store.base_url: {}", e)))?;
        documents_root
            .path_segments_mut()
            .map_err(|_| CirclesError::Config("store.base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend([
                "projects",
                config.project_id.as_str(),
                "databases",
                config.database.as_str(),
                "documents",
            ]);

        Ok(Self {
            client,
            documents_root,
            api_key: config.api_key.clone(),
            id_token: config.id_token.clone(),
        })
    }

    /// Full URL of the document at `path`.
    pub fn document_url(&self, path: &DocumentPath) -> Url {
        let mut url = self.documents_root.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(path.segments());
        }
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        url
    }

    /// Make a GET request, returning `None` on 404.
    async fn get(&self, url: Url) -> Result<Option<Response>> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.id_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(CirclesError::Http)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.check_response(response).await.map(Some)
    }

    /// Check response status and convert errors.
    async fn check_response(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let (message, code) = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(parsed) => (parsed.error.message, parsed.error.status),
            Err(_) => (body, String::new()),
        };

        match status {
            StatusCode::UNAUTHORIZED => Err(CirclesError::Unauthorized),
            StatusCode::FORBIDDEN => Err(CirclesError::PermissionDenied(message)),
            _ if code == "PERMISSION_DENIED" => Err(CirclesError::PermissionDenied(message)),
            status => Err(CirclesError::Server {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

#[async_trait]
impl DocumentStore for RestStore {
    async fn point_read(&self, path: &DocumentPath) -> Result<Snapshot> {
        debug!(path = %path, "Point read");

        let response = match self.get(self.document_url(path)).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                debug!(path = %path, "Document not found");
                return Ok(Snapshot::missing(path.id()));
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Point read failed");
                return Err(e);
            }
        };

        let body = response.text().await?;
        let raw: RawDocument = serde_json::from_str(&body).map_err(|e| {
            warn!(path = %path, error = %e, "Malformed document body");
            CirclesError::Json(e)
        })?;
        Ok(Snapshot::found(path.id(), raw.into_fields()))
    }
}
