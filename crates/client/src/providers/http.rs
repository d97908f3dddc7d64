//! HTTP backend.
//!
//! Speaks to the demo's API routes: `POST /api/ask` answers with a
//! `text/event-stream`, `POST /api/docs-get` with a JSON array.

use crate::backend::{AskBackend, EventStream};
use crate::sse;
use crate::types::{parse_docs_response, AskRequest, DocsRequest, DocumentReference};
use askdocs_core::{AppError, AppResult};
use reqwest::header::{ACCEPT, CONTENT_TYPE};

/// Ask backend reached over HTTP.
pub struct HttpBackend {
    /// Base URL the API routes hang off
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend for the default local endpoint.
    pub fn new() -> Self {
        Self::with_base_url(askdocs_core::config::DEFAULT_ENDPOINT)
    }

    /// Create a backend with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a non-success response into an [`AppError::Http`].
pub(crate) async fn check_status(
    response: reqwest::Response,
    what: &str,
) -> AppResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(AppError::Http(format!(
        "{} failed ({}): {}",
        what, status, error_text
    )))
}

#[async_trait::async_trait]
impl AskBackend for HttpBackend {
    fn backend_name(&self) -> &str {
        "http"
    }

    async fn ask(&self, request: &AskRequest) -> AppResult<EventStream> {
        tracing::info!("Opening answer stream for database '{}'", request.database);
        tracing::debug!("Request: {:?}", request);

        let response = self
            .client
            .post(self.url("/api/ask"))
            .header(ACCEPT, "text/event-stream")
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Http(format!("Failed to send ask request: {}", e)))?;

        let response = check_status(response, "Ask request").await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with("text/event-stream") {
            tracing::warn!(
                "Answer stream has unexpected content type '{}'",
                content_type
            );
        }

        Ok(sse::decode(response.bytes_stream()))
    }

    async fn get_docs(&self, request: &DocsRequest) -> AppResult<Vec<DocumentReference>> {
        tracing::info!(
            "Fetching {} document references from database '{}'",
            request.ids.len(),
            request.database
        );

        let response = self
            .client
            .post(self.url("/api/docs-get"))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Http(format!("Failed to send docs request: {}", e)))?;

        let response = check_status(response, "Docs request").await?;

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Http(format!("Failed to read docs response: {}", e)))?;

        let docs = parse_docs_response(&body)?;
        tracing::debug!("Received {} document references", docs.len());
        Ok(docs)
    }
}
