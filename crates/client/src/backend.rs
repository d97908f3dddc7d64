//! Backend abstraction.
//!
//! The accumulator and resolver only see this trait, so the HTTP transport
//! can be swapped for an in-process one in tests.

use crate::sse::SseMessage;
use crate::types::{AskRequest, DocsRequest, DocumentReference};
use askdocs_core::AppResult;
use futures::Stream;
use std::pin::Pin;

/// Stream of raw server-sent events from `/api/ask`.
///
/// Dropping the stream closes the underlying connection.
pub type EventStream = Pin<Box<dyn Stream<Item = AppResult<SseMessage>> + Send>>;

/// Trait for ask backends.
#[async_trait::async_trait]
pub trait AskBackend: Send + Sync {
    /// Get the backend name (e.g., "http", "mock").
    fn backend_name(&self) -> &str;

    /// Open the answer stream for a question.
    ///
    /// # Returns
    /// The event stream once the backend accepted the request; an error if
    /// the request could not be sent or was rejected.
    async fn ask(&self, request: &AskRequest) -> AppResult<EventStream>;

    /// Fetch display metadata for a list of document ids.
    ///
    /// The response is validated strictly; any missing field fails the whole
    /// call with [`askdocs_core::AppError::Schema`].
    async fn get_docs(&self, request: &DocsRequest) -> AppResult<Vec<DocumentReference>>;
}
