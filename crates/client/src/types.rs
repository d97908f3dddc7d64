//! Wire types for the ask backend.

use askdocs_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/ask`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskRequest {
    /// Free-text question
    pub question: String,

    /// Database selector
    pub database: String,
}

impl AskRequest {
    pub fn new(question: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            database: database.into(),
        }
    }
}

/// Body of `POST /api/docs-get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocsRequest {
    pub database: String,
    pub ids: Vec<String>,
}

impl DocsRequest {
    pub fn new(database: impl Into<String>, ids: &[String]) -> Self {
        Self {
            database: database.into(),
            ids: ids.to_vec(),
        }
    }
}

/// Display metadata for a document the backend used as context.
///
/// All three fields are required; a response missing any of them is
/// rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference {
    pub id: String,
    pub title: String,
    pub slug: String,
}

impl DocumentReference {
    /// Link to the document page.
    pub fn link(&self) -> String {
        format!("https://{}", self.slug)
    }
}

/// Parse a `/api/docs-get` response body.
pub fn parse_docs_response(body: &str) -> AppResult<Vec<DocumentReference>> {
    serde_json::from_str(body)
        .map_err(|e| AppError::Schema(format!("Invalid document references: {}", e)))
}

/// Raw JSON payload of one event on the answer stream.
#[derive(Debug, Deserialize)]
struct EventPayload {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    records: Option<Vec<String>>,
    #[serde(default)]
    done: Option<bool>,
}

/// One decoded event of the answer stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Partial answer text; `done` marks the last fragment.
    Token { answer: String, done: bool },

    /// Identifiers of the documents the answer is based on. Terminal.
    Records(Vec<String>),
}

impl StreamEvent {
    /// Decode the `data` field of a server-sent event.
    ///
    /// A non-empty `records` array wins over any answer text carried in the
    /// same payload. An empty `records` array is treated as absent.
    pub fn parse(data: &str) -> AppResult<Self> {
        let payload: EventPayload = serde_json::from_str(data)?;

        match payload.records {
            Some(records) if !records.is_empty() => Ok(StreamEvent::Records(records)),
            _ => Ok(StreamEvent::Token {
                answer: payload.answer.unwrap_or_default(),
                done: payload.done.unwrap_or(false),
            }),
        }
    }
}
