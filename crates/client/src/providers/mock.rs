//! Scripted in-process backend.
//!
//! Each call to `ask` consumes the next queued script: a fixed list of
//! events, a live channel the caller feeds by hand, or an open failure.
//! Every request is recorded so callers can assert on what was sent.

use crate::backend::{AskBackend, EventStream};
use crate::sse::SseMessage;
use crate::types::{parse_docs_response, AskRequest, DocsRequest, DocumentReference};
use askdocs_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

enum Script {
    Events(Vec<AppResult<SseMessage>>),
    Channel(mpsc::UnboundedReceiver<AppResult<SseMessage>>),
    OpenError(String),
}

/// Mock backend for testing and offline development.
#[derive(Default)]
pub struct MockBackend {
    scripts: Mutex<VecDeque<Script>>,
    docs_body: Mutex<Option<String>>,
    docs_stalled: AtomicBool,
    ask_requests: Mutex<Vec<AskRequest>>,
    docs_requests: Mutex<Vec<DocsRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stream whose events carry the given `data` payloads.
    pub fn push_events<I, S>(&self, payloads: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let events = payloads
            .into_iter()
            .map(|data| Ok(SseMessage::data(data)))
            .collect();
        lock(&self.scripts).push_back(Script::Events(events));
    }

    /// Queue a stream built from explicit items, errors included.
    pub fn push_items(&self, items: Vec<AppResult<SseMessage>>) {
        lock(&self.scripts).push_back(Script::Events(items));
    }

    /// Queue a stream fed through the returned sender.
    ///
    /// The stream ends when the sender is dropped. Sends fail once the
    /// consumer has closed the stream.
    pub fn push_channel(&self) -> mpsc::UnboundedSender<AppResult<SseMessage>> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.scripts).push_back(Script::Channel(rx));
        tx
    }

    /// Make the next `ask` fail before any event is produced.
    pub fn push_open_error(&self, message: impl Into<String>) {
        lock(&self.scripts).push_back(Script::OpenError(message.into()));
    }

    /// Body returned (and strictly parsed) by every `get_docs` call.
    pub fn set_docs_body(&self, body: impl Into<String>) {
        *lock(&self.docs_body) = Some(body.into());
    }

    /// Make every later `get_docs` call hang until it is dropped.
    pub fn stall_docs(&self) {
        self.docs_stalled.store(true, Ordering::SeqCst);
    }

    /// Requests received by `ask`, in order.
    pub fn ask_requests(&self) -> Vec<AskRequest> {
        lock(&self.ask_requests).clone()
    }

    /// Requests received by `get_docs`, in order.
    pub fn docs_requests(&self) -> Vec<DocsRequest> {
        lock(&self.docs_requests).clone()
    }
}

#[async_trait::async_trait]
impl AskBackend for MockBackend {
    fn backend_name(&self) -> &str {
        "mock"
    }

    async fn ask(&self, request: &AskRequest) -> AppResult<EventStream> {
        lock(&self.ask_requests).push(request.clone());

        let script = lock(&self.scripts)
            .pop_front()
            .ok_or_else(|| AppError::Http("Mock backend has no scripted answer".to_string()))?;

        match script {
            Script::Events(items) => Ok(Box::pin(futures::stream::iter(items))),
            Script::Channel(rx) => Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            }))),
            Script::OpenError(message) => Err(AppError::Http(message)),
        }
    }

    async fn get_docs(&self, request: &DocsRequest) -> AppResult<Vec<DocumentReference>> {
        lock(&self.docs_requests).push(request.clone());

        if self.docs_stalled.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }

        let body = lock(&self.docs_body)
            .clone()
            .ok_or_else(|| AppError::Http("Mock backend has no docs response".to_string()))?;
        parse_docs_response(&body)
    }
}
