//! Ask session: one accumulator plus one reference resolver.

use crate::accumulator::{AnswerAccumulator, AnswerSnapshot};
use crate::backend::AskBackend;
use crate::resolver::ReferenceResolver;
use crate::types::DocumentReference;
use askdocs_core::AppResult;
use serde::Serialize;
use std::sync::Arc;

/// Final result of one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskOutcome {
    pub answer: AnswerSnapshot,
    pub references: Vec<DocumentReference>,
}

/// Question → streamed answer → resolved references.
pub struct AskSession {
    accumulator: AnswerAccumulator,
    resolver: ReferenceResolver,
}

impl AskSession {
    pub fn new(backend: Arc<dyn AskBackend>) -> Self {
        Self {
            accumulator: AnswerAccumulator::new(backend.clone()),
            resolver: ReferenceResolver::new(backend),
        }
    }

    pub fn accumulator(&self) -> &AnswerAccumulator {
        &self.accumulator
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    /// Ask a question and resolve the documents the answer is based on.
    ///
    /// Stale references are cleared before the question goes out. Returns
    /// `Ok(None)` for an empty question. A cycle superseded by a newer
    /// question skips resolution; the newer cycle owns the references.
    pub async fn ask(&self, database: &str, question: &str) -> AppResult<Option<AskOutcome>> {
        if question.is_empty() {
            return Ok(None);
        }

        let lookup = self.resolver.clear_related();

        let answer = match self.accumulator.ask_question(database, question).await? {
            Some(answer) => answer,
            None => return Ok(None),
        };

        let references = if answer.records.is_empty() {
            Vec::new()
        } else if self.accumulator.is_current(answer.generation) {
            self.resolver
                .resolve_for(lookup, database, &answer.records)
                .await
        } else {
            tracing::debug!("Cycle {} superseded, skipping references", answer.generation);
            Vec::new()
        };

        Ok(Some(AskOutcome { answer, references }))
    }

    /// Stop whatever is in flight, the answer stream or the reference
    /// lookup. Returns `false` when nothing was running.
    pub fn cancel(&self) -> bool {
        let stream = self.accumulator.cancel();
        let lookup = self.resolver.cancel();
        stream || lookup
    }

    /// Drop the answer and the references.
    pub fn clear(&self) {
        self.accumulator.clear_answer();
        self.resolver.clear_related();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::CyclePhase;
    use crate::providers::MockBackend;

    #[tokio::test]
    async fn test_full_cycle_with_references() {
        let backend = Arc::new(MockBackend::new());
        backend.push_events([
            r#"{"answer":"Netlify "}"#,
            r#"{"answer":"is a platform.","done":true}"#,
            r#"{"records":["doc1"]}"#,
        ]);
        backend.set_docs_body(r#"[{"id":"doc1","title":"Welcome","slug":"docs.netlify.com"}]"#);
        let session = AskSession::new(backend.clone());

        let outcome = session
            .ask("netlifyDocs", "What is Netlify?")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.answer.answer.as_deref(), Some("Netlify is a platform."));
        assert_eq!(outcome.references.len(), 1);
        assert_eq!(outcome.references[0].link(), "https://docs.netlify.com");
        assert_eq!(session.resolver().references(), outcome.references);
        assert_eq!(backend.docs_requests()[0].ids, vec!["doc1".to_string()]);
    }

    #[tokio::test]
    async fn test_done_without_records_skips_resolution() {
        let backend = Arc::new(MockBackend::new());
        backend.push_events([r#"{"answer":"Short answer.","done":true}"#]);
        let session = AskSession::new(backend.clone());

        let outcome = session.ask("db", "q").await.unwrap().unwrap();
        assert_eq!(outcome.answer.phase, CyclePhase::TerminatedByDone);
        assert!(outcome.references.is_empty());
        assert!(backend.docs_requests().is_empty());
    }

    #[tokio::test]
    async fn test_new_question_clears_stale_references() {
        let backend = Arc::new(MockBackend::new());
        backend.push_events([r#"{"answer":"one"}"#, r#"{"records":["doc1"]}"#]);
        backend.push_events([r#"{"answer":"two","done":true}"#]);
        backend.set_docs_body(r#"[{"id":"doc1","title":"Welcome","slug":"s"}]"#);
        let session = AskSession::new(backend);

        session.ask("db", "first").await.unwrap();
        assert_eq!(session.resolver().references().len(), 1);

        session.ask("db", "second").await.unwrap();
        assert!(session.resolver().references().is_empty());
        assert_eq!(
            session.accumulator().snapshot().answer.as_deref(),
            Some("two")
        );
    }

    #[tokio::test]
    async fn test_broken_references_still_return_answer() {
        let backend = Arc::new(MockBackend::new());
        backend.push_events([r#"{"answer":"ok","done":true}"#, r#"{"records":["doc1"]}"#]);
        backend.set_docs_body(r#"[{"id":"doc1","slug":"s"}]"#);
        let session = AskSession::new(backend);

        let outcome = session.ask("db", "q").await.unwrap().unwrap();
        assert_eq!(outcome.answer.answer.as_deref(), Some("ok"));
        assert!(outcome.references.is_empty());
    }

    #[tokio::test]
    async fn test_empty_question_touches_nothing() {
        let backend = Arc::new(MockBackend::new());
        backend.set_docs_body(r#"[{"id":"doc1","title":"Welcome","slug":"s"}]"#);
        let session = AskSession::new(backend.clone());

        session
            .resolver()
            .resolve("db", &["doc1".to_string()])
            .await;
        assert!(session.ask("db", "").await.unwrap().is_none());
        assert_eq!(session.resolver().references().len(), 1);
        assert!(backend.ask_requests().is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let backend = Arc::new(MockBackend::new());
        backend.push_events([r#"{"answer":"a"}"#, r#"{"records":["doc1"]}"#]);
        backend.set_docs_body(r#"[{"id":"doc1","title":"Welcome","slug":"s"}]"#);
        let session = AskSession::new(backend);

        session.ask("db", "q").await.unwrap();
        session.clear();

        assert_eq!(session.accumulator().snapshot().answer, None);
        assert!(session.resolver().references().is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_question_is_sent() {
        let backend = Arc::new(MockBackend::new());
        backend.push_events([r#"{"answer":"hi","done":true}"#]);
        let session = AskSession::new(backend.clone());

        let outcome = session.ask("netlifyDocs", " ").await.unwrap().unwrap();
        assert_eq!(outcome.answer.answer.as_deref(), Some("hi"));
        assert_eq!(backend.ask_requests()[0].question, " ");
    }

    #[tokio::test]
    async fn test_cancel_stops_stalled_reference_lookup() {
        let backend = Arc::new(MockBackend::new());
        backend.push_events([r#"{"answer":"ok","done":true}"#, r#"{"records":["doc1"]}"#]);
        backend.stall_docs();
        let session = Arc::new(AskSession::new(backend.clone()));
        let mut references = session.resolver().subscribe();

        let task = {
            let session = session.clone();
            tokio::spawn(async move { session.ask("db", "q").await })
        };
        references.wait_for(|s| s.is_resolving).await.unwrap();

        assert!(session.cancel());
        let outcome = task.await.unwrap().unwrap().unwrap();

        assert_eq!(outcome.answer.answer.as_deref(), Some("ok"));
        assert_eq!(outcome.answer.phase, CyclePhase::TerminatedByRecords);
        assert!(outcome.references.is_empty());
        assert!(!session.resolver().subscribe().borrow().is_resolving);
        assert_eq!(backend.docs_requests().len(), 1);
        assert!(!session.cancel());
    }
}
