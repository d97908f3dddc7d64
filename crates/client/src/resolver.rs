//! Reference resolver.
//!
//! Turns the record ids reported by the answer stream into display metadata.
//! A failed or malformed lookup degrades to "no references".

use crate::backend::AskBackend;
use crate::types::{DocsRequest, DocumentReference};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Resolved references as seen by a renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceSet {
    /// Resolution this set belongs to
    pub generation: u64,

    /// A lookup is in flight
    pub is_resolving: bool,

    pub references: Vec<DocumentReference>,
}

#[derive(Debug, Default)]
struct LookupSlot {
    generation: u64,
    token: Option<CancellationToken>,
}

pub struct ReferenceResolver {
    backend: Arc<dyn AskBackend>,
    slot: Mutex<LookupSlot>,
    state: watch::Sender<ReferenceSet>,
}

impl ReferenceResolver {
    pub fn new(backend: Arc<dyn AskBackend>) -> Self {
        let (state, _) = watch::channel(ReferenceSet::default());
        Self {
            backend,
            slot: Mutex::new(LookupSlot::default()),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ReferenceSet> {
        self.state.subscribe()
    }

    /// Currently displayed references.
    pub fn references(&self) -> Vec<DocumentReference> {
        self.state.borrow().references.clone()
    }

    /// Resolve `ids` against `database`.
    ///
    /// An empty list clears the references without any request. On failure
    /// the references are cleared and a warning is logged. A resolution
    /// superseded by a newer one or by [`clear_related`](Self::clear_related)
    /// does not publish its result.
    pub async fn resolve(&self, database: &str, ids: &[String]) -> Vec<DocumentReference> {
        let generation = self.next_generation();
        self.resolve_for(generation, database, ids).await
    }

    /// Resolve `ids` under a generation handed out earlier by
    /// [`clear_related`](Self::clear_related).
    ///
    /// Nothing is requested when that generation is no longer the latest.
    pub async fn resolve_for(
        &self,
        generation: u64,
        database: &str,
        ids: &[String],
    ) -> Vec<DocumentReference> {
        if ids.is_empty() {
            self.publish(generation, false, Vec::new());
            return Vec::new();
        }

        let token = match self.begin_lookup(generation) {
            Some(token) => token,
            None => {
                tracing::debug!("Skipping superseded reference resolution {}", generation);
                return Vec::new();
            }
        };

        self.state.send_if_modified(|current| {
            if current.generation != generation {
                return false;
            }
            current.is_resolving = true;
            true
        });

        let request = DocsRequest::new(database, ids);
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.backend.get_docs(&request) => Some(result),
        };
        self.end_lookup(generation);

        let references = match result {
            None => {
                tracing::info!("Reference lookup {} cancelled", generation);
                Vec::new()
            }
            Some(Ok(references)) => references,
            Some(Err(e)) => {
                tracing::warn!(
                    "Could not resolve {} document references from '{}': {}",
                    ids.len(),
                    database,
                    e
                );
                Vec::new()
            }
        };

        if !self.publish(generation, false, references.clone()) {
            tracing::debug!("Discarding superseded reference resolution {}", generation);
        }
        references
    }

    /// Forget the displayed references and stop any lookup in flight.
    ///
    /// Returns the generation a follow-up [`resolve_for`](Self::resolve_for)
    /// should run under.
    pub fn clear_related(&self) -> u64 {
        let generation = self.next_generation();
        self.publish(generation, false, Vec::new());
        generation
    }

    /// Stop the lookup in flight, if any. Its resolution publishes an empty
    /// list.
    pub fn cancel(&self) -> bool {
        match self.lock_slot().token.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn next_generation(&self) -> u64 {
        let mut slot = self.lock_slot();
        slot.generation += 1;
        if let Some(previous) = slot.token.take() {
            previous.cancel();
        }

        let generation = slot.generation;
        self.state.send_modify(|current| {
            current.generation = current.generation.max(generation);
        });
        generation
    }

    fn begin_lookup(&self, generation: u64) -> Option<CancellationToken> {
        let mut slot = self.lock_slot();
        if slot.generation != generation {
            return None;
        }

        let token = CancellationToken::new();
        slot.token = Some(token.clone());
        Some(token)
    }

    fn end_lookup(&self, generation: u64) {
        let mut slot = self.lock_slot();
        if slot.generation == generation {
            slot.token = None;
        }
    }

    fn publish(
        &self,
        generation: u64,
        is_resolving: bool,
        references: Vec<DocumentReference>,
    ) -> bool {
        self.state.send_if_modified(|current| {
            if current.generation != generation {
                return false;
            }
            current.is_resolving = is_resolving;
            current.references = references;
            true
        })
    }

    fn lock_slot(&self) -> MutexGuard<'_, LookupSlot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockBackend;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_resolve_preserves_order() {
        let backend = Arc::new(MockBackend::new());
        backend.set_docs_body(
            r#"[{"id":"a","title":"T1","slug":"s1"},{"id":"b","title":"T2","slug":"s2"}]"#,
        );
        let resolver = ReferenceResolver::new(backend.clone());

        let resolved = resolver.resolve("netlifyDocs", &ids(&["a", "b"])).await;

        assert_eq!(
            resolved,
            vec![
                DocumentReference {
                    id: "a".to_string(),
                    title: "T1".to_string(),
                    slug: "s1".to_string(),
                },
                DocumentReference {
                    id: "b".to_string(),
                    title: "T2".to_string(),
                    slug: "s2".to_string(),
                },
            ]
        );
        assert_eq!(resolver.references(), resolved);
        assert_eq!(
            backend.docs_requests(),
            vec![DocsRequest::new("netlifyDocs", &ids(&["a", "b"]))]
        );
    }

    #[tokio::test]
    async fn test_empty_ids_issue_no_request() {
        let backend = Arc::new(MockBackend::new());
        backend.set_docs_body(r#"[{"id":"a","title":"T1","slug":"s1"}]"#);
        let resolver = ReferenceResolver::new(backend.clone());

        resolver.resolve("db", &ids(&["a"])).await;
        assert_eq!(resolver.references().len(), 1);

        let resolved = resolver.resolve("db", &[]).await;
        assert!(resolved.is_empty());
        assert!(resolver.references().is_empty());
        assert_eq!(backend.docs_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_field_degrades_to_no_references() {
        let backend = Arc::new(MockBackend::new());
        backend.set_docs_body(r#"[{"id":"a","slug":"s1"}]"#);
        let resolver = ReferenceResolver::new(backend);

        let resolved = resolver.resolve("db", &ids(&["a"])).await;
        assert!(resolved.is_empty());

        let state = resolver.subscribe().borrow().clone();
        assert!(state.references.is_empty());
        assert!(!state.is_resolving);
    }

    #[tokio::test]
    async fn test_transport_failure_degrades_to_no_references() {
        // No docs body scripted: the mock fails the request
        let backend = Arc::new(MockBackend::new());
        let resolver = ReferenceResolver::new(backend);

        assert!(resolver.resolve("db", &ids(&["a"])).await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_related() {
        let backend = Arc::new(MockBackend::new());
        backend.set_docs_body(r#"[{"id":"a","title":"T1","slug":"s1"}]"#);
        let resolver = ReferenceResolver::new(backend);

        resolver.resolve("db", &ids(&["a"])).await;
        resolver.clear_related();
        assert!(resolver.references().is_empty());
    }

    #[tokio::test]
    async fn test_superseded_resolution_is_not_published() {
        let backend = Arc::new(MockBackend::new());
        backend.set_docs_body(r#"[{"id":"a","title":"T1","slug":"s1"}]"#);
        let resolver = ReferenceResolver::new(backend);

        let stale = resolver.next_generation();
        resolver.clear_related();

        assert!(!resolver.publish(
            stale,
            false,
            vec![DocumentReference {
                id: "a".to_string(),
                title: "T1".to_string(),
                slug: "s1".to_string(),
            }],
        ));
        assert!(resolver.references().is_empty());
    }

    #[tokio::test]
    async fn test_stale_generation_requests_nothing() {
        let backend = Arc::new(MockBackend::new());
        backend.set_docs_body(r#"[{"id":"a","title":"T1","slug":"s1"}]"#);
        let resolver = ReferenceResolver::new(backend.clone());

        let stale = resolver.clear_related();
        let current = resolver.clear_related();
        assert!(current > stale);

        assert!(resolver.resolve_for(stale, "db", &ids(&["a"])).await.is_empty());
        assert!(backend.docs_requests().is_empty());
        assert!(resolver.references().is_empty());

        let resolved = resolver.resolve_for(current, "db", &ids(&["a"])).await;
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolver.references(), resolved);
    }

    #[tokio::test]
    async fn test_cancel_stops_stalled_lookup() {
        let backend = Arc::new(MockBackend::new());
        backend.stall_docs();
        let resolver = Arc::new(ReferenceResolver::new(backend));
        let mut rx = resolver.subscribe();

        assert!(!resolver.cancel());

        let task = {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve("db", &ids(&["a"])).await })
        };
        rx.wait_for(|s| s.is_resolving).await.unwrap();

        assert!(resolver.cancel());
        assert!(task.await.unwrap().is_empty());

        let state = resolver.subscribe().borrow().clone();
        assert!(!state.is_resolving);
        assert!(state.references.is_empty());
    }

    #[tokio::test]
    async fn test_clear_related_stops_stalled_lookup() {
        let backend = Arc::new(MockBackend::new());
        backend.stall_docs();
        let resolver = Arc::new(ReferenceResolver::new(backend));
        let mut rx = resolver.subscribe();

        let task = {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve("db", &ids(&["a"])).await })
        };
        rx.wait_for(|s| s.is_resolving).await.unwrap();

        resolver.clear_related();
        assert!(task.await.unwrap().is_empty());
        assert!(!resolver.subscribe().borrow().is_resolving);
    }
}
