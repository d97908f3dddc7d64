//! Streaming answer accumulator.
//!
//! Drives one question → streamed answer → record ids cycle at a time and
//! publishes every intermediate state through a `watch` channel.
//!
//! Each cycle is stamped with a generation. Starting a new question or
//! clearing the answer bumps the generation and cancels the previous
//! cycle's token; publishes from a superseded cycle are dropped, so two
//! overlapping questions never interleave their fragments.

use crate::backend::AskBackend;
use crate::types::{AskRequest, StreamEvent};
use askdocs_core::AppResult;
use futures::StreamExt;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Where a cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CyclePhase {
    /// No question asked, or the answer was cleared
    Idle,
    /// Stream open, fragments arriving
    Streaming,
    /// Last fragment carried `done`
    TerminatedByDone,
    /// Record ids received; stream closed
    TerminatedByRecords,
    /// Stopped through [`AnswerAccumulator::cancel`] or a newer question
    Cancelled,
    /// Stream ended without `done` or records
    Closed,
    /// Transport failed while opening or reading the stream
    Interrupted,
}

impl CyclePhase {
    pub fn is_finished(&self) -> bool {
        !matches!(self, CyclePhase::Idle | CyclePhase::Streaming)
    }
}

/// State of one cycle as seen by a renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSnapshot {
    /// Cycle this state belongs to
    pub generation: u64,

    /// Database the question targets
    pub database: Option<String>,

    pub is_loading: bool,

    /// Accumulated answer; `None` until the first fragment arrives
    pub answer: Option<String>,

    /// Referenced record ids, set by the terminal records event
    pub records: Vec<String>,

    pub phase: CyclePhase,
}

impl AnswerSnapshot {
    fn idle(generation: u64) -> Self {
        Self {
            generation,
            database: None,
            is_loading: false,
            answer: None,
            records: Vec::new(),
            phase: CyclePhase::Idle,
        }
    }

    fn streaming(generation: u64, database: &str) -> Self {
        Self {
            generation,
            database: Some(database.to_string()),
            is_loading: true,
            answer: None,
            records: Vec::new(),
            phase: CyclePhase::Streaming,
        }
    }

    /// Apply one stream event.
    ///
    /// Returns `true` when the stream must be closed.
    pub fn apply(&mut self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Records(records) => {
                self.records = records;
                self.is_loading = false;
                self.phase = CyclePhase::TerminatedByRecords;
                true
            }
            StreamEvent::Token { answer, done } => {
                self.answer.get_or_insert_with(String::new).push_str(&answer);
                self.is_loading = !done;
                self.phase = if done {
                    CyclePhase::TerminatedByDone
                } else {
                    CyclePhase::Streaming
                };
                false
            }
        }
    }

    /// End the cycle. A phase already reached through `done` or records is
    /// kept.
    fn finish(&mut self, phase: CyclePhase) {
        self.is_loading = false;
        if !self.phase.is_finished() {
            self.phase = phase;
        }
    }
}

#[derive(Debug, Default)]
struct CycleSlot {
    generation: u64,
    token: Option<CancellationToken>,
}

/// Accumulates a streamed answer for the most recent question.
pub struct AnswerAccumulator {
    backend: Arc<dyn AskBackend>,
    slot: Mutex<CycleSlot>,
    state: watch::Sender<AnswerSnapshot>,
}

impl AnswerAccumulator {
    pub fn new(backend: Arc<dyn AskBackend>) -> Self {
        let (state, _) = watch::channel(AnswerSnapshot::idle(0));
        Self {
            backend,
            slot: Mutex::new(CycleSlot::default()),
            state,
        }
    }

    /// Receive every published state change.
    pub fn subscribe(&self) -> watch::Receiver<AnswerSnapshot> {
        self.state.subscribe()
    }

    /// Current published state.
    pub fn snapshot(&self) -> AnswerSnapshot {
        self.state.borrow().clone()
    }

    /// True when `generation` is the latest cycle.
    pub fn is_current(&self, generation: u64) -> bool {
        self.lock_slot().generation == generation
    }

    /// Ask a question and drive its answer stream to the end.
    ///
    /// Returns `Ok(None)` without touching any state when the question is
    /// empty. Otherwise returns this cycle's final state, which is also the
    /// published state unless a newer cycle superseded it. Fails only when
    /// the stream could not be opened.
    pub async fn ask_question(
        &self,
        database: &str,
        question: &str,
    ) -> AppResult<Option<AnswerSnapshot>> {
        if question.is_empty() {
            tracing::debug!("Ignoring empty question");
            return Ok(None);
        }

        let (mut cycle, token) = self.begin_cycle(database);
        let generation = cycle.generation;
        tracing::info!("Asking database '{}' (cycle {})", database, generation);

        let request = AskRequest::new(question, database);
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            opened = self.backend.ask(&request) => Some(opened),
        };

        let mut stream = match opened {
            None => {
                cycle.finish(CyclePhase::Cancelled);
                self.end_cycle(&cycle);
                return Ok(Some(cycle));
            }
            Some(Err(e)) => {
                tracing::warn!("Failed to open answer stream: {}", e);
                cycle.finish(CyclePhase::Interrupted);
                self.end_cycle(&cycle);
                return Err(e);
            }
            Some(Ok(stream)) => stream,
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!("Cycle {} cancelled", generation);
                    cycle.finish(CyclePhase::Cancelled);
                    break;
                }
                next = stream.next() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    tracing::warn!("Answer stream interrupted: {}", e);
                    cycle.finish(CyclePhase::Interrupted);
                    break;
                }
                None => {
                    cycle.finish(CyclePhase::Closed);
                    break;
                }
            };

            let event = match StreamEvent::parse(&message.data) {
                Ok(event) => event,
                Err(e) => {
                    tracing::debug!("Dropping malformed stream event: {}", e);
                    continue;
                }
            };

            let close = cycle.apply(event.clone());
            self.publish_event(generation, event);

            if close {
                tracing::debug!(
                    "Received {} record ids, closing stream",
                    cycle.records.len()
                );
                break;
            }
        }

        // Dropping the stream closes the connection
        drop(stream);
        self.end_cycle(&cycle);

        tracing::info!(
            "Cycle {} finished ({:?}, {} bytes, {} records)",
            generation,
            cycle.phase,
            cycle.answer.as_ref().map_or(0, String::len),
            cycle.records.len()
        );

        Ok(Some(cycle))
    }

    /// Stop the in-flight cycle, keeping what was accumulated so far.
    ///
    /// Returns `false` when nothing was streaming.
    pub fn cancel(&self) -> bool {
        match self.lock_slot().token.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Discard all state and supersede any in-flight cycle.
    pub fn clear_answer(&self) {
        let mut slot = self.lock_slot();
        slot.generation += 1;
        if let Some(token) = slot.token.take() {
            token.cancel();
        }
        self.state.send_replace(AnswerSnapshot::idle(slot.generation));
    }

    fn begin_cycle(&self, database: &str) -> (AnswerSnapshot, CancellationToken) {
        let mut slot = self.lock_slot();
        slot.generation += 1;
        if let Some(previous) = slot.token.take() {
            tracing::debug!("Superseding in-flight cycle {}", slot.generation - 1);
            previous.cancel();
        }

        let token = CancellationToken::new();
        slot.token = Some(token.clone());

        let cycle = AnswerSnapshot::streaming(slot.generation, database);
        self.state.send_replace(cycle.clone());
        (cycle, token)
    }

    /// Publish the final state and release the cycle's token.
    fn end_cycle(&self, cycle: &AnswerSnapshot) {
        // Answer and records are already in place; only the ending changes
        self.state.send_if_modified(|current| {
            if current.generation != cycle.generation {
                return false;
            }
            current.is_loading = cycle.is_loading;
            current.phase = cycle.phase;
            true
        });

        let mut slot = self.lock_slot();
        if slot.generation == cycle.generation {
            slot.token = None;
        }
    }

    /// Apply `event` to the published state unless a newer cycle owns it.
    fn publish_event(&self, generation: u64, event: StreamEvent) {
        self.state.send_if_modified(|current| {
            if current.generation != generation {
                return false;
            }
            current.apply(event);
            true
        });
    }

    fn lock_slot(&self) -> MutexGuard<'_, CycleSlot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
