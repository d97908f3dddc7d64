//! Client crate for askdocs.
//!
//! Talks to a hosted "ask your docs" backend: streams an answer over
//! server-sent events, accumulates it token by token, and resolves the
//! documents the backend reports as its sources.
//!
//! # Example
//! ```no_run
//! use askdocs_client::{create_backend, AskSession};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = create_backend("http://localhost:3000")?;
//! let session = AskSession::new(backend);
//! if let Some(outcome) = session.ask("netlifyDocs", "What is Netlify?").await? {
//!     println!("{}", outcome.answer.answer.unwrap_or_default());
//!     for doc in &outcome.references {
//!         println!("{} ({})", doc.title, doc.link());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod backend;
pub mod catalog;
pub mod factory;
pub mod providers;
pub mod resolver;
pub mod session;
pub mod sse;
pub mod types;

// Re-export main types
pub use accumulator::{AnswerAccumulator, AnswerSnapshot, CyclePhase};
pub use backend::{AskBackend, EventStream};
pub use catalog::{pretty_format_number, record_label, DatabaseSummary, RecordCounter};
pub use factory::create_backend;
pub use providers::{HttpBackend, MockBackend, XataClient};
pub use resolver::{ReferenceResolver, ReferenceSet};
pub use session::{AskOutcome, AskSession};
pub use sse::SseMessage;
pub use types::{AskRequest, DocsRequest, DocumentReference, StreamEvent};
