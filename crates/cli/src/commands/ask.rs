//! Ask command handler.
//!
//! Streams the answer to stdout as it grows, then lists the doc pages the
//! backend used as context.

use askdocs_client::{create_backend, AnswerSnapshot, AskOutcome, AskSession};
use askdocs_core::{config::AppConfig, AppError, AppResult};
use clap::Args;
use std::io::Write;
use tokio::sync::watch;

/// Ask a question and stream the answer
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Vec<String>,

    /// Database to ask (default: first configured database)
    #[arg(short, long)]
    pub database: Option<String>,

    /// Output the final answer and references as JSON
    #[arg(long)]
    pub json: bool,

    /// Do not list the referenced doc pages
    #[arg(long)]
    pub no_references: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.question.join(" ");
        if question.is_empty() {
            tracing::warn!("No question given, nothing to ask");
            return Ok(());
        }

        let database = config.select_database(self.database.as_deref())?;
        tracing::debug!("Selected database: {} ({})", database.name, database.id);

        let backend = create_backend(&config.endpoint).map_err(AppError::Config)?;
        let session = AskSession::new(backend);

        let printer = if self.json {
            None
        } else {
            Some(tokio::spawn(print_answer(session.accumulator().subscribe())))
        };

        let outcome = {
            let ask = session.ask(&database.id, &question);
            tokio::pin!(ask);

            tokio::select! {
                outcome = &mut ask => outcome,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, stopping the answer");
                    session.cancel();

                    tokio::select! {
                        outcome = &mut ask => outcome,
                        _ = tokio::signal::ctrl_c() => {
                            return Err(AppError::Other("Interrupted".to_string()));
                        }
                    }
                }
            }
        };

        // Closing the session ends the printer's subscription
        drop(session);
        if let Some(printer) = printer {
            printer
                .await
                .map_err(|e| AppError::Other(format!("Answer printer failed: {}", e)))?;
        }

        let outcome = match outcome? {
            Some(outcome) => outcome,
            None => return Ok(()),
        };

        if self.json {
            self.print_json(&outcome)
        } else {
            println!();
            if !self.no_references {
                print_references(&outcome);
            }
            Ok(())
        }
    }

    fn print_json(&self, outcome: &AskOutcome) -> AppResult<()> {
        let references: Vec<_> = if self.no_references {
            Vec::new()
        } else {
            outcome
                .references
                .iter()
                .map(|doc| {
                    serde_json::json!({
                        "id": doc.id,
                        "title": doc.title,
                        "link": doc.link(),
                    })
                })
                .collect()
        };

        let output = serde_json::json!({
            "answer": outcome.answer.answer,
            "database": outcome.answer.database,
            "phase": outcome.answer.phase,
            "records": outcome.answer.records,
            "references": references,
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

/// Write each new piece of the answer to stdout until the session closes.
async fn print_answer(mut updates: watch::Receiver<AnswerSnapshot>) {
    let mut generation = 0;
    let mut printed = 0;

    while updates.changed().await.is_ok() {
        let fresh = {
            let snapshot = updates.borrow_and_update();

            if snapshot.generation != generation {
                generation = snapshot.generation;
                printed = 0;
            }

            match snapshot.answer.as_deref() {
                Some(answer) if answer.len() > printed => {
                    let fresh = answer[printed..].to_string();
                    printed = answer.len();
                    fresh
                }
                _ => continue,
            }
        };

        print!("{}", fresh);
        std::io::stdout().flush().ok();
    }
}

fn print_references(outcome: &AskOutcome) {
    if outcome.references.is_empty() {
        if !outcome.answer.records.is_empty() {
            tracing::warn!(
                "Backend referenced {} documents but none could be resolved",
                outcome.answer.records.len()
            );
        }
        return;
    }

    println!();
    println!("I have used the following doc pages as context:");
    for doc in &outcome.references {
        println!("- {} ({})", doc.title, doc.link());
    }
}
