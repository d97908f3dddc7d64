//! Databases command handler.
//!
//! Lists the configured databases the way the picker shows them.

use askdocs_client::catalog::{summarize, DatabaseSummary};
use askdocs_client::XataClient;
use askdocs_core::{config::AppConfig, AppResult};
use clap::Args;

/// List the configured databases
#[derive(Args, Debug)]
pub struct DatabasesCommand {
    /// Skip fetching record counts
    #[arg(long)]
    pub no_count: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DatabasesCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing databases command");
        tracing::debug!("Databases options: {:?}", self);

        let default_id = config.select_database(None)?.id.clone();

        if self.no_count {
            if self.json {
                let output: Vec<_> = config
                    .databases
                    .iter()
                    .map(|db| {
                        serde_json::json!({
                            "id": db.id,
                            "name": db.name,
                            "searchType": db.search_options.search_type,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                for db in &config.databases {
                    println!(
                        "{} {} ({}, {} search)",
                        marker(&db.id, &default_id),
                        db.name,
                        db.id,
                        db.search_options.search_type
                    );
                }
            }
            return Ok(());
        }

        let counter = XataClient::new();
        let summaries = summarize(&counter, &config.databases).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        } else {
            for summary in &summaries {
                print_summary(summary, &default_id);
            }
        }

        Ok(())
    }
}

fn marker(id: &str, default_id: &str) -> &'static str {
    if id == default_id {
        "*"
    } else {
        " "
    }
}

fn print_summary(summary: &DatabaseSummary, default_id: &str) {
    println!(
        "{} {} ({}, {} search)",
        marker(&summary.id, default_id),
        summary.describe(),
        summary.id,
        summary.search_type
    );
}
