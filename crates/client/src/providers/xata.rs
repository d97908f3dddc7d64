//! Record counts from the hosted database.
//!
//! Uses the aggregate endpoint:
//! `POST {databaseUrl}:{branch}/tables/{table}/aggregate`.

use crate::catalog::RecordCounter;
use crate::providers::http::check_status;
use askdocs_core::{AppError, AppResult, DatabaseConfig};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct AggregateResponse {
    aggs: AggregateTotals,
}

#[derive(Debug, Deserialize)]
struct AggregateTotals {
    total: u64,
}

/// Client for the hosted database's aggregate API.
pub struct XataClient {
    client: reqwest::Client,
}

impl XataClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn aggregate_url(database: &DatabaseConfig) -> String {
        format!(
            "{}:{}/tables/{}/aggregate",
            database.database_url.trim_end_matches('/'),
            database.branch,
            database.lookup_table
        )
    }
}

impl Default for XataClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RecordCounter for XataClient {
    async fn count_records(&self, database: &DatabaseConfig) -> AppResult<u64> {
        let url = Self::aggregate_url(database);
        tracing::debug!("Counting records of '{}' via {}", database.id, url);

        let mut request = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "aggs": { "total": { "count": "*" } } }));

        match database.api_key() {
            Some(key) => request = request.bearer_auth(key),
            None => tracing::debug!("No API key configured for database '{}'", database.id),
        }

        let response = request.send().await.map_err(|e| {
            AppError::Http(format!(
                "Failed to count records of '{}': {}",
                database.id, e
            ))
        })?;

        let response = check_status(response, "Aggregate request").await?;

        let aggregate: AggregateResponse = response.json().await.map_err(|e| {
            AppError::Schema(format!(
                "Invalid aggregate response for '{}': {}",
                database.id, e
            ))
        })?;

        Ok(aggregate.aggs.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdocs_core::config::default_databases;

    #[test]
    fn test_aggregate_url() {
        let database = &default_databases()[0];
        assert_eq!(
            XataClient::aggregate_url(database),
            "https://netlify-docs-4qbksj.us-east-1.xata.sh/db/docs:main/tables/docs/aggregate"
        );
    }

    #[test]
    fn test_aggregate_response_shape() {
        let parsed: AggregateResponse =
            serde_json::from_str(r#"{"aggs":{"total":4821}}"#).unwrap();
        assert_eq!(parsed.aggs.total, 4821);
    }
}
