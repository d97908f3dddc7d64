//! Database catalog: the configured databases with their record counts.

use askdocs_core::{AppResult, DatabaseConfig};
use serde::Serialize;

/// Counts the records of a configured database.
#[async_trait::async_trait]
pub trait RecordCounter: Send + Sync {
    async fn count_records(&self, database: &DatabaseConfig) -> AppResult<u64>;
}

/// A configured database as shown in the picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSummary {
    pub id: String,
    pub name: String,
    pub record_count: u64,

    /// How the backend searches this database ("keyword" or "vector")
    pub search_type: String,
}

impl DatabaseSummary {
    /// e.g. "Netlify docs: 1,234 records"
    pub fn describe(&self) -> String {
        format!(
            "{}: {} {}",
            self.name,
            pretty_format_number(self.record_count),
            record_label(self.record_count)
        )
    }
}

/// Count the records of every database, preserving configuration order.
///
/// Counts are fetched one at a time; the first failure aborts.
pub async fn summarize(
    counter: &dyn RecordCounter,
    databases: &[DatabaseConfig],
) -> AppResult<Vec<DatabaseSummary>> {
    let mut summaries = Vec::with_capacity(databases.len());

    for database in databases {
        let record_count = counter.count_records(database).await?;
        tracing::debug!("Database '{}' has {} records", database.id, record_count);

        summaries.push(DatabaseSummary {
            id: database.id.clone(),
            name: database.name.clone(),
            record_count,
            search_type: database.search_options.search_type.clone(),
        });
    }

    Ok(summaries)
}

/// Format a number with `,` thousands separators.
pub fn pretty_format_number(num: u64) -> String {
    let digits = num.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(ch);
    }

    formatted
}

pub fn record_label(count: u64) -> &'static str {
    if count == 1 {
        "record"
    } else {
        "records"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdocs_core::config::default_databases;
    use askdocs_core::AppError;
    use std::collections::HashMap;

    struct FixedCounter(HashMap<String, u64>);

    #[async_trait::async_trait]
    impl RecordCounter for FixedCounter {
        async fn count_records(&self, database: &DatabaseConfig) -> AppResult<u64> {
            self.0
                .get(&database.id)
                .copied()
                .ok_or_else(|| AppError::Http(format!("no table for {}", database.id)))
        }
    }

    #[test]
    fn test_pretty_format_number() {
        assert_eq!(pretty_format_number(0), "0");
        assert_eq!(pretty_format_number(999), "999");
        assert_eq!(pretty_format_number(1000), "1,000");
        assert_eq!(pretty_format_number(123456), "123,456");
        assert_eq!(pretty_format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_record_label() {
        assert_eq!(record_label(0), "records");
        assert_eq!(record_label(1), "record");
        assert_eq!(record_label(2), "records");
    }

    #[test]
    fn test_describe() {
        let summary = DatabaseSummary {
            id: "netlifyDocs".to_string(),
            name: "Netlify docs".to_string(),
            record_count: 4821,
            search_type: "keyword".to_string(),
        };
        assert_eq!(summary.describe(), "Netlify docs: 4,821 records");
    }

    #[tokio::test]
    async fn test_summarize_preserves_order() {
        let mut databases = default_databases();
        let mut second = databases[0].clone();
        second.id = "handbook".to_string();
        second.name = "Handbook".to_string();
        databases.push(second);

        let counter = FixedCounter(HashMap::from([
            ("netlifyDocs".to_string(), 1200),
            ("handbook".to_string(), 1),
        ]));

        let summaries = summarize(&counter, &databases).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, "netlifyDocs");
        assert_eq!(summaries[0].search_type, "keyword");
        assert_eq!(summaries[1].describe(), "Handbook: 1 record");
    }

    #[tokio::test]
    async fn test_summarize_fails_on_first_error() {
        let counter = FixedCounter(HashMap::new());
        let result = summarize(&counter, &default_databases()).await;
        assert!(result.is_err());
    }
}
