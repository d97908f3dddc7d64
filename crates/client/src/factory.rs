//! Backend factory.
//!
//! Picks the backend implementation from the configured endpoint.

use crate::backend::AskBackend;
use crate::providers::HttpBackend;
use std::sync::Arc;

/// Create an ask backend for `endpoint`.
///
/// # Errors
/// Returns an error for endpoints that are not http(s) URLs.
pub fn create_backend(endpoint: &str) -> Result<Arc<dyn AskBackend>, String> {
    let scheme = endpoint
        .split_once("://")
        .map(|(scheme, _)| scheme.to_lowercase());

    match scheme.as_deref() {
        Some("http") | Some("https") => {
            tracing::debug!("Using HTTP backend at {}", endpoint);
            Ok(Arc::new(HttpBackend::with_base_url(endpoint)))
        }
        Some(other) => Err(format!("Unsupported endpoint scheme: {}", other)),
        None => Err(format!("Endpoint is not a URL: {}", endpoint)),
    }
}
