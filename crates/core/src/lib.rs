//! askdocs Core Library
//!
//! This crate provides the foundational utilities shared by the askdocs
//! client and CLI:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management, including the configured document databases

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, DatabaseConfig, SearchOptions};
pub use error::{AppError, AppResult};
