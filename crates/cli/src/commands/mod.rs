//! Command handlers for the askdocs CLI.

pub mod ask;
pub mod databases;

pub use ask::AskCommand;
pub use databases::DatabasesCommand;
