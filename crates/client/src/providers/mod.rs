//! Backend implementations.

pub mod http;
pub mod mock;
pub mod xata;

pub use http::HttpBackend;
pub use mock::MockBackend;
pub use xata::XataClient;
