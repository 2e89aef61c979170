//! Utility modules shared by the services
//!
//! - URL handling (validation, joining, base URLs, credential masking)
//! - The HTTP collaborator and its retry policy
//! - Jitter for backoff delays

pub mod http_client;
pub mod jitter;
pub mod retry;
pub mod url;

pub use http_client::{HttpFetcher, HttpResponse, StandardHttpClient};
pub use retry::{RetryConfig, with_retry};
pub use url::UrlUtils;
