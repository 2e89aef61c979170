//! Centralized error handling for the HLS monitor
//!
//! Errors are split by how far they are allowed to travel:
//!
//! - **Monitor Errors**: playlist-level failures that abort a poll cycle
//! - **Transport Errors**: HTTP failures, absorbed by the segment checker
//! - **Probe Failures**: ffprobe failures, absorbed by the probe adapter
//! - **Application Errors**: configuration and other top-level failures
//!
//! # Usage
//!
//! ```rust
//! use hls_monitor::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for poll-cycle results
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Convenience type alias for HTTP collaborator results
pub type TransportResult<T> = Result<T, TransportError>;

/// Convenience type alias for probe runner results
pub type ProbeResult<T> = Result<T, ProbeFailure>;
