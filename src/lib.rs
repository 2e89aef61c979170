pub mod config;
pub mod errors;
pub mod models;
pub mod observability;
pub mod services;
pub mod utils;

pub use config::Config;
pub use errors::{AppError, AppResult, MonitorError, PollFailure};
pub use services::live_metrics::LiveMetricsService;
