use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use crate::errors::AppError;
use defaults::*;
use duration_serde::duration;

/// Prefix for environment overrides, e.g. `HLS_MONITOR_PROBE__TIMEOUT=30s`
pub const ENV_PREFIX: &str = "HLS_MONITOR_";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub segments: SegmentCheckConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Connect/read deadline pair applied to one HTTP request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestTimeouts {
    #[serde(with = "duration")]
    pub connect: Duration,
    #[serde(with = "duration")]
    pub read: Duration,
}

impl RequestTimeouts {
    pub fn new(connect: Duration, read: Duration) -> Self {
        Self { connect, read }
    }

    /// Upper bound for the whole request
    pub fn total(&self) -> Duration {
        self.connect + self.read
    }
}

/// Shared HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    /// Timeouts for playlist and variant GETs
    #[serde(default = "default_playlist_timeouts")]
    pub playlist_timeouts: RequestTimeouts,
    /// Timeouts for segment HEAD checks
    #[serde(default = "default_segment_timeouts")]
    pub segment_timeouts: RequestTimeouts,
    /// Attempts per request, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff factor: the n-th retry waits `factor * 2^(n-1)`
    #[serde(default = "default_backoff_factor", with = "duration")]
    pub backoff_factor: Duration,
    /// Statuses that trigger a retry
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,
    /// Skip TLS certificate verification (streams often use self-signed certs)
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
}

/// External probe settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeConfig {
    /// FFprobe command to use; a full path or a command name resolved via $PATH
    #[serde(default = "default_ffprobe_command")]
    pub ffprobe_command: String,
    #[serde(default = "default_probe_timeout", with = "duration")]
    pub timeout: Duration,
    #[serde(default = "default_probe_cache_ttl", with = "duration")]
    pub cache_ttl: Duration,
    #[serde(default = "default_probe_cache_capacity")]
    pub cache_capacity: usize,
    /// Microseconds of input ffprobe analyses
    #[serde(default = "default_analyze_duration_us")]
    pub analyze_duration_us: u64,
    /// Bytes of input ffprobe reads
    #[serde(default = "default_probe_size_bytes")]
    pub probe_size_bytes: u64,
}

/// Recent-segment availability checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentCheckConfig {
    /// How many trailing segments each poll checks
    #[serde(default = "default_recent_segment_count")]
    pub recent_count: usize,
    #[serde(default = "default_segment_batch_size")]
    pub batch_size: usize,
    /// Pause between sub-batches
    #[serde(default = "default_batch_pause", with = "duration")]
    pub batch_pause: Duration,
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrency: usize,
    /// Deadline for one `check_many` call
    #[serde(default = "default_batch_timeout", with = "duration")]
    pub batch_timeout: Duration,
}

/// Adaptive refresh policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshConfig {
    #[serde(default = "default_base_interval", with = "duration")]
    pub base_interval: Duration,
    #[serde(default = "default_min_interval", with = "duration")]
    pub min_interval: Duration,
    #[serde(default = "default_max_interval", with = "duration")]
    pub max_interval: Duration,
    #[serde(default = "default_success_history_capacity")]
    pub history_capacity: usize,
    /// Number of most recent samples averaged per recommendation
    #[serde(default = "default_sample_window")]
    pub sample_window: usize,
    /// Mean success rate above which polling slows down
    #[serde(default = "default_stable_threshold")]
    pub stable_threshold: f64,
    /// Mean success rate below which polling speeds up
    #[serde(default = "default_unstable_threshold")]
    pub unstable_threshold: f64,
}

/// In-memory window sizes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryConfig {
    #[serde(default = "default_snapshot_capacity")]
    pub snapshot_capacity: usize,
    #[serde(default = "default_metrics_capacity")]
    pub metrics_capacity: usize,
    #[serde(default = "default_request_time_capacity")]
    pub request_time_capacity: usize,
    #[serde(default = "default_memory_sample_capacity")]
    pub memory_sample_capacity: usize,
}

// HTTP defaults
fn default_playlist_timeouts() -> RequestTimeouts {
    RequestTimeouts::new(DEFAULT_PLAYLIST_CONNECT_TIMEOUT, DEFAULT_PLAYLIST_READ_TIMEOUT)
}

fn default_segment_timeouts() -> RequestTimeouts {
    RequestTimeouts::new(DEFAULT_SEGMENT_CONNECT_TIMEOUT, DEFAULT_SEGMENT_READ_TIMEOUT)
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_backoff_factor() -> Duration {
    DEFAULT_BACKOFF_FACTOR
}

fn default_retry_statuses() -> Vec<u16> {
    DEFAULT_RETRY_STATUSES.to_vec()
}

fn default_accept_invalid_certs() -> bool {
    DEFAULT_ACCEPT_INVALID_CERTS
}

fn default_pool_max_idle_per_host() -> usize {
    DEFAULT_POOL_MAX_IDLE_PER_HOST
}

// Probe defaults
fn default_ffprobe_command() -> String {
    DEFAULT_FFPROBE_COMMAND.to_string()
}

fn default_probe_timeout() -> Duration {
    DEFAULT_PROBE_TIMEOUT
}

fn default_probe_cache_ttl() -> Duration {
    DEFAULT_PROBE_CACHE_TTL
}

fn default_probe_cache_capacity() -> usize {
    DEFAULT_PROBE_CACHE_CAPACITY
}

fn default_analyze_duration_us() -> u64 {
    DEFAULT_ANALYZE_DURATION_US
}

fn default_probe_size_bytes() -> u64 {
    DEFAULT_PROBE_SIZE_BYTES
}

// Segment check defaults
fn default_recent_segment_count() -> usize {
    DEFAULT_RECENT_SEGMENT_COUNT
}

fn default_segment_batch_size() -> usize {
    DEFAULT_SEGMENT_BATCH_SIZE
}

fn default_batch_pause() -> Duration {
    DEFAULT_BATCH_PAUSE
}

fn default_max_concurrent_checks() -> usize {
    DEFAULT_MAX_CONCURRENT_CHECKS
}

fn default_batch_timeout() -> Duration {
    DEFAULT_BATCH_TIMEOUT
}

// Refresh defaults
fn default_base_interval() -> Duration {
    DEFAULT_BASE_INTERVAL
}

fn default_min_interval() -> Duration {
    DEFAULT_MIN_INTERVAL
}

fn default_max_interval() -> Duration {
    DEFAULT_MAX_INTERVAL
}

fn default_success_history_capacity() -> usize {
    DEFAULT_SUCCESS_HISTORY_CAPACITY
}

fn default_sample_window() -> usize {
    DEFAULT_SAMPLE_WINDOW
}

fn default_stable_threshold() -> f64 {
    DEFAULT_STABLE_THRESHOLD
}

fn default_unstable_threshold() -> f64 {
    DEFAULT_UNSTABLE_THRESHOLD
}

// History defaults
fn default_snapshot_capacity() -> usize {
    DEFAULT_SNAPSHOT_CAPACITY
}

fn default_metrics_capacity() -> usize {
    DEFAULT_METRICS_CAPACITY
}

fn default_request_time_capacity() -> usize {
    DEFAULT_REQUEST_TIME_CAPACITY
}

fn default_memory_sample_capacity() -> usize {
    DEFAULT_MEMORY_SAMPLE_CAPACITY
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            playlist_timeouts: default_playlist_timeouts(),
            segment_timeouts: default_segment_timeouts(),
            max_attempts: default_max_attempts(),
            backoff_factor: default_backoff_factor(),
            retry_statuses: default_retry_statuses(),
            accept_invalid_certs: default_accept_invalid_certs(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ffprobe_command: default_ffprobe_command(),
            timeout: default_probe_timeout(),
            cache_ttl: default_probe_cache_ttl(),
            cache_capacity: default_probe_cache_capacity(),
            analyze_duration_us: default_analyze_duration_us(),
            probe_size_bytes: default_probe_size_bytes(),
        }
    }
}

impl Default for SegmentCheckConfig {
    fn default() -> Self {
        Self {
            recent_count: default_recent_segment_count(),
            batch_size: default_segment_batch_size(),
            batch_pause: default_batch_pause(),
            max_concurrency: default_max_concurrent_checks(),
            batch_timeout: default_batch_timeout(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            base_interval: default_base_interval(),
            min_interval: default_min_interval(),
            max_interval: default_max_interval(),
            history_capacity: default_success_history_capacity(),
            sample_window: default_sample_window(),
            stable_threshold: default_stable_threshold(),
            unstable_threshold: default_unstable_threshold(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            snapshot_capacity: default_snapshot_capacity(),
            metrics_capacity: default_metrics_capacity(),
            request_time_capacity: default_request_time_capacity(),
            memory_sample_capacity: default_memory_sample_capacity(),
        }
    }
}

impl Config {
    /// Load from `CONFIG_FILE` (default `config.toml`) plus environment overrides
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Layer defaults, the TOML file (if present) and `HLS_MONITOR_*` env vars
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if Path::new(config_file).exists() {
            info!("Loading configuration from: {}", config_file);
        } else {
            info!("Config file {} not found, using defaults", config_file);
        }

        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string(contents))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings that would make the poll cycle misbehave
    pub fn validate(&self) -> Result<(), AppError> {
        if self.http.max_attempts == 0 {
            return Err(AppError::configuration("http.max_attempts must be at least 1"));
        }
        if self.probe.cache_capacity == 0 {
            return Err(AppError::configuration("probe.cache_capacity must be at least 1"));
        }
        if self.segments.batch_size == 0 || self.segments.max_concurrency == 0 {
            return Err(AppError::configuration(
                "segments.batch_size and segments.max_concurrency must be at least 1",
            ));
        }
        if self.refresh.min_interval > self.refresh.max_interval {
            return Err(AppError::configuration(format!(
                "refresh.min_interval ({:?}) exceeds refresh.max_interval ({:?})",
                self.refresh.min_interval, self.refresh.max_interval
            )));
        }
        if self.refresh.history_capacity == 0 || self.refresh.sample_window == 0 {
            return Err(AppError::configuration(
                "refresh.history_capacity and refresh.sample_window must be at least 1",
            ));
        }

        let history = &self.history;
        if history.snapshot_capacity == 0
            || history.metrics_capacity == 0
            || history.request_time_capacity == 0
            || history.memory_sample_capacity == 0
        {
            return Err(AppError::configuration("history capacities must be at least 1"));
        }

        Ok(())
    }
}
