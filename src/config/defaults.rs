/// Configuration default values
///
/// All tunables live here so the poll cycle's constants can be changed in
/// one place.
use std::time::Duration;

// HTTP collaborator defaults
pub const DEFAULT_PLAYLIST_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PLAYLIST_READ_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SEGMENT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_SEGMENT_READ_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_FACTOR: Duration = Duration::from_millis(300);
pub const DEFAULT_RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];
pub const DEFAULT_ACCEPT_INVALID_CERTS: bool = true;
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 20;

// Probe defaults
pub const DEFAULT_FFPROBE_COMMAND: &str = "ffprobe";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_PROBE_CACHE_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_PROBE_CACHE_CAPACITY: usize = 100;
pub const DEFAULT_ANALYZE_DURATION_US: u64 = 2_000_000;
pub const DEFAULT_PROBE_SIZE_BYTES: u64 = 2_000_000;
pub const DEFAULT_VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

// Segment check defaults
pub const DEFAULT_RECENT_SEGMENT_COUNT: usize = 5;
pub const DEFAULT_SEGMENT_BATCH_SIZE: usize = 3;
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 5;
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(10);

// Adaptive refresh defaults
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_SUCCESS_HISTORY_CAPACITY: usize = 20;
pub const DEFAULT_SAMPLE_WINDOW: usize = 10;
pub const DEFAULT_STABLE_THRESHOLD: f64 = 95.0;
pub const DEFAULT_UNSTABLE_THRESHOLD: f64 = 80.0;
pub const DEFAULT_SLOWDOWN_FACTOR: f64 = 1.5;
pub const DEFAULT_SPEEDUP_FACTOR: f64 = 0.7;

// History defaults
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 100;
pub const DEFAULT_METRICS_CAPACITY: usize = 50;
pub const DEFAULT_REQUEST_TIME_CAPACITY: usize = 100;
pub const DEFAULT_MEMORY_SAMPLE_CAPACITY: usize = 50;
