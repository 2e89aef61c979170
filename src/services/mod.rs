//! Services making up the live metrics pipeline
//!
//! Leaves first: bounded history and the timed probe cache, then the
//! collaborator adapters (probe, segment checks, playlist resolution), the
//! adaptive refresh controller and finally the orchestrator.

pub mod adaptive_refresh;
pub mod history_buffer;
pub mod live_metrics;
pub mod playlist_resolver;
pub mod probe_cache;
pub mod segment_checker;
pub mod stream_prober;

pub use adaptive_refresh::AdaptiveRefresh;
pub use history_buffer::HistoryBuffer;
pub use live_metrics::{HealthReport, LiveMetricsService, ServiceStats, reconcile_bitrates};
pub use playlist_resolver::{PlaylistResolver, ResolvedPlaylist};
pub use probe_cache::TimedCache;
pub use segment_checker::SegmentChecker;
pub use stream_prober::{FfprobeOutput, FfprobeRunner, ProbeRunner, StreamProber};
