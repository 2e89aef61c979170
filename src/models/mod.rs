//! Data models shared across the monitor

pub mod media;
pub mod playlist;
pub mod snapshot;

pub use media::{AudioStreamInfo, MediaDescriptor, VideoStreamInfo};
pub use playlist::{PlaylistDocument, SegmentRef, VariantRef};
pub use snapshot::{
    AudioSummary, CheckOutcome, ConnectivityReport, LiveSnapshot, MetricsPoint, PerformanceHint,
    SegmentCheckResult, SegmentDetails, SnapshotStats, VideoSummary,
};
