//! Records produced by one poll cycle and by the one-shot diagnostics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::media::MediaDescriptor;

/// Availability of one recent segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentCheckResult {
    /// 1-based position in the full segment list
    pub index: usize,
    pub uri: String,
    /// Declared duration, seconds
    pub duration: f64,
    /// HTTP status; 0 when unreachable or unfinished
    pub status_code: u16,
    pub response_time_ms: f64,
    pub timestamp: DateTime<Utc>,
}

impl SegmentCheckResult {
    pub fn is_available(&self) -> bool {
        self.status_code == 200
    }
}

/// Result of a single availability check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub status_code: u16,
    pub response_time_ms: f64,
}

impl CheckOutcome {
    /// Outcome for a check that never completed
    pub fn unfinished() -> Self {
        Self {
            status_code: 0,
            response_time_ms: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStats {
    /// Mean declared duration of the checked segments
    pub avg_duration: f64,
    /// Percentage of checked segments answering 200
    pub success_rate: f64,
    /// Sum of declared durations of every segment in the playlist
    pub total_duration: f64,
    pub avg_bitrate: u64,
    pub video_bitrate: u64,
    pub audio_bitrate: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    /// `"WxH"`, or `"Unknown"` when the width is 0
    pub resolution: String,
    pub frame_rate: f64,
    pub video_bitrate: u64,
    pub duration: f64,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSummary {
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u32,
    pub audio_bitrate: u64,
    /// `"N ch"`, or `"Unknown"` when the channel count is 0
    pub channel_layout: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceHint {
    /// Seconds until the next poll is advised
    pub recommended_refresh_interval: f64,
}

/// Everything one successful poll cycle learned about the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub timestamp: DateTime<Utc>,
    pub total_segments: usize,
    pub recent_segments: Vec<SegmentCheckResult>,
    pub stats: SnapshotStats,
    pub video_info: VideoSummary,
    pub audio_info: AudioSummary,
    pub performance: PerformanceHint,
}

/// Compact per-poll sample kept for charting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsPoint {
    pub timestamp: DateTime<Utc>,
    pub success_rate: f64,
    pub avg_bitrate: u64,
    pub avg_response_time_ms: f64,
    /// Seconds the cycle took
    pub processing_time: f64,
}

impl MetricsPoint {
    pub fn from_snapshot(snapshot: &LiveSnapshot, processing_time: f64) -> Self {
        let checked = &snapshot.recent_segments;
        let avg_response_time_ms = if checked.is_empty() {
            0.0
        } else {
            checked.iter().map(|s| s.response_time_ms).sum::<f64>() / checked.len() as f64
        };

        Self {
            timestamp: snapshot.timestamp,
            success_rate: snapshot.stats.success_rate,
            avg_bitrate: snapshot.stats.avg_bitrate,
            avg_response_time_ms,
            processing_time,
        }
    }
}

/// Reachability and shape of a playlist URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub is_variant: bool,
    pub segments_count: usize,
    pub variants_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectivityReport {
    pub fn failed(http_status: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            http_status,
            is_variant: false,
            segments_count: 0,
            variants_count: 0,
            error: Some(error.into()),
        }
    }
}

/// Probe and availability facts for a single segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDetails {
    pub url: String,
    pub status_code: u16,
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub duration: f64,
    /// Container bitrate, else the video stream bitrate
    pub bitrate: u64,
    pub timestamp: DateTime<Utc>,
}

impl VideoSummary {
    pub fn from_descriptor(descriptor: &MediaDescriptor) -> Self {
        let video = &descriptor.video;
        let resolution = if video.width > 0 {
            format!("{}x{}", video.width, video.height)
        } else {
            "Unknown".to_string()
        };

        Self {
            codec: video.codec.clone(),
            width: video.width,
            height: video.height,
            resolution,
            frame_rate: video.frame_rate,
            video_bitrate: video.bitrate,
            duration: descriptor.duration,
            source: "segment_analysis".to_string(),
        }
    }
}

impl AudioSummary {
    pub fn from_descriptor(descriptor: &MediaDescriptor) -> Self {
        let audio = &descriptor.audio;
        let channel_layout = if audio.channels > 0 {
            format!("{} ch", audio.channels)
        } else {
            "Unknown".to_string()
        };

        Self {
            codec: audio.codec.clone(),
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            audio_bitrate: audio.bitrate,
            channel_layout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summaries_of_fallback_descriptor() {
        let fallback = MediaDescriptor::fallback();

        let video = VideoSummary::from_descriptor(&fallback);
        assert_eq!(video.resolution, "Unknown");
        assert_eq!(video.source, "segment_analysis");

        let audio = AudioSummary::from_descriptor(&fallback);
        assert_eq!(audio.channel_layout, "Unknown");
    }

    #[test]
    fn test_summaries_of_probed_descriptor() {
        let mut descriptor = MediaDescriptor::fallback();
        descriptor.video.width = 1920;
        descriptor.video.height = 1080;
        descriptor.audio.channels = 2;

        assert_eq!(VideoSummary::from_descriptor(&descriptor).resolution, "1920x1080");
        assert_eq!(AudioSummary::from_descriptor(&descriptor).channel_layout, "2 ch");
    }

    #[test]
    fn test_connectivity_failure_serialization_omits_missing_status() {
        let report = ConnectivityReport::failed(None, "connection refused");
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["success"], false);
        assert!(json.get("http_status").is_none());
        assert_eq!(json["error"], "connection refused");
    }
}
