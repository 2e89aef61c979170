use serde::{Deserialize, Serialize};

/// Codec name used whenever a stream could not be identified
pub const UNKNOWN_CODEC: &str = "unknown";

/// Normalised video stream facts for one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    /// Frames per second, rounded to two decimals
    pub frame_rate: f64,
    /// Bits per second
    pub bitrate: u64,
}

/// Normalised audio stream facts for one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u32,
    /// Bits per second
    pub bitrate: u64,
}

/// What the external probe reported about one segment.
///
/// Every field is always present; unknown values are `"unknown"` or `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub video: VideoStreamInfo,
    pub audio: AudioStreamInfo,
    /// Seconds
    pub duration: f64,
    /// Bits per second
    pub total_bitrate: u64,
}

impl Default for VideoStreamInfo {
    fn default() -> Self {
        Self {
            codec: UNKNOWN_CODEC.to_string(),
            width: 0,
            height: 0,
            frame_rate: 0.0,
            bitrate: 0,
        }
    }
}

impl Default for AudioStreamInfo {
    fn default() -> Self {
        Self {
            codec: UNKNOWN_CODEC.to_string(),
            sample_rate: 0,
            channels: 0,
            bitrate: 0,
        }
    }
}

impl Default for MediaDescriptor {
    fn default() -> Self {
        Self::fallback()
    }
}

impl MediaDescriptor {
    /// Descriptor returned when probing fails or there is nothing to probe
    pub fn fallback() -> Self {
        Self {
            video: VideoStreamInfo::default(),
            audio: AudioStreamInfo::default(),
            duration: 0.0,
            total_bitrate: 0,
        }
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }

    /// Best single bitrate figure: the container total, else the video stream
    pub fn effective_bitrate(&self) -> u64 {
        if self.total_bitrate > 0 {
            self.total_bitrate
        } else {
            self.video.bitrate
        }
    }
}
