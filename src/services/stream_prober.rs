//! Stream Probing Service
//!
//! Runs `ffprobe` against a segment URL and normalises its JSON output into
//! a [`MediaDescriptor`]. Probing is best-effort: any failure yields the
//! fallback descriptor. Successful results are cached by URL.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::ProbeConfig;
use crate::config::defaults::DEFAULT_VERSION_CHECK_TIMEOUT;
use crate::errors::{ProbeFailure, ProbeResult};
use crate::models::media::{AudioStreamInfo, MediaDescriptor, UNKNOWN_CODEC, VideoStreamInfo};
use crate::observability::PerformanceMonitor;
use crate::services::probe_cache::TimedCache;
use crate::utils::url::UrlUtils;

const SHOW_ENTRIES: &str = "stream=codec_name,codec_type,width,height,r_frame_rate,bit_rate,sample_rate,channels:format=duration,bit_rate,size";

/// One entry of ffprobe's `streams` array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub width: Option<f64>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub height: Option<f64>,
    pub r_frame_rate: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub bit_rate: Option<f64>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub sample_rate: Option<f64>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub channels: Option<f64>,
}

/// ffprobe's `format` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfprobeFormat {
    #[serde(default, deserialize_with = "number_or_string")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub bit_rate: Option<f64>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub size: Option<f64>,
}

/// Raw ffprobe JSON document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    #[serde(default)]
    pub format: Option<FfprobeFormat>,
}

/// ffprobe prints most numbers as strings ("128000", "N/A")
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

/// Parse an ffprobe rational frame rate such as `"30000/1001"`.
///
/// Rounded to two decimals; a non-positive denominator, a non-finite
/// numerator or malformed input gives 0.
pub fn parse_frame_rate(rate: &str) -> f64 {
    let Some((num, den)) = rate.split_once('/') else {
        return 0.0;
    };
    let (Ok(num), Ok(den)) = (num.trim().parse::<f64>(), den.trim().parse::<i64>()) else {
        return 0.0;
    };
    if den <= 0 || !num.is_finite() {
        return 0.0;
    }
    ((num / den as f64) * 100.0).round() / 100.0
}

fn as_u32(value: Option<f64>) -> u32 {
    value.filter(|v| v.is_finite() && *v > 0.0).map_or(0, |v| v as u32)
}

fn as_u64(value: Option<f64>) -> u64 {
    value.filter(|v| v.is_finite() && *v > 0.0).map_or(0, |v| v as u64)
}

impl MediaDescriptor {
    /// Normalise ffprobe output. Only the first video and first audio
    /// stream are considered.
    pub fn from_probe(output: &FfprobeOutput) -> Self {
        let first_of = |kind: &str| {
            output
                .streams
                .iter()
                .find(|stream| stream.codec_type.as_deref() == Some(kind))
        };

        let video = first_of("video")
            .map(|stream| VideoStreamInfo {
                codec: codec_name(stream),
                width: as_u32(stream.width),
                height: as_u32(stream.height),
                frame_rate: stream.r_frame_rate.as_deref().map_or(0.0, parse_frame_rate),
                bitrate: as_u64(stream.bit_rate),
            })
            .unwrap_or_default();

        let audio = first_of("audio")
            .map(|stream| AudioStreamInfo {
                codec: codec_name(stream),
                sample_rate: as_u32(stream.sample_rate),
                channels: as_u32(stream.channels),
                bitrate: as_u64(stream.bit_rate),
            })
            .unwrap_or_default();

        let format = output.format.clone().unwrap_or_default();
        let duration = format.duration.filter(|d| d.is_finite()).unwrap_or(0.0);
        let total_bitrate = match as_u64(format.bit_rate) {
            0 => match (format.size, format.duration) {
                (Some(size), Some(seconds)) if seconds > 0.0 => as_u64(Some(size * 8.0 / seconds)),
                _ => 0,
            },
            bitrate => bitrate,
        };

        Self {
            video,
            audio,
            duration,
            total_bitrate,
        }
    }
}

fn codec_name(stream: &FfprobeStream) -> String {
    stream
        .codec_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_CODEC.to_string())
}

/// Probe collaborator: runs the external media probe
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    /// Probe one URL
    async fn run(&self, url: &str) -> ProbeResult<FfprobeOutput>;

    /// First line of the tool's version banner
    async fn version(&self) -> ProbeResult<String>;
}

/// [`ProbeRunner`] backed by the `ffprobe` binary
pub struct FfprobeRunner {
    ffprobe_command: String,
    probe_timeout: Duration,
    analyze_duration_us: u64,
    probe_size_bytes: u64,
}

impl FfprobeRunner {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            ffprobe_command: config.ffprobe_command.clone(),
            probe_timeout: config.timeout,
            analyze_duration_us: config.analyze_duration_us,
            probe_size_bytes: config.probe_size_bytes,
        }
    }

    fn unavailable(&self, error: std::io::Error) -> ProbeFailure {
        ProbeFailure::Unavailable {
            command: self.ffprobe_command.clone(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl ProbeRunner for FfprobeRunner {
    async fn run(&self, url: &str) -> ProbeResult<FfprobeOutput> {
        debug!("Probing segment: {}", UrlUtils::obfuscate_credentials(url));

        let mut cmd = Command::new(&self.ffprobe_command);
        cmd.arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg(SHOW_ENTRIES)
            .arg("-of")
            .arg("json")
            .arg("-analyzeduration")
            .arg(self.analyze_duration_us.to_string())
            .arg("-probesize")
            .arg(self.probe_size_bytes.to_string())
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.probe_timeout, cmd.output())
            .await
            .map_err(|_| ProbeFailure::Timeout {
                seconds: self.probe_timeout.as_secs(),
            })?
            .map_err(|e| self.unavailable(e))?;

        if !output.status.success() {
            return Err(ProbeFailure::ExitStatus {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    async fn version(&self) -> ProbeResult<String> {
        let mut cmd = Command::new(&self.ffprobe_command);
        cmd.arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(DEFAULT_VERSION_CHECK_TIMEOUT, cmd.output())
            .await
            .map_err(|_| ProbeFailure::Timeout {
                seconds: DEFAULT_VERSION_CHECK_TIMEOUT.as_secs(),
            })?
            .map_err(|e| self.unavailable(e))?;

        if !output.status.success() {
            return Err(ProbeFailure::ExitStatus {
                code: output.status.code(),
                stderr: String::new(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().to_string())
    }
}

/// Cached, failure-absorbing probe adapter
pub struct StreamProber {
    runner: Arc<dyn ProbeRunner>,
    cache: TimedCache<MediaDescriptor>,
    cache_ttl: Duration,
    monitor: Arc<PerformanceMonitor>,
}

impl StreamProber {
    pub fn new(runner: Arc<dyn ProbeRunner>, config: &ProbeConfig, monitor: Arc<PerformanceMonitor>) -> Self {
        Self {
            runner,
            cache: TimedCache::new(config.cache_capacity),
            cache_ttl: config.cache_ttl,
            monitor,
        }
    }

    /// Describe the media at `url`. Never fails; see [`MediaDescriptor::fallback`].
    pub async fn probe(&self, url: &str) -> MediaDescriptor {
        let started = Instant::now();
        let runner = &self.runner;

        let result = self
            .cache
            .get_or_try_compute(url, self.cache_ttl, || async move {
                let output = runner.run(url).await?;
                Ok::<_, ProbeFailure>(MediaDescriptor::from_probe(&output))
            })
            .await;

        self.monitor
            .record_request_time(started.elapsed().as_secs_f64())
            .await;

        match result {
            Ok((descriptor, true)) => {
                self.monitor.record_cache_hit();
                descriptor
            }
            Ok((descriptor, false)) => {
                self.monitor.record_cache_miss();
                descriptor
            }
            Err(e) => {
                warn!(
                    "Probe failed for {}: {}",
                    UrlUtils::obfuscate_credentials(url),
                    e
                );
                self.monitor.record_cache_miss();
                self.monitor.increment_error();
                MediaDescriptor::fallback()
            }
        }
    }

    /// Whether the probe tool can be executed
    pub async fn ffprobe_available(&self) -> bool {
        match self.runner.version().await {
            Ok(version) => {
                debug!("Probe tool available: {}", version);
                true
            }
            Err(e) => {
                debug!("Probe tool unavailable: {}", e);
                false
            }
        }
    }

    pub async fn cached_entries(&self) -> usize {
        self.cache.len().await
    }
}
