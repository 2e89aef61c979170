//! Live metrics orchestration
//!
//! One call to [`LiveMetricsService::poll`] runs a full collection cycle:
//!
//! 1. validate and resolve the playlist (following the first variant of a
//!    master playlist)
//! 2. probe the first segment and reconcile its bitrates with the declared
//!    variant bandwidth
//! 3. check the most recent segments in small concurrent sub-batches
//! 4. aggregate a [`LiveSnapshot`], feed the adaptive refresh controller and
//!    append to the bounded histories
//!
//! Only playlist-level failures abort a cycle; they are returned as a
//! [`PollFailure`] value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::config::{Config, RequestTimeouts};
use crate::errors::{AppResult, MonitorError, MonitorResult, PollFailure};
use crate::models::media::MediaDescriptor;
use crate::models::snapshot::{
    AudioSummary, ConnectivityReport, LiveSnapshot, MetricsPoint, PerformanceHint,
    SegmentCheckResult, SegmentDetails, SnapshotStats, VideoSummary,
};
use crate::observability::{PerformanceMonitor, PerformanceStats};
use crate::services::adaptive_refresh::AdaptiveRefresh;
use crate::services::history_buffer::HistoryBuffer;
use crate::services::playlist_resolver::{PlaylistResolver, ResolvedPlaylist};
use crate::services::segment_checker::SegmentChecker;
use crate::services::stream_prober::{FfprobeRunner, ProbeRunner, StreamProber};
use crate::utils::http_client::{HttpFetcher, StandardHttpClient};
use crate::utils::url::UrlUtils;

/// Audio share assumed when only the total bandwidth is known
const ESTIMATED_AUDIO_SHARE: f64 = 0.1;
/// Upper bound for an estimated audio bitrate
const MAX_ESTIMATED_AUDIO_BITRATE: u64 = 256_000;

/// Monitor statistics plus service-level state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    #[serde(flatten)]
    pub performance: PerformanceStats,
    /// Seconds
    pub adaptive_refresh_interval: f64,
    /// Number of snapshots held in history
    pub cache_size: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"42.3%"`
    pub memory_usage: String,
    pub performance: PerformanceStats,
}

/// Fill in bitrates the probe could not measure from the declared variant
/// bandwidth `declared`. Measured values are never overwritten.
pub fn reconcile_bitrates(descriptor: MediaDescriptor, declared: u64) -> MediaDescriptor {
    let mut merged = descriptor;
    if declared == 0 {
        return merged;
    }

    if merged.total_bitrate == 0 {
        merged.total_bitrate = declared;
    }

    if merged.video.bitrate == 0 {
        if merged.audio.bitrate > 0 {
            merged.video.bitrate = declared.saturating_sub(merged.audio.bitrate);
        } else {
            let estimated_audio =
                ((declared as f64 * ESTIMATED_AUDIO_SHARE) as u64).min(MAX_ESTIMATED_AUDIO_BITRATE);
            merged.audio.bitrate = estimated_audio;
            merged.video.bitrate = declared - estimated_audio;
        }
    }

    merged
}

pub struct LiveMetricsService {
    http: Arc<dyn HttpFetcher>,
    resolver: PlaylistResolver,
    prober: Arc<StreamProber>,
    checker: SegmentChecker,
    refresh: Mutex<AdaptiveRefresh>,
    snapshots: RwLock<HistoryBuffer<LiveSnapshot>>,
    metrics: RwLock<HistoryBuffer<MetricsPoint>>,
    last_updated: RwLock<Option<DateTime<Utc>>>,
    monitor: Arc<PerformanceMonitor>,
    playlist_timeouts: RequestTimeouts,
    recent_count: usize,
}

impl LiveMetricsService {
    /// Build a service around the given HTTP and probe collaborators
    pub fn new(config: &Config, http: Arc<dyn HttpFetcher>, runner: Arc<dyn ProbeRunner>) -> Self {
        let monitor = Arc::new(PerformanceMonitor::new(&config.history));
        let playlist_timeouts = config.http.playlist_timeouts;

        Self {
            resolver: PlaylistResolver::new(http.clone(), playlist_timeouts),
            prober: Arc::new(StreamProber::new(runner, &config.probe, monitor.clone())),
            checker: SegmentChecker::new(http.clone(), config.http.segment_timeouts, &config.segments),
            refresh: Mutex::new(AdaptiveRefresh::new(&config.refresh)),
            snapshots: RwLock::new(HistoryBuffer::new(config.history.snapshot_capacity)),
            metrics: RwLock::new(HistoryBuffer::new(config.history.metrics_capacity)),
            last_updated: RwLock::new(None),
            monitor,
            http,
            playlist_timeouts,
            recent_count: config.segments.recent_count,
        }
    }

    /// Build a service with the reqwest client and the ffprobe binary
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let http: Arc<dyn HttpFetcher> = Arc::new(StandardHttpClient::new(&config.http)?);
        let runner: Arc<dyn ProbeRunner> = Arc::new(FfprobeRunner::new(&config.probe));
        Ok(Self::new(config, http, runner))
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    pub fn prober(&self) -> &Arc<StreamProber> {
        &self.prober
    }

    /// Poll with a percent-encoded playlist URL, as received in a request path
    pub async fn poll_encoded(&self, encoded_url: &str) -> Result<LiveSnapshot, PollFailure> {
        self.poll(&UrlUtils::decode_path_param(encoded_url)).await
    }

    /// Run one collection cycle for `playlist_url`
    pub async fn poll(&self, playlist_url: &str) -> Result<LiveSnapshot, PollFailure> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!(
            "poll",
            %cycle_id,
            url = %UrlUtils::obfuscate_credentials(playlist_url)
        );

        async {
            let started = Instant::now();
            let result = self.collect(playlist_url, started).await;
            let processing_time = started.elapsed().as_secs_f64();
            self.monitor.record_request_time(processing_time).await;

            match result {
                Ok(snapshot) => {
                    info!(
                        "Live metrics processed in {:.2}s. Success rate: {:.1}%",
                        processing_time, snapshot.stats.success_rate
                    );
                    Ok(snapshot)
                }
                Err(e) => {
                    self.monitor.increment_error();
                    error!("Poll cycle failed after {:.2}s: {}", processing_time, e);
                    Err(PollFailure::new(e.to_string(), processing_time))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn collect(&self, playlist_url: &str, started: Instant) -> MonitorResult<LiveSnapshot> {
        if !UrlUtils::is_valid(playlist_url) {
            return Err(MonitorError::InvalidUrl {
                url: playlist_url.to_string(),
            });
        }

        let resolved = self.resolver.resolve(playlist_url).await?;
        debug!(
            "Resolved {} segments (variant: {}, declared bandwidth: {})",
            resolved.segments.len(),
            resolved.is_variant,
            resolved.declared_bandwidth
        );

        let descriptor = match resolved.segments.first() {
            Some(first) => {
                let probed = self.prober.probe(&resolved.segment_url(first)).await;
                reconcile_bitrates(probed, resolved.declared_bandwidth)
            }
            None => MediaDescriptor::fallback(),
        };

        let recent_segments = self.check_recent_segments(&resolved).await;
        let stats = Self::aggregate(&resolved, &recent_segments, &descriptor);

        let recommended_interval = {
            let mut refresh = self.refresh.lock().await;
            refresh.record(stats.success_rate);
            refresh.recommend()
        };

        let snapshot = LiveSnapshot {
            timestamp: Utc::now(),
            total_segments: resolved.segments.len(),
            recent_segments,
            stats,
            video_info: VideoSummary::from_descriptor(&descriptor),
            audio_info: AudioSummary::from_descriptor(&descriptor),
            performance: PerformanceHint {
                recommended_refresh_interval: recommended_interval.as_secs_f64(),
            },
        };

        let point = MetricsPoint::from_snapshot(&snapshot, started.elapsed().as_secs_f64());
        self.snapshots.write().await.push(snapshot.clone());
        self.metrics.write().await.push(point);
        *self.last_updated.write().await = Some(snapshot.timestamp);

        Ok(snapshot)
    }

    /// Check the trailing `recent_count` segments, preserving playlist order
    async fn check_recent_segments(&self, resolved: &ResolvedPlaylist) -> Vec<SegmentCheckResult> {
        let total = resolved.segments.len();
        let offset = total.saturating_sub(self.recent_count);
        let recent = &resolved.segments[offset..];

        let urls: Vec<String> = recent
            .iter()
            .map(|segment| resolved.segment_url(segment))
            .collect();
        let outcomes = self.checker.check_in_batches(&urls).await;

        recent
            .iter()
            .zip(outcomes)
            .enumerate()
            .map(|(i, (segment, outcome))| SegmentCheckResult {
                index: offset + i + 1,
                uri: segment.uri.clone(),
                duration: segment.duration,
                status_code: outcome.status_code,
                response_time_ms: outcome.response_time_ms,
                timestamp: Utc::now(),
            })
            .collect()
    }

    fn aggregate(
        resolved: &ResolvedPlaylist,
        checked: &[SegmentCheckResult],
        descriptor: &MediaDescriptor,
    ) -> SnapshotStats {
        let (avg_duration, success_rate) = if checked.is_empty() {
            (0.0, 0.0)
        } else {
            let count = checked.len() as f64;
            let available = checked.iter().filter(|s| s.is_available()).count() as f64;
            let duration: f64 = checked.iter().map(|s| s.duration).sum();
            (duration / count, available / count * 100.0)
        };

        let avg_bitrate = if descriptor.total_bitrate > 0 {
            descriptor.total_bitrate
        } else {
            resolved.declared_bandwidth
        };

        SnapshotStats {
            avg_duration,
            success_rate,
            total_duration: resolved.total_duration(),
            avg_bitrate,
            video_bitrate: descriptor.video.bitrate,
            audio_bitrate: descriptor.audio.bitrate,
        }
    }

    /// The `n` most recent snapshots, oldest first
    pub async fn recent_snapshots(&self, n: usize) -> Vec<LiveSnapshot> {
        self.snapshots.read().await.get_recent(n)
    }

    /// The `n` most recent metrics points, oldest first
    pub async fn metrics_history(&self, n: usize) -> Vec<MetricsPoint> {
        self.metrics.read().await.get_recent(n)
    }

    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        *self.last_updated.read().await
    }

    pub async fn recommended_interval(&self) -> Duration {
        self.refresh.lock().await.recommend()
    }

    pub async fn performance_stats(&self) -> ServiceStats {
        ServiceStats {
            performance: self.monitor.stats().await,
            adaptive_refresh_interval: self.recommended_interval().await.as_secs_f64(),
            cache_size: self.snapshots.read().await.len(),
            last_updated: self.last_updated().await,
        }
    }

    /// Sample memory usage and report overall health
    pub async fn health(&self) -> HealthReport {
        let memory = self.monitor.sample_memory().await;
        HealthReport {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
            memory_usage: format!("{memory:.1}%"),
            performance: self.monitor.stats().await,
        }
    }

    /// Check that a playlist URL answers and parses
    pub async fn test_url(&self, playlist_url: &str) -> ConnectivityReport {
        if !UrlUtils::is_valid(playlist_url) {
            return ConnectivityReport::failed(None, format!("Invalid playlist URL: {playlist_url}"));
        }

        let status = match self.http.head(playlist_url, self.playlist_timeouts).await {
            Ok(status) => status,
            Err(e) => return ConnectivityReport::failed(None, e.to_string()),
        };
        if status != 200 {
            return ConnectivityReport::failed(Some(status), format!("HTTP {status}"));
        }

        match self.resolver.fetch_document(playlist_url).await {
            Ok(document) => ConnectivityReport {
                success: true,
                http_status: Some(status),
                is_variant: document.is_variant,
                segments_count: document.segments.len(),
                variants_count: document.variants.len(),
                error: None,
            },
            Err(e) => ConnectivityReport::failed(Some(status), e.to_string()),
        }
    }

    /// Probe and check a single segment
    pub async fn segment_details(&self, segment_url: &str) -> SegmentDetails {
        let (descriptor, status_code) =
            tokio::join!(self.prober.probe(segment_url), self.checker.check(segment_url));

        SegmentDetails {
            url: segment_url.to_string(),
            status_code,
            codec: descriptor.video.codec.clone(),
            width: descriptor.video.width,
            height: descriptor.video.height,
            frame_rate: descriptor.video.frame_rate,
            duration: descriptor.duration,
            bitrate: descriptor.effective_bitrate(),
            timestamp: Utc::now(),
        }
    }

    /// Log final statistics; call once before exiting
    pub async fn shutdown(&self) {
        let stats = self.performance_stats().await;
        info!(
            "Shutting down: {} snapshots, {} errors, avg cycle {:.2}s, probe cache hit rate {:.1}%",
            stats.cache_size,
            stats.performance.error_count,
            stats.performance.avg_request_time,
            stats.performance.cache_hit_rate
        );
    }
}
