use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use hls_monitor::{
    config::Config,
    errors::ProbeResult,
    services::{FfprobeOutput, LiveMetricsService, ProbeRunner},
    utils::{HttpFetcher, StandardHttpClient},
};

// ============================================================================
// Test server infrastructure
// ============================================================================

struct TestServer {
    base_url: String,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    async fn new(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let server = axum::serve(listener, router).with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });

        tokio::spawn(async move {
            server.await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            base_url: format!("http://{addr}"),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

// ============================================================================
// Test endpoints
// ============================================================================

const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
low/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
high/index.m3u8
";

const DEGRADED_MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=1200000
missing/index.m3u8
";

fn media_playlist(count: usize) -> String {
    let mut body = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n");
    for i in 1..=count {
        body.push_str(&format!("#EXTINF:4.0,\nseg{i}.ts\n"));
    }
    body
}

/// `low/` serves a 7-segment live window: seg6 is missing, seg7 stalls
async fn low_rendition(Path(name): Path<String>) -> Response {
    match name.as_str() {
        "index.m3u8" => media_playlist(7).into_response(),
        "seg6.ts" => StatusCode::NOT_FOUND.into_response(),
        "seg7.ts" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            StatusCode::OK.into_response()
        }
        _ => StatusCode::OK.into_response(),
    }
}

async fn high_rendition(Path(_name): Path<String>) -> Response {
    media_playlist(3).into_response()
}

fn router() -> Router {
    Router::new()
        .route("/master.m3u8", get(|| async { MASTER }))
        .route("/degraded/master.m3u8", get(|| async { DEGRADED_MASTER }))
        .route("/broken.m3u8", get(|| async { "<html>oops</html>" }))
        .route("/low/{name}", get(low_rendition))
        .route("/high/{name}", get(high_rendition))
}

// ============================================================================
// Probe double
// ============================================================================

/// Records every probed URL and reports video/audio without bitrates
#[derive(Default)]
struct CountingProbe {
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

#[async_trait]
impl ProbeRunner for CountingProbe {
    async fn run(&self, url: &str) -> ProbeResult<FfprobeOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().await.push(url.to_string());

        Ok(serde_json::from_str(
            r#"{"streams": [
                {"codec_name": "h264", "codec_type": "video", "width": 640, "height": 360, "r_frame_rate": "30/1"},
                {"codec_name": "aac", "codec_type": "audio", "sample_rate": "48000", "channels": 2}
            ], "format": {"duration": "4.0"}}"#,
        )?)
    }

    async fn version(&self) -> ProbeResult<String> {
        Ok("ffprobe version test".to_string())
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.http.backoff_factor = Duration::from_millis(10);
    config.segments.batch_timeout = Duration::from_millis(500);
    config.segments.batch_pause = Duration::from_millis(10);
    config
}

fn service(probe: Arc<CountingProbe>) -> LiveMetricsService {
    let config = test_config();
    let http: Arc<dyn HttpFetcher> = Arc::new(StandardHttpClient::new(&config.http).unwrap());
    LiveMetricsService::new(&config, http, probe)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_master_playlist_cycle() {
    let server = TestServer::new(router()).await;
    let probe = Arc::new(CountingProbe::default());
    let service = service(probe.clone());

    let snapshot = service.poll(&server.url("/master.m3u8")).await.unwrap();

    // First listed variant is analysed, not the highest bandwidth one
    assert_eq!(snapshot.total_segments, 7);
    assert_eq!(probe.urls.lock().await.as_slice(), [server.url("/low/seg1.ts")]);

    let indices: Vec<usize> = snapshot.recent_segments.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![3, 4, 5, 6, 7]);

    let statuses: Vec<u16> = snapshot.recent_segments.iter().map(|s| s.status_code).collect();
    assert_eq!(statuses, vec![200, 200, 200, 404, 0]);
    assert_eq!(snapshot.recent_segments[4].response_time_ms, 0.0);
    assert_eq!(snapshot.stats.success_rate, 60.0);
    assert_eq!(snapshot.stats.total_duration, 28.0);

    // Bitrates come from the declared variant bandwidth
    assert_eq!(snapshot.stats.avg_bitrate, 800_000);
    assert_eq!(snapshot.stats.audio_bitrate, 80_000);
    assert_eq!(snapshot.stats.video_bitrate, 720_000);
    assert_eq!(snapshot.video_info.resolution, "640x360");
    assert_eq!(snapshot.performance.recommended_refresh_interval, 7.0);
}

#[tokio::test]
async fn test_probe_runs_once_per_segment_url() {
    let server = TestServer::new(router()).await;
    let probe = Arc::new(CountingProbe::default());
    let service = service(probe.clone());
    let url = server.url("/high/index.m3u8");

    let first = service.poll(&url).await.unwrap();
    let second = service.poll(&url).await.unwrap();

    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.video_info, second.video_info);
    assert_eq!(service.recent_snapshots(10).await.len(), 2);

    let stats = service.performance_stats().await;
    assert_eq!(stats.performance.cache_hits, 1);
    assert_eq!(stats.performance.cache_misses, 1);
    assert_eq!(stats.cache_size, 2);
}

#[tokio::test]
async fn test_missing_variant_degrades_to_master() {
    let server = TestServer::new(router()).await;
    let probe = Arc::new(CountingProbe::default());
    let service = service(probe.clone());

    let snapshot = service.poll(&server.url("/degraded/master.m3u8")).await.unwrap();

    assert_eq!(snapshot.total_segments, 0);
    assert!(snapshot.recent_segments.is_empty());
    assert_eq!(snapshot.stats.success_rate, 0.0);
    assert_eq!(snapshot.stats.avg_bitrate, 1_200_000);
    assert_eq!(snapshot.video_info.codec, "unknown");
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fatal_failures_are_values() {
    let server = TestServer::new(router()).await;
    let service = service(Arc::new(CountingProbe::default()));

    let not_found = service.poll(&server.url("/nope.m3u8")).await.unwrap_err();
    assert!(not_found.error.contains("HTTP 404 when fetching playlist"));

    let malformed = service.poll(&server.url("/broken.m3u8")).await.unwrap_err();
    assert!(malformed.error.contains("Failed to parse playlist"));

    assert_eq!(service.monitor().error_count(), 2);
    assert!(service.recent_snapshots(10).await.is_empty());
}

#[tokio::test]
async fn test_connectivity_report_for_master() {
    let server = TestServer::new(router()).await;
    let service = service(Arc::new(CountingProbe::default()));

    let report = service.test_url(&server.url("/master.m3u8")).await;

    assert!(report.success);
    assert_eq!(report.http_status, Some(200));
    assert!(report.is_variant);
    assert_eq!(report.variants_count, 2);
    assert_eq!(report.segments_count, 0);
    assert!(service.prober().ffprobe_available().await);
}
