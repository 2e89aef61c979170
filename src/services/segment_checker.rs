//! Segment availability checks
//!
//! HEAD requests against segment URLs with bounded concurrency. Individual
//! failures resolve to status 0; a whole batch is bounded by a deadline after
//! which unfinished URLs resolve to `(0, 0)`.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, warn};

use crate::config::{RequestTimeouts, SegmentCheckConfig};
use crate::models::snapshot::CheckOutcome;
use crate::utils::http_client::HttpFetcher;
use crate::utils::url::UrlUtils;

pub struct SegmentChecker {
    http: Arc<dyn HttpFetcher>,
    timeouts: RequestTimeouts,
    batch_timeout: Duration,
    batch_size: usize,
    batch_pause: Duration,
    max_concurrency: usize,
}

impl SegmentChecker {
    pub fn new(http: Arc<dyn HttpFetcher>, timeouts: RequestTimeouts, config: &SegmentCheckConfig) -> Self {
        Self {
            http,
            timeouts,
            batch_timeout: config.batch_timeout,
            batch_size: config.batch_size.max(1),
            batch_pause: config.batch_pause,
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// HTTP status of a HEAD request, or 0 on any failure
    pub async fn check(&self, url: &str) -> u16 {
        match self.http.head(url, self.timeouts).await {
            Ok(status) => status,
            Err(e) => {
                debug!("Segment check failed for {}: {}", UrlUtils::obfuscate_credentials(url), e);
                0
            }
        }
    }

    async fn timed_check(&self, url: &str) -> CheckOutcome {
        let started = Instant::now();
        match self.check(url).await {
            0 => CheckOutcome::unfinished(),
            status_code => CheckOutcome {
                status_code,
                response_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            },
        }
    }

    /// Check every URL with at most `max_concurrency` requests in flight.
    ///
    /// The result has an entry for every input URL. URLs still pending when
    /// the batch deadline passes map to `(0, 0)`.
    pub async fn check_many(&self, urls: &[String], max_concurrency: usize) -> HashMap<String, CheckOutcome> {
        let deadline = Instant::now() + self.batch_timeout;
        let mut results: HashMap<String, CheckOutcome> = urls
            .iter()
            .map(|url| (url.clone(), CheckOutcome::unfinished()))
            .collect();

        let mut pending = stream::iter(urls.iter().cloned())
            .map(|url| async move {
                let outcome = self.timed_check(&url).await;
                (url, outcome)
            })
            .buffer_unordered(max_concurrency.max(1));

        let mut completed = 0usize;
        loop {
            match timeout_at(deadline, pending.next()).await {
                Ok(Some((url, outcome))) => {
                    completed += 1;
                    results.insert(url, outcome);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Segment batch deadline of {:?} reached with {} of {} checks unfinished",
                        self.batch_timeout,
                        urls.len() - completed,
                        urls.len()
                    );
                    break;
                }
            }
        }

        results
    }

    /// Check URLs in consecutive sub-batches, pausing between them.
    ///
    /// Outcomes are returned in input order.
    pub async fn check_in_batches(&self, urls: &[String]) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::with_capacity(urls.len());
        let mut batches = urls.chunks(self.batch_size).peekable();

        while let Some(batch) = batches.next() {
            let results = self.check_many(batch, self.max_concurrency).await;
            outcomes.extend(
                batch
                    .iter()
                    .map(|url| results.get(url).copied().unwrap_or_else(CheckOutcome::unfinished)),
            );

            if batches.peek().is_some() {
                sleep(self.batch_pause).await;
            }
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{TransportError, TransportResult};
    use crate::utils::http_client::HttpResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// HEAD responses keyed by URL suffix; "hang" never answers in time
    struct ScriptedHttp {
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl ScriptedHttp {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpFetcher for ScriptedHttp {
        async fn get(&self, url: &str, _timeouts: RequestTimeouts) -> TransportResult<HttpResponse> {
            Err(TransportError::Request {
                url: url.to_string(),
                message: "GET not scripted".to_string(),
            })
        }

        async fn head(&self, url: &str, _timeouts: RequestTimeouts) -> TransportResult<u16> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

            let result = if url.ends_with("hang.ts") {
                sleep(Duration::from_secs(30)).await;
                Ok(200)
            } else if url.ends_with("missing.ts") {
                Ok(404)
            } else if url.ends_with("refused.ts") {
                Err(TransportError::Connect {
                    url: url.to_string(),
                    message: "connection refused".to_string(),
                })
            } else {
                sleep(Duration::from_millis(20)).await;
                Ok(200)
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn checker(http: Arc<ScriptedHttp>, batch_timeout: Duration) -> SegmentChecker {
        let config = SegmentCheckConfig {
            batch_timeout,
            batch_pause: Duration::from_millis(1),
            ..SegmentCheckConfig::default()
        };
        let timeouts = RequestTimeouts::new(Duration::from_secs(2), Duration::from_secs(5));
        SegmentChecker::new(http, timeouts, &config)
    }

    fn urls(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| format!("http://h/{name}")).collect()
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let checker = checker(Arc::new(ScriptedHttp::new()), Duration::from_secs(10));
        let urls = urls(&["a.ts", "missing.ts", "refused.ts"]);

        let results = checker.check_many(&urls, 5).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results["http://h/a.ts"].status_code, 200);
        assert!(results["http://h/a.ts"].response_time_ms > 0.0);
        assert_eq!(results["http://h/missing.ts"].status_code, 404);
        assert_eq!(results["http://h/refused.ts"], CheckOutcome::unfinished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_url_resolves_to_zero_at_deadline() {
        let checker = checker(Arc::new(ScriptedHttp::new()), Duration::from_secs(10));
        let urls = urls(&["a.ts", "hang.ts", "b.ts"]);

        let results = checker.check_many(&urls, 5).await;

        assert_eq!(results["http://h/a.ts"].status_code, 200);
        assert_eq!(results["http://h/b.ts"].status_code, 200);
        assert_eq!(results["http://h/hang.ts"], CheckOutcome::unfinished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_seven_urls_with_one_hanging() {
        let http = Arc::new(ScriptedHttp::new());
        let checker = checker(http.clone(), Duration::from_secs(10));
        let urls = urls(&["1.ts", "2.ts", "3.ts", "hang.ts", "5.ts", "6.ts", "7.ts"]);

        let results = checker.check_many(&urls, 5).await;

        assert_eq!(results.len(), 7);
        assert_eq!(results["http://h/hang.ts"], CheckOutcome::unfinished());
        let completed = results.values().filter(|outcome| outcome.status_code == 200).count();
        assert_eq!(completed, 6);
        assert!(http.peak_in_flight.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let http = Arc::new(ScriptedHttp::new());
        let checker = checker(http.clone(), Duration::from_secs(10));
        let urls = urls(&["1.ts", "2.ts", "3.ts", "4.ts", "5.ts", "6.ts", "7.ts"]);

        let results = checker.check_many(&urls, 2).await;

        assert_eq!(results.len(), 7);
        assert!(http.peak_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_batches_preserve_input_order() {
        let checker = checker(Arc::new(ScriptedHttp::new()), Duration::from_secs(10));
        let urls = urls(&["a.ts", "missing.ts", "b.ts", "refused.ts", "c.ts"]);

        let outcomes = checker.check_in_batches(&urls).await;

        let statuses: Vec<u16> = outcomes.iter().map(|o| o.status_code).collect();
        assert_eq!(statuses, vec![200, 404, 200, 0, 200]);
    }
}
