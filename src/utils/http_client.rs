use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::{HttpConfig, RequestTimeouts};
use crate::errors::{AppResult, TransportError, TransportResult};
use crate::utils::retry::{RetryConfig, with_retry};
use crate::utils::url::UrlUtils;

/// Status and body of a completed GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP collaborator used by the resolver and the segment checker
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// GET a URL; any received status is a success at this layer
    async fn get(&self, url: &str, timeouts: RequestTimeouts) -> TransportResult<HttpResponse>;

    /// HEAD a URL and return the status code
    async fn head(&self, url: &str, timeouts: RequestTimeouts) -> TransportResult<u16>;
}

/// Default implementation of HttpFetcher using a single pooled reqwest client
pub struct StandardHttpClient {
    client: Client,
    retry: RetryConfig,
}

impl StandardHttpClient {
    pub fn new(config: &HttpConfig) -> AppResult<Self> {
        // reqwest only supports a client-wide connect timeout, so the larger
        // of the two is used and each request also carries a total deadline.
        let connect_timeout = config
            .playlist_timeouts
            .connect
            .max(config.segment_timeouts.connect);

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(concat!("hls-monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            retry: RetryConfig::from_http_config(config),
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl HttpFetcher for StandardHttpClient {
    async fn get(&self, url: &str, timeouts: RequestTimeouts) -> TransportResult<HttpResponse> {
        debug!("GET {}", UrlUtils::obfuscate_credentials(url));
        let client = &self.client;

        let (status, body) = with_retry(&self.retry, url, || async move {
            let response = client
                .get(url)
                .timeout(timeouts.total())
                .send()
                .await
                .map_err(|e| TransportError::from_reqwest(url, &e))?;

            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::from_reqwest(url, &e))?;

            Ok((status, body.to_vec()))
        })
        .await?;

        debug!("GET {} -> {} ({} bytes)", UrlUtils::obfuscate_credentials(url), status, body.len());
        Ok(HttpResponse { status, body })
    }

    async fn head(&self, url: &str, timeouts: RequestTimeouts) -> TransportResult<u16> {
        let client = &self.client;

        let (status, ()) = with_retry(&self.retry, url, || async move {
            let response = client
                .head(url)
                .timeout(timeouts.total())
                .send()
                .await
                .map_err(|e| TransportError::from_reqwest(url, &e))?;

            Ok((response.status().as_u16(), ()))
        })
        .await?;

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_http_response_helpers() {
        let response = HttpResponse::new(200, "#EXTM3U\n");
        assert!(response.is_ok());
        assert_eq!(response.text(), "#EXTM3U\n");

        assert!(!HttpResponse::new(204, Vec::new()).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_transport_error() {
        let client = StandardHttpClient::new(&HttpConfig::default())
            .unwrap()
            .with_retry_config(RetryConfig::no_retry());

        // Port 9 on loopback refuses connections on any test host
        let timeouts = RequestTimeouts::new(Duration::from_secs(1), Duration::from_secs(1));
        let result = client.head("http://127.0.0.1:9/seg.ts", timeouts).await;

        assert!(result.is_err());
    }
}
