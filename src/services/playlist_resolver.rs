//! Playlist resolution
//!
//! Fetches a playlist, and for a master playlist follows its first listed
//! variant to the media playlist whose segments will be analysed.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::RequestTimeouts;
use crate::errors::{MonitorError, MonitorResult};
use crate::models::playlist::{PlaylistDocument, SegmentRef};
use crate::utils::http_client::HttpFetcher;
use crate::utils::url::UrlUtils;

/// Outcome of resolving a playlist URL down to a segment list
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlaylist {
    /// URL of the playlist whose segments are analysed
    pub analysis_url: String,
    /// `analysis_url` without its last path segment, ending in `/`
    pub base_url: String,
    pub segments: Vec<SegmentRef>,
    /// Declared bandwidth of the chosen variant; 0 for a media playlist
    pub declared_bandwidth: u64,
    /// Whether the input URL was a master playlist
    pub is_variant: bool,
    pub variant_count: usize,
}

impl ResolvedPlaylist {
    /// Absolute URL of a segment of this playlist
    pub fn segment_url(&self, segment: &SegmentRef) -> String {
        UrlUtils::join(&self.base_url, &segment.uri)
            .unwrap_or_else(|_| format!("{}{}", self.base_url, segment.uri))
    }

    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|segment| segment.duration).sum()
    }
}

pub struct PlaylistResolver {
    http: Arc<dyn HttpFetcher>,
    timeouts: RequestTimeouts,
}

impl PlaylistResolver {
    pub fn new(http: Arc<dyn HttpFetcher>, timeouts: RequestTimeouts) -> Self {
        Self { http, timeouts }
    }

    /// Fetch and parse a playlist, requiring status 200
    pub async fn fetch_document(&self, url: &str) -> MonitorResult<PlaylistDocument> {
        let response = self
            .http
            .get(url, self.timeouts)
            .await
            .map_err(|e| MonitorError::fetch(url, e.to_string()))?;

        if !response.is_ok() {
            return Err(MonitorError::fetch(
                url,
                format!("HTTP {} when fetching playlist", response.status),
            ));
        }

        PlaylistDocument::parse(&response.body).map_err(|e| MonitorError::parse(url, e))
    }

    pub async fn resolve(&self, playlist_url: &str) -> MonitorResult<ResolvedPlaylist> {
        let document = self.fetch_document(playlist_url).await?;

        if !document.is_variant {
            debug!("Media playlist with {} segments", document.segments.len());
            return Ok(Self::resolved(playlist_url, document.segments, 0, false, 0));
        }

        let variant_count = document.variants.len();
        let Some(variant) = document.variants.first() else {
            warn!("Master playlist lists no variants, analysing it as-is");
            return Ok(Self::resolved(playlist_url, document.segments, 0, true, 0));
        };

        let variant_url = UrlUtils::join(playlist_url, &variant.uri)
            .map_err(|e| MonitorError::parse(playlist_url, format!("invalid variant URI '{}': {e}", variant.uri)))?;
        debug!(
            "Master playlist with {} variants, following first variant ({} bps): {}",
            variant_count,
            variant.declared_bandwidth,
            UrlUtils::obfuscate_credentials(&variant_url)
        );

        let response = self
            .http
            .get(&variant_url, self.timeouts)
            .await
            .map_err(|e| MonitorError::fetch(&variant_url, e.to_string()))?;

        if !response.is_ok() {
            warn!(
                "Variant playlist returned HTTP {}, continuing with the master playlist",
                response.status
            );
            return Ok(Self::resolved(
                playlist_url,
                document.segments,
                variant.declared_bandwidth,
                true,
                variant_count,
            ));
        }

        let media = PlaylistDocument::parse(&response.body)
            .map_err(|e| MonitorError::parse(&variant_url, e))?;

        Ok(Self::resolved(
            &variant_url,
            media.segments,
            variant.declared_bandwidth,
            true,
            variant_count,
        ))
    }

    fn resolved(
        analysis_url: &str,
        segments: Vec<SegmentRef>,
        declared_bandwidth: u64,
        is_variant: bool,
        variant_count: usize,
    ) -> ResolvedPlaylist {
        ResolvedPlaylist {
            analysis_url: analysis_url.to_string(),
            base_url: UrlUtils::base_url(analysis_url),
            segments,
            declared_bandwidth,
            is_variant,
            variant_count,
        }
    }
}
