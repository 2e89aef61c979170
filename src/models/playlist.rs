//! Playlist document model backed by `m3u8-rs`

use m3u8_rs::Playlist;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF:";

/// One entry of a master playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRef {
    pub uri: String,
    /// Declared `BANDWIDTH`, bits per second
    pub declared_bandwidth: u64,
    /// Declared `RESOLUTION` as (width, height)
    pub resolution: Option<(u64, u64)>,
}

/// One media segment of a media playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRef {
    pub uri: String,
    /// Declared `EXTINF` duration in seconds
    pub duration: f64,
}

/// A parsed playlist. Exactly one of `variants` (master) or `segments`
/// (media) is meaningful, selected by `is_variant`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistDocument {
    pub is_variant: bool,
    pub variants: Vec<VariantRef>,
    pub segments: Vec<SegmentRef>,
}

impl PlaylistDocument {
    /// Parse a playlist body. I-frame-only variants are not listed.
    ///
    /// A leading byte order mark is ignored, and a variant without
    /// `BANDWIDTH` is kept with a declared bandwidth of 0.
    pub fn parse(body: &[u8]) -> Result<Self, String> {
        let body = normalize(body);
        match m3u8_rs::parse_playlist_res(&body) {
            Ok(Playlist::MasterPlaylist(master)) => Ok(Self {
                is_variant: true,
                variants: master
                    .variants
                    .into_iter()
                    .filter(|variant| !variant.is_i_frame)
                    .map(|variant| VariantRef {
                        uri: variant.uri,
                        declared_bandwidth: variant.bandwidth,
                        resolution: variant
                            .resolution
                            .map(|resolution| (resolution.width, resolution.height)),
                    })
                    .collect(),
                segments: Vec::new(),
            }),
            Ok(Playlist::MediaPlaylist(media)) => Ok(Self {
                is_variant: false,
                variants: Vec::new(),
                segments: media
                    .segments
                    .into_iter()
                    .map(|segment| SegmentRef {
                        uri: segment.uri,
                        duration: segment.duration as f64,
                    })
                    .collect(),
            }),
            Err(_) => Err(format!(
                "not an M3U8 playlist (starts with {:?})",
                first_line(&body)
            )),
        }
    }
}

/// Strip a BOM and leading whitespace, then give every `EXT-X-STREAM-INF`
/// an explicit `BANDWIDTH` so no variant is dropped by the parser.
fn normalize(body: &[u8]) -> Cow<'_, [u8]> {
    let body = body.strip_prefix(UTF8_BOM).unwrap_or(body).trim_ascii_start();

    let Ok(text) = std::str::from_utf8(body) else {
        return Cow::Borrowed(body);
    };
    let needs_bandwidth = |line: &str| {
        line.strip_prefix(STREAM_INF_TAG)
            .is_some_and(|attributes| !declares_bandwidth(attributes))
    };
    if !text.lines().any(needs_bandwidth) {
        return Cow::Borrowed(body);
    }

    let mut normalized = String::with_capacity(text.len() + 32);
    for line in text.split_inclusive('\n') {
        match line.strip_prefix(STREAM_INF_TAG) {
            Some(attributes) if !declares_bandwidth(attributes) => {
                normalized.push_str(STREAM_INF_TAG);
                normalized.push_str("BANDWIDTH=0");
                if !attributes.trim().is_empty() {
                    normalized.push(',');
                }
                normalized.push_str(attributes);
            }
            _ => normalized.push_str(line),
        }
    }
    Cow::Owned(normalized.into_bytes())
}

/// Whether an attribute list has a `BANDWIDTH` key. Commas inside quoted
/// values (`CODECS="avc1,mp4a"`) do not separate attributes.
fn declares_bandwidth(attributes: &str) -> bool {
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in attributes.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                if attribute_key(&attributes[start..i]) == "BANDWIDTH" {
                    return true;
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    attribute_key(&attributes[start..]) == "BANDWIDTH"
}

fn attribute_key(attribute: &str) -> &str {
    attribute.split_once('=').map_or("", |(key, _)| key.trim())
}

fn first_line(body: &[u8]) -> String {
    let line = body.split(|b| *b == b'\n').next().unwrap_or_default();
    String::from_utf8_lossy(line).trim().chars().take(64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
low/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720
mid/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
high/index.m3u8
";

    const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:100
#EXTINF:6.0,
seg100.ts
#EXTINF:6.0,
seg101.ts
#EXTINF:4.5,
seg102.ts
";

    #[test]
    fn test_parse_master_keeps_declared_order() {
        let doc = PlaylistDocument::parse(MASTER.as_bytes()).unwrap();

        assert!(doc.is_variant);
        assert!(doc.segments.is_empty());
        assert_eq!(doc.variants.len(), 3);
        assert_eq!(doc.variants[0].uri, "low/index.m3u8");
        assert_eq!(doc.variants[0].declared_bandwidth, 800_000);
        assert_eq!(doc.variants[0].resolution, Some((640, 360)));
        assert_eq!(doc.variants[2].declared_bandwidth, 5_000_000);
    }

    #[test]
    fn test_parse_media_segments() {
        let doc = PlaylistDocument::parse(MEDIA.as_bytes()).unwrap();

        assert!(!doc.is_variant);
        assert!(doc.variants.is_empty());
        assert_eq!(doc.segments.len(), 3);
        assert_eq!(doc.segments[0].uri, "seg100.ts");
        assert_eq!(doc.segments[2].duration, 4.5);
    }

    #[test]
    fn test_parse_rejects_non_playlist() {
        let err = PlaylistDocument::parse(b"<html><body>Not Found</body></html>").unwrap_err();

        assert_eq!(err, "not an M3U8 playlist (starts with \"<html><body>Not Found</body></html>\")");
    }

    #[test]
    fn test_parse_error_does_not_dump_body() {
        let body = format!("garbage\n{}", "x".repeat(4096));
        let err = PlaylistDocument::parse(body.as_bytes()).unwrap_err();

        assert!(err.contains("\"garbage\""));
        assert!(err.len() < 100);
    }

    #[test]
    fn test_parse_ignores_byte_order_mark() {
        let doc = PlaylistDocument::parse("\u{feff}#EXTM3U\n#EXTINF:6,\nseg1.ts\n".as_bytes()).unwrap();

        assert!(!doc.is_variant);
        assert_eq!(doc.segments.len(), 1);
        assert_eq!(doc.segments[0].uri, "seg1.ts");
    }

    #[test]
    fn test_parse_ignores_leading_whitespace() {
        let doc = PlaylistDocument::parse(format!("\r\n  {MEDIA}").as_bytes()).unwrap();
        assert_eq!(doc.segments.len(), 3);
    }

    #[test]
    fn test_variant_without_bandwidth_is_kept_in_order() {
        let master = "#EXTM3U
#EXT-X-STREAM-INF:RESOLUTION=640x360,CODECS=\"avc1.4d401e,mp4a.40.2\"
first/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000
second/index.m3u8
";
        let doc = PlaylistDocument::parse(master.as_bytes()).unwrap();

        assert_eq!(doc.variants.len(), 2);
        assert_eq!(doc.variants[0].uri, "first/index.m3u8");
        assert_eq!(doc.variants[0].declared_bandwidth, 0);
        assert_eq!(doc.variants[0].resolution, Some((640, 360)));
        assert_eq!(doc.variants[1].declared_bandwidth, 5_000_000);
    }

    #[test]
    fn test_only_variant_without_bandwidth() {
        let doc = PlaylistDocument::parse(b"#EXTM3U\r\n#EXT-X-STREAM-INF:\r\nonly/index.m3u8\r\n").unwrap();

        assert!(doc.is_variant);
        assert_eq!(doc.variants.len(), 1);
        assert_eq!(doc.variants[0].uri, "only/index.m3u8");
        assert_eq!(doc.variants[0].declared_bandwidth, 0);
    }

    #[test]
    fn test_average_bandwidth_is_not_bandwidth() {
        assert!(!declares_bandwidth("AVERAGE-BANDWIDTH=700000,RESOLUTION=640x360"));
        assert!(declares_bandwidth("AVERAGE-BANDWIDTH=700000,BANDWIDTH=800000"));
        assert!(!declares_bandwidth("CODECS=\"x,BANDWIDTH=1\""));
    }
}
