//! URL utilities for playlist and segment addressing

use regex::Regex;
use url::Url;

/// URL utilities for consistent URL handling
pub struct UrlUtils;

impl UrlUtils {
    /// Parse a URL, requiring both a scheme and a host
    pub fn parse_and_validate(url: &str) -> Result<Url, url::ParseError> {
        let parsed = Url::parse(url.trim())?;
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(url::ParseError::EmptyHost);
        }
        Ok(parsed)
    }

    /// Whether a URL has a scheme and a host
    ///
    /// ```rust
    /// use hls_monitor::utils::url::UrlUtils;
    ///
    /// assert!(UrlUtils::is_valid("https://cdn.example.com/live.m3u8"));
    /// assert!(!UrlUtils::is_valid("/live.m3u8"));
    /// assert!(!UrlUtils::is_valid("not a url"));
    /// ```
    pub fn is_valid(url: &str) -> bool {
        Self::parse_and_validate(url).is_ok()
    }

    /// Resolve a possibly relative reference against a base URL.
    /// Absolute references are returned unchanged.
    pub fn join(base: &str, reference: &str) -> Result<String, url::ParseError> {
        let base_url = Url::parse(base)?;
        let joined = base_url.join(reference)?;
        Ok(joined.to_string())
    }

    /// The URL with its query and last path segment removed, ending in `/`
    ///
    /// ```rust
    /// use hls_monitor::utils::url::UrlUtils;
    ///
    /// assert_eq!(
    ///     UrlUtils::base_url("http://h/a/b/index.m3u8?token=1"),
    ///     "http://h/a/b/"
    /// );
    /// ```
    pub fn base_url(url: &str) -> String {
        let without_query = url.split(['?', '#']).next().unwrap_or(url);
        let scheme_end = without_query.find("://").map(|i| i + 3).unwrap_or(0);

        match without_query[scheme_end..].rfind('/') {
            Some(pos) => format!("{}/", &without_query[..scheme_end + pos]),
            None => format!("{without_query}/"),
        }
    }

    /// Percent-decode a URL received as a path parameter
    pub fn decode_path_param(encoded: &str) -> String {
        urlencoding::decode(encoded)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| encoded.to_string())
    }

    /// Mask credentials in a URL before it is logged
    ///
    /// Covers userinfo (`user:pass@host`) and common credential query
    /// parameters.
    pub fn obfuscate_credentials(url: &str) -> String {
        let mut obfuscated = url.to_string();

        if let Ok(parsed) = Url::parse(url)
            && (!parsed.username().is_empty() || parsed.password().is_some())
        {
            let mut masked = parsed.clone();
            let _ = masked.set_username("****");
            let _ = masked.set_password(Some("****"));
            obfuscated = masked.to_string();
        }

        let sensitive_params = ["username", "password", "user", "pass", "token", "key"];
        for param in &sensitive_params {
            let pattern = format!(r"(?i)([?&]{}=)[^&]*", regex::escape(param));
            if let Ok(re) = Regex::new(&pattern) {
                obfuscated = re.replace_all(&obfuscated, "${1}****").to_string();
            }
        }

        obfuscated
    }
}
