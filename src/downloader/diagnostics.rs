// Failure diagnostics - turns yt-dlp stderr into a short, actionable hint

use serde::{Deserialize, Serialize};

/// Likely cause of a non-zero tool exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureHint {
    /// No extractor for this site
    UnsupportedUrl,
    /// Deleted, removed or otherwise gone
    Unavailable,
    /// Needs an authorized account
    Private,
    /// Blocked in the caller's region
    GeoBlocked,
    /// 429 / too many requests
    RateLimited,
    /// HTTP 403
    Forbidden,
    /// Requested selector no longer offered
    FormatUnavailable,
    /// DNS, refused connection, socket timeout
    Network,
    /// ffmpeg missing for a merge
    MergerMissing,
    Unknown,
}

impl FailureHint {
    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnsupportedUrl => "This site is not supported",
            Self::Unavailable => "Media unavailable",
            Self::Private => "Private media",
            Self::GeoBlocked => "Not available in your country",
            Self::RateLimited => "Rate limited by the site",
            Self::Forbidden => "Access denied (HTTP 403)",
            Self::FormatUnavailable => "Requested quality is not available",
            Self::Network => "Network error",
            Self::MergerMissing => "ffmpeg is required to merge video and audio",
            Self::Unknown => "Download failed",
        }
    }

    /// Whether re-fetching the info and picking again might help
    pub fn refetch_might_help(&self) -> bool {
        matches!(self, Self::FormatUnavailable | Self::Forbidden)
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::UnsupportedUrl | Self::Unavailable | Self::Private)
    }
}

/// Analyze error output and return the most specific hint
pub fn diagnose_error(error: &str) -> Option<FailureHint> {
    let lower = error.to_lowercase();

    if lower.contains("unsupported url") {
        return Some(FailureHint::UnsupportedUrl);
    }

    if lower.contains("requested format is not available") {
        return Some(FailureHint::FormatUnavailable);
    }

    if lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("sign in if you've been granted access")
    {
        return Some(FailureHint::Private);
    }

    if lower.contains("video unavailable")
        || lower.contains("has been removed")
        || lower.contains("no longer available")
        || lower.contains("is unavailable")
    {
        return Some(FailureHint::Unavailable);
    }

    if lower.contains("available in your country") || lower.contains("blocked in your country") {
        return Some(FailureHint::GeoBlocked);
    }

    if lower.contains("429") || lower.contains("too many requests") || lower.contains("rate limit") {
        return Some(FailureHint::RateLimited);
    }

    if lower.contains("403") || lower.contains("forbidden") {
        return Some(FailureHint::Forbidden);
    }

    if lower.contains("ffmpeg") && (lower.contains("not installed") || lower.contains("not found")) {
        return Some(FailureHint::MergerMissing);
    }

    if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection refused")
        || lower.contains("network is unreachable")
        || lower.contains("name or service not known")
        || lower.contains("getaddrinfo failed")
    {
        return Some(FailureHint::Network);
    }

    if !error.trim().is_empty() {
        return Some(FailureHint::Unknown);
    }

    None
}

/// First `ERROR:` line, else the last non-empty line, bounded for status text
pub fn summarize_error(error: &str) -> String {
    let line = error
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| error.lines().map(str::trim).rev().find(|l| !l.is_empty()))
        .unwrap_or("Unknown error");

    line.chars().take(200).collect()
}

/// Status text for a failed tool run
pub fn describe_failure(error: &str) -> String {
    let summary = summarize_error(error);
    match diagnose_error(error) {
        Some(hint) if hint != FailureHint::Unknown => {
            format!("{} | {}", hint.description(), summary)
        }
        _ => summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_403_detection() {
        let error = "ERROR: unable to download video data: HTTP Error 403: Forbidden";
        assert_eq!(diagnose_error(error), Some(FailureHint::Forbidden));
    }

    #[test]
    fn test_format_detection() {
        let error = "ERROR: [youtube] abc: Requested format is not available";
        assert_eq!(diagnose_error(error), Some(FailureHint::FormatUnavailable));
        assert!(FailureHint::FormatUnavailable.refetch_might_help());
    }

    #[test]
    fn test_unsupported_url_detection() {
        let error = "ERROR: Unsupported URL: https://example.com/";
        assert_eq!(diagnose_error(error), Some(FailureHint::UnsupportedUrl));
        assert!(FailureHint::UnsupportedUrl.is_permanent());
    }

    #[test]
    fn test_network_detection() {
        assert_eq!(diagnose_error("Read timed out."), Some(FailureHint::Network));
    }

    #[test]
    fn test_geo_detection() {
        let error = "The uploader has not made this video available in your country";
        assert_eq!(diagnose_error(error), Some(FailureHint::GeoBlocked));
    }

    #[test]
    fn test_empty_error() {
        assert_eq!(diagnose_error("  "), None);
        assert_eq!(diagnose_error("something odd"), Some(FailureHint::Unknown));
    }

    #[test]
    fn test_summarize_prefers_error_line() {
        let stderr = "WARNING: slow\nERROR: Video unavailable\ntrailing";
        assert_eq!(summarize_error(stderr), "ERROR: Video unavailable");
        assert_eq!(summarize_error("one\ntwo\n\n"), "two");
        assert_eq!(summarize_error(""), "Unknown error");
    }

    #[test]
    fn test_describe_failure() {
        let text = describe_failure("ERROR: Private video. Sign in if you've been granted access");
        assert!(text.starts_with("Private media | ERROR: Private video"));
        assert_eq!(describe_failure("exit 1"), "exit 1");
    }
}
