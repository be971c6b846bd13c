// Error types for the download controller

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// yt-dlp missing, even after the install attempt
    #[error("Tool not available: {0}")]
    ToolUnavailable(String),

    /// Tool exceeded its wall-clock budget
    #[error("Timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Metadata did not parse as the expected JSON document
    #[error("Invalid tool output: {0}")]
    InvalidOutput(String),

    /// Non-zero exit, carries the diagnostic text
    #[error("Tool failed: {0}")]
    ToolError(String),

    #[error("No quality options available")]
    NoQualityAvailable,

    #[error("Quality index {index} out of range ({len} options)")]
    InvalidQualityIndex { index: usize, len: usize },

    /// Cached quality list was derived for another request
    #[error("Quality list is stale: built for {snapshot_url} (generation {generation}), requested {requested_url}")]
    StaleSnapshot {
        snapshot_url: String,
        requested_url: String,
        generation: u64,
    },

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Network failure on the plain-file path
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Download cancelled")]
    UserCancelled,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Another download already owns the session
    #[error("A download is already in progress")]
    SessionBusy,

    /// Platform offers no way to suspend a child process
    #[error("Suspending processes is not supported on this platform")]
    SuspendUnsupported,
}

impl DownloadError {
    /// Stable tag for front ends and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolUnavailable(_) => "tool_unavailable",
            Self::Timeout(_) => "timeout",
            Self::InvalidOutput(_) => "invalid_output",
            Self::ToolError(_) => "tool_error",
            Self::NoQualityAvailable => "no_quality_available",
            Self::InvalidQualityIndex { .. } => "invalid_quality_index",
            Self::StaleSnapshot { .. } => "stale_snapshot",
            Self::Io(_) | Self::Http(_) => "io_error",
            Self::UserCancelled => "user_cancelled",
            Self::InvalidUrl(_) => "invalid_url",
            Self::SessionBusy => "session_busy",
            Self::SuspendUnsupported => "suspend_unsupported",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Http(format!("request timed out: {}", e));
        }
        Self::Http(e.to_string())
    }
}

impl From<serde_json::Error> for DownloadError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidOutput(format!("Invalid JSON: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(DownloadError::Timeout(Duration::from_secs(60)).kind(), "timeout");
        assert_eq!(DownloadError::ToolError("x".into()).kind(), "tool_error");
        assert_eq!(DownloadError::Http("x".into()).kind(), "io_error");
        assert_eq!(
            DownloadError::InvalidQualityIndex { index: 4, len: 2 }.kind(),
            "invalid_quality_index"
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = DownloadError::Timeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "Timed out after 60s");
    }

    #[test]
    fn test_json_error_is_invalid_output() {
        let err: DownloadError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "invalid_output");
    }
}
