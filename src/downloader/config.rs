// Controller configuration

use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by the extractor, the tool manager and the controller
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Explicit media tool executable; located automatically when unset
    pub tool_path: Option<PathBuf>,
    /// Budget for `--dump-json`
    pub info_timeout: Duration,
    /// Budget for downloads started with a raw selector token
    pub selector_timeout: Duration,
    /// Wait between graceful and forced termination on cancel
    pub cancel_grace: Duration,
    /// Budget for the `--version` probe
    pub version_probe_timeout: Duration,
    /// Budget for the `pip install` attempt
    pub install_timeout: Duration,
    /// Forwarded as `--socket-timeout`
    pub socket_timeout: Option<u32>,
    /// SOCKS5/HTTP proxy URL for the tool and the HTTP client
    pub proxy: Option<String>,
    /// Honor `HTTP_PROXY`-style variables when no explicit proxy is set
    pub use_system_proxy: bool,
    /// Container used when a video-only and an audio-only stream get merged
    pub merge_output_format: String,
    /// Upper bound of the derived output file name
    pub max_title_len: usize,
    /// Write buffer for plain-file downloads
    pub chunk_size: usize,
    /// Try `pip install yt-dlp` when the tool is missing
    pub auto_install: bool,
    /// Interpreter used for the install attempt
    pub python: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            tool_path: None,
            info_timeout: Duration::from_secs(60),
            selector_timeout: Duration::from_secs(300),
            cancel_grace: Duration::from_secs(5),
            version_probe_timeout: Duration::from_secs(10),
            install_timeout: Duration::from_secs(300),
            socket_timeout: None,
            proxy: None,
            use_system_proxy: true,
            merge_output_format: "mp4".to_string(),
            max_title_len: 100,
            chunk_size: 8192,
            auto_install: true,
            python: "python3".to_string(),
        }
    }
}

impl DownloaderConfig {
    /// Defaults overlaid with `VIDEO_DOWNLOADER_*` environment variables.
    ///
    /// Example: `export VIDEO_DOWNLOADER_PYTHON="/path/to/venv/bin/python"`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("VIDEO_DOWNLOADER_TOOL") {
            if !path.trim().is_empty() {
                config.tool_path = Some(PathBuf::from(path.trim()));
            }
        }
        if let Ok(proxy) = std::env::var("VIDEO_DOWNLOADER_PROXY") {
            if !proxy.trim().is_empty() {
                config.proxy = Some(proxy.trim().to_string());
            }
        }
        if let Ok(python) = std::env::var("VIDEO_DOWNLOADER_PYTHON") {
            if !python.trim().is_empty() {
                config.python = python.trim().to_string();
            }
        }
        config
    }

    pub fn with_tool_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tool_path = Some(path.into());
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_system_proxy(mut self, enabled: bool) -> Self {
        self.use_system_proxy = enabled;
        self
    }

    pub fn with_info_timeout(mut self, timeout: Duration) -> Self {
        self.info_timeout = timeout;
        self
    }

    pub fn with_selector_timeout(mut self, timeout: Duration) -> Self {
        self.selector_timeout = timeout;
        self
    }

    pub fn with_install_timeout(mut self, timeout: Duration) -> Self {
        self.install_timeout = timeout;
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    pub fn with_socket_timeout(mut self, seconds: Option<u32>) -> Self {
        self.socket_timeout = seconds;
        self
    }

    pub fn with_auto_install(mut self, enabled: bool) -> Self {
        self.auto_install = enabled;
        self
    }

    pub fn with_max_title_len(mut self, len: usize) -> Self {
        self.max_title_len = len;
        self
    }
}
