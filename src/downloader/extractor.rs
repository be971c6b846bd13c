// Metadata extraction through `yt-dlp --dump-json`

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::config::DownloaderConfig;
use super::diagnostics::describe_failure;
use super::errors::DownloadError;
use super::models::MediaInfo;
use super::tools::ToolManager;
use super::traits::InfoExtractor;
use super::utils::{network_args, run_output_with_timeout};

/// CLI-based info extractor using the yt-dlp binary
pub struct YtDlpExtractor {
    config: DownloaderConfig,
    tools: Arc<ToolManager>,
}

impl YtDlpExtractor {
    pub fn new(config: DownloaderConfig, tools: Arc<ToolManager>) -> Self {
        Self { config, tools }
    }

    /// Build command arguments
    fn build_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(network_args(&self.config));
        args.push(url.to_string());
        args
    }
}

/// Parse the single JSON object printed by `--dump-json`
pub fn parse_media_info(stdout: &[u8]) -> Result<MediaInfo, DownloadError> {
    let json_str = String::from_utf8_lossy(stdout);
    let first_object = json_str
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with('{'))
        .ok_or_else(|| DownloadError::InvalidOutput("no JSON object in output".to_string()))?;

    let info: MediaInfo = serde_json::from_str(first_object)?;
    Ok(info)
}

#[async_trait]
impl InfoExtractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract(&self, url: &str) -> Result<MediaInfo, DownloadError> {
        let tool = self.tools.resolve().await?;
        let args = self.build_args(url);
        debug!("[Extractor] {} {}", tool.display(), args.join(" "));

        let output = run_output_with_timeout(tool.as_os_str(), &args, self.config.info_timeout).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("[Extractor] yt-dlp exited with {}: {}", output.status, stderr.trim());
            return Err(DownloadError::ToolError(describe_failure(&stderr)));
        }

        let info = parse_media_info(&output.stdout)?;
        debug!(
            "[Extractor] '{}' with {} formats",
            info.title,
            info.formats.len()
        );
        Ok(info)
    }
}
