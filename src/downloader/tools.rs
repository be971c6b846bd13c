// Locating, probing and installing the media tool

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::config::DownloaderConfig;
use super::errors::DownloadError;
use super::utils::run_output_with_timeout;

const TOOL_BINARY: &str = "yt-dlp";

/// Availability report for the media tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

pub struct ToolManager {
    config: DownloaderConfig,
    resolved: OnceCell<PathBuf>,
}

impl ToolManager {
    pub fn new(config: DownloaderConfig) -> Self {
        Self {
            config,
            resolved: OnceCell::new(),
        }
    }

    /// `ensure_available`, remembered after the first success
    pub async fn resolve(&self) -> Result<PathBuf, DownloadError> {
        self.resolved
            .get_or_try_init(|| self.ensure_available())
            .await
            .cloned()
    }

    /// Best guess at the executable: configured path, common install dirs, then PATH lookup
    pub async fn locate(&self) -> PathBuf {
        if let Some(path) = &self.config.tool_path {
            return path.clone();
        }

        let binary = if cfg!(windows) { "yt-dlp.exe" } else { TOOL_BINARY };
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary),
            format!("/usr/local/bin/{}", binary),
            format!("/usr/bin/{}", binary),
        ];
        for path in common_paths {
            if Path::new(&path).exists() {
                return PathBuf::from(path);
            }
        }

        let lookup = if cfg!(windows) { "where" } else { "which" };
        if let Ok(output) = run_output_with_timeout(
            OsStr::new(lookup),
            &[TOOL_BINARY.to_string()],
            self.config.version_probe_timeout,
        )
        .await
        {
            if output.status.success() {
                let found = String::from_utf8_lossy(&output.stdout);
                if let Some(first) = found.lines().map(str::trim).find(|l| !l.is_empty()) {
                    return PathBuf::from(first);
                }
            }
        }

        // Last resort: hope it's in PATH
        PathBuf::from(binary)
    }

    /// `--version` output, `None` when the probe fails or times out
    pub async fn version(&self, path: &Path) -> Option<String> {
        match run_output_with_timeout(
            path.as_os_str(),
            &["--version".to_string()],
            self.config.version_probe_timeout,
        )
        .await
        {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Some(version).filter(|v| !v.is_empty())
            }
            _ => None,
        }
    }

    pub async fn tool_info(&self) -> ToolInfo {
        let path = self.locate().await;
        let version = self.version(&path).await;
        ToolInfo {
            name: TOOL_BINARY.to_string(),
            is_available: version.is_some(),
            path: Some(path.to_string_lossy().to_string()),
            version,
        }
    }

    /// Working executable, installing it through pip when allowed
    pub async fn ensure_available(&self) -> Result<PathBuf, DownloadError> {
        let path = self.locate().await;
        if let Some(version) = self.version(&path).await {
            info!("[ToolManager] yt-dlp {} at {}", version, path.display());
            return Ok(path);
        }

        if !self.config.auto_install || self.config.tool_path.is_some() {
            return Err(DownloadError::ToolUnavailable(format!(
                "{} did not answer --version",
                path.display()
            )));
        }

        self.install().await?;

        let path = self.locate().await;
        match self.version(&path).await {
            Some(version) => {
                info!("[ToolManager] Installed yt-dlp {}", version);
                Ok(path)
            }
            None => Err(DownloadError::ToolUnavailable(
                "yt-dlp still missing after install attempt".to_string(),
            )),
        }
    }

    async fn install(&self) -> Result<(), DownloadError> {
        info!("[ToolManager] Installing yt-dlp with {} -m pip", self.config.python);
        let args = vec![
            "-m".to_string(),
            "pip".to_string(),
            "install".to_string(),
            "-U".to_string(),
            TOOL_BINARY.to_string(),
        ];

        let output = run_output_with_timeout(
            OsStr::new(&self.config.python),
            &args,
            self.config.install_timeout,
        )
        .await
        .map_err(|e| DownloadError::ToolUnavailable(format!("install failed: {}", e)))?;

        if output.status.success() {
            Ok(())
        } else {
            let error = String::from_utf8_lossy(&output.stderr);
            warn!("[ToolManager] pip install failed: {}", error.trim());
            Err(DownloadError::ToolUnavailable(format!(
                "install failed: {}",
                error.trim()
            )))
        }
    }
}
