// Common data models for the downloader

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// One encoding/container variant as listed by yt-dlp's `formats` array
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Format ID (e.g., "137", "140")
    #[serde(default)]
    pub format_id: String,
    /// File extension (mp4, webm, m4a)
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default, deserialize_with = "lossy_u32")]
    pub width: Option<u32>,
    #[serde(default, deserialize_with = "lossy_u32")]
    pub height: Option<u32>,
    /// Video codec, "none" when absent
    #[serde(default)]
    pub vcodec: Option<String>,
    /// Audio codec, "none" when absent
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default, deserialize_with = "lossy_u64")]
    pub filesize: Option<u64>,
    #[serde(default, deserialize_with = "lossy_u64")]
    pub filesize_approx: Option<u64>,
    /// Audio bitrate in kbps
    #[serde(default)]
    pub abr: Option<f64>,
    /// Direct media URL
    #[serde(default)]
    pub url: Option<String>,
}

impl FormatDescriptor {
    /// Exact size, else approximate, else 0
    pub fn effective_size(&self) -> u64 {
        self.filesize
            .filter(|s| *s > 0)
            .or(self.filesize_approx)
            .unwrap_or(0)
    }

    pub fn has_video(&self) -> bool {
        codec_present(self.vcodec.as_deref())
    }

    pub fn has_audio(&self) -> bool {
        codec_present(self.acodec.as_deref())
    }

    pub fn has_source_url(&self) -> bool {
        self.url.as_deref().map_or(false, |u| !u.trim().is_empty())
    }

    pub fn height_or_zero(&self) -> u32 {
        self.height.unwrap_or(0)
    }

    pub fn bitrate_or_zero(&self) -> f64 {
        self.abr.filter(|b| b.is_finite()).unwrap_or(0.0)
    }

    pub fn ext_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.ext.as_deref().filter(|e| !e.is_empty()).unwrap_or(fallback)
    }
}

fn codec_present(codec: Option<&str>) -> bool {
    codec.map_or(false, |c| !c.is_empty() && c != "none")
}

/// yt-dlp occasionally emits sizes as floats (`1234.0`) or null
fn lossy_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    }))
}

fn lossy_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lossy_u64(deserializer)?.and_then(|v| u32::try_from(v).ok()))
}

/// Media metadata from `--dump-json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub uploader: Option<String>,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub formats: Vec<FormatDescriptor>,
}

/// How a quality option maps onto yt-dlp streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCategory {
    /// Single stream carrying video and audio
    Combined,
    /// Video-only stream merged with the best audio-only stream
    SeparatePair,
    AudioOnly,
}

/// Display-ready, ranked download choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityOption {
    /// Display label (e.g., "1080p (1920x1080) - 95.4 MB [mp4]")
    pub label: String,
    /// Resolution height, 0 for audio-only
    pub height: u32,
    pub ext: String,
    /// Estimated total size in bytes
    pub filesize: u64,
    pub category: QualityCategory,
    /// Value for `-f`, possibly "video_id+audio_id"
    pub selector: String,
}

/// Ranked options tagged with the request they were derived from
#[derive(Debug, Clone)]
pub struct QualitySnapshot {
    /// Monotonic per controller
    pub generation: u64,
    pub url: String,
    pub info: MediaInfo,
    pub options: Vec<QualityOption>,
}

impl QualitySnapshot {
    pub fn matches(&self, url: &str) -> bool {
        self.url.trim() == url.trim()
    }
}

/// Parameters of a monitored download
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    /// Position in the snapshot's option list
    pub quality_index: usize,
    /// Existing, writable directory
    pub destination: PathBuf,
    /// Snapshot generation the index refers to; unchecked when `None`
    pub generation: Option<u64>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, quality_index: usize, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            quality_index,
            destination: destination.into(),
            generation: None,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }
}

/// Download progress information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub percent: f32,
    pub status: String,
}
