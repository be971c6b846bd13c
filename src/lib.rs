//! Media download controller.
//!
//! Fetches metadata through yt-dlp, ranks the available formats into quality
//! options, and runs one monitored download at a time with pause, resume and
//! cancel. Non-media URLs go through a streaming HTTP path instead.
//!
//! The library never installs a `tracing` subscriber; hosts do.

pub mod downloader;

pub use downloader::{
    CallbackReporter, DownloadController, DownloadError, DownloadProgress, DownloadRequest,
    DownloaderConfig, MediaInfo, NoopReporter, ProgressReporter, QualityOption, QualityPreset,
    QualitySnapshot, SessionPhase,
};
