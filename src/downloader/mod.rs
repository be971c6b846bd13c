// Downloader module - session controller over yt-dlp plus a plain HTTP path

pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod errors;
pub mod extractor;
pub mod format_selector;
pub mod formatting;
pub mod models;
pub mod process;
pub mod progress;
pub mod session;
pub mod tools;
pub mod traits;
pub mod utils;
pub mod validation;

pub use config::DownloaderConfig;
pub use controller::DownloadController;
pub use diagnostics::FailureHint;
pub use errors::DownloadError;
pub use extractor::YtDlpExtractor;
pub use format_selector::{FormatSelector, QualityPreset};
pub use models::{
    DownloadProgress, DownloadRequest, FormatDescriptor, MediaInfo, QualityCategory, QualityOption,
    QualitySnapshot,
};
pub use process::{ProcessControl, ProcessFactory};
pub use progress::{parse_progress_line, ProgressEvent};
pub use session::SessionPhase;
pub use tools::{ToolInfo, ToolManager};
pub use traits::{CallbackReporter, InfoExtractor, NoopReporter, ProgressReporter};
