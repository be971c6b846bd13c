// Seams between the controller and its collaborators

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::{DownloadProgress, MediaInfo};

/// Receives progress and status updates, synchronously and in production order.
///
/// Front ends that need to touch UI state marshal the calls to their own thread.
pub trait ProgressReporter: Send + Sync {
    /// Percentage in 0..=100
    fn progress(&self, percent: f32);

    fn status(&self, text: &str);

    fn emit(&self, update: &DownloadProgress) {
        self.progress(update.percent);
        self.status(&update.status);
    }
}

/// Discards every update
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn progress(&self, _percent: f32) {}

    fn status(&self, _text: &str) {}
}

/// Reporter built from two closures
pub struct CallbackReporter<P, S>
where
    P: Fn(f32) + Send + Sync,
    S: Fn(&str) + Send + Sync,
{
    on_progress: P,
    on_status: S,
}

impl<P, S> CallbackReporter<P, S>
where
    P: Fn(f32) + Send + Sync,
    S: Fn(&str) + Send + Sync,
{
    pub fn new(on_progress: P, on_status: S) -> Self {
        Self {
            on_progress,
            on_status,
        }
    }
}

impl<P, S> ProgressReporter for CallbackReporter<P, S>
where
    P: Fn(f32) + Send + Sync,
    S: Fn(&str) + Send + Sync,
{
    fn progress(&self, percent: f32) {
        (self.on_progress)(percent)
    }

    fn status(&self, text: &str) {
        (self.on_status)(text)
    }
}

/// Source of structured media metadata
#[async_trait]
pub trait InfoExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Fetch metadata for a single item (no playlist expansion)
    async fn extract(&self, url: &str) -> Result<MediaInfo, DownloadError>;
}
