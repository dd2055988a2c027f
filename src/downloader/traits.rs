// Acquisition backend trait definition

use std::path::Path;

use async_trait::async_trait;

use super::errors::BackendError;
use super::models::DownloadOptions;

/// Trait for the media acquisition backend: given a video id and an output
/// filename stem, produce `{stem}.mp3` plus `{stem}.<thumbnail-ext>` on disk.
#[async_trait]
pub trait AcquisitionBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Check if this backend can run on this system
    fn is_available(&self) -> bool;

    /// Download and transcode one video's audio to `{stem}.mp3`.
    ///
    /// Implementations re-verify availability immediately before transfer;
    /// a video can disappear between the probe and the download.
    async fn acquire(
        &self,
        video_id: &str,
        stem: &Path,
        options: &DownloadOptions,
    ) -> Result<(), BackendError>;
}
