// MetadataBackend trait and common types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::diagnostics::UnavailableReason;
use crate::downloader::errors::BackendError;
use crate::downloader::models::VideoCandidate;

/// Configuration for metadata extraction
#[derive(Debug, Clone)]
pub struct MetadataConfig {
    /// Socket timeout per request, seconds
    pub timeout_seconds: u32,

    /// yt-dlp retry count per request
    pub retries: u32,

    /// YouTube player client override (web, android, tv)
    pub player_client: Option<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retries: 2,
            player_client: None,
        }
    }
}

impl MetadataConfig {
    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_player_client(mut self, client: Option<String>) -> Self {
        self.player_client = client;
        self
    }
}

/// Result of resolving a source URL: the candidates plus whatever aggregate
/// metadata the platform reported for the listing itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceListing {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub candidates: Vec<VideoCandidate>,
}

/// Outcome of a metadata-only availability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Present,
    Absent(UnavailableReason),
}

impl ProbeOutcome {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }
}

/// Trait for the video-metadata/extraction backend
#[async_trait]
pub trait MetadataBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Check if this backend can run on this system
    fn is_available(&self) -> bool;

    /// Resolve a source URL to its newest entries, bounded to `limit`
    /// at the backend level.
    async fn resolve(&self, url: &str, limit: usize) -> Result<SourceListing, BackendError>;

    /// Metadata-only availability probe for a single video. Idempotent,
    /// side-effect free on success.
    async fn probe(&self, video_id: &str) -> Result<ProbeOutcome, BackendError>;

    /// Full metadata for a single video, used for exhaustion diagnostics
    /// and for pre-flight rechecks.
    async fn fetch_full(&self, video_id: &str) -> Result<VideoCandidate, BackendError>;
}
