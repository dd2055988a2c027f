// yt-dlp metadata backend
//
// Resolves source listings and probes individual videos through the native
// yt-dlp binary. Listings are bounded at the backend level with
// --playlist-end, which keeps channel/playlist resolution cheap: yt-dlp
// stops extracting once the bound is reached.

use async_trait::async_trait;
use log::{debug, warn};

use super::diagnostics::{classify_unavailable, UnavailableReason};
use super::traits::{MetadataBackend, MetadataConfig, ProbeOutcome, SourceListing};
use crate::downloader::errors::BackendError;
use crate::downloader::models::VideoCandidate;
use crate::downloader::utils::{find_ytdlp, run_output_with_timeout, ytdlp_version};

pub struct YtDlpMetadata {
    ytdlp_path: String,
    config: MetadataConfig,
}

impl YtDlpMetadata {
    pub fn new(config: MetadataConfig) -> Self {
        Self {
            ytdlp_path: find_ytdlp(),
            config,
        }
    }

    /// Shared flags for every metadata invocation
    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.config.timeout_seconds.to_string(),
            "--retries".to_string(),
            self.config.retries.to_string(),
        ];

        if let Some(client) = &self.config.player_client {
            args.push("--extractor-args".to_string());
            args.push(format!("youtube:player_client={}", client));
        }

        args
    }

    fn listing_args(&self, url: &str, limit: usize) -> Vec<String> {
        let mut args = self.base_args();
        args.push("--ignore-errors".to_string());
        args.push("--playlist-end".to_string());
        args.push(limit.to_string());
        args.push(url.to_string());
        args
    }

    fn single_args(&self, video_id: &str) -> Vec<String> {
        let mut args = self.base_args();
        args.push("--no-playlist".to_string());
        args.push(format!("https://www.youtube.com/watch?v={}", video_id));
        args
    }

    /// Parse one --dump-json object into a candidate. Entries without an id
    /// are useless downstream and are dropped.
    fn parse_candidate(json: &serde_json::Value) -> Option<VideoCandidate> {
        let id = json["id"].as_str()?;
        if id.is_empty() {
            return None;
        }

        let upload_date = json["upload_date"]
            .as_str()
            .filter(|d| d.len() == 8 && d.bytes().all(|b| b.is_ascii_digit()))
            .map(String::from);

        Some(VideoCandidate {
            id: id.to_string(),
            title: json["title"].as_str().unwrap_or("Untitled").to_string(),
            uploader: json["uploader"].as_str().unwrap_or("Unknown").to_string(),
            duration_seconds: json["duration"].as_f64().map(|d| d as u64),
            view_count: json["view_count"].as_u64(),
            upload_date,
            timestamp: json["timestamp"].as_i64(),
            playlist_position: json["playlist_index"].as_u64().map(|p| p as u32),
        })
    }

    /// yt-dlp emits one JSON object per line when a URL expands to multiple
    /// entries. The listing's aggregate title/uploader come from the last
    /// entry's playlist fields.
    fn parse_listing(stdout: &[u8]) -> Result<SourceListing, BackendError> {
        let text = String::from_utf8_lossy(stdout);
        let mut listing = SourceListing::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let json: serde_json::Value = serde_json::from_str(line)
                .map_err(|e| BackendError::ParseError(format!("Invalid JSON entry: {}", e)))?;

            if listing.title.is_none() {
                listing.title = json["playlist_title"].as_str().map(String::from);
            }
            if listing.uploader.is_none() {
                listing.uploader = json["playlist_uploader"]
                    .as_str()
                    .or_else(|| json["channel"].as_str())
                    .map(String::from);
            }

            if let Some(candidate) = Self::parse_candidate(&json) {
                listing.candidates.push(candidate);
            }
        }

        Ok(listing)
    }

    async fn run_single(&self, video_id: &str) -> Result<VideoCandidate, BackendError> {
        let args = self.single_args(video_id);
        debug!("[YtDlpMetadata] Running: {} {}", self.ytdlp_path, args.join(" "));

        // Let yt-dlp finish its own retries before we kill the process
        let process_timeout = self.config.timeout_seconds as u64 * (self.config.retries as u64 + 1);
        let output = run_output_with_timeout(&self.ytdlp_path, args, process_timeout)
            .await
            .map_err(BackendError::ExecutionError)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::from(stderr.to_string()));
        }

        let json: serde_json::Value =
            serde_json::from_slice(&output.stdout)
                .map_err(|e| BackendError::ParseError(format!("Invalid JSON: {}", e)))?;

        Self::parse_candidate(&json)
            .ok_or_else(|| BackendError::ParseError("Video JSON carried no id".to_string()))
    }
}

impl Default for YtDlpMetadata {
    fn default() -> Self {
        Self::new(MetadataConfig::default())
    }
}

#[async_trait]
impl MetadataBackend for YtDlpMetadata {
    fn name(&self) -> &'static str {
        "yt-dlp-metadata"
    }

    fn is_available(&self) -> bool {
        ytdlp_version(&self.ytdlp_path).is_some()
    }

    async fn resolve(&self, url: &str, limit: usize) -> Result<SourceListing, BackendError> {
        let args = self.listing_args(url, limit.max(1));
        debug!("[YtDlpMetadata] Resolving: {} {}", self.ytdlp_path, args.join(" "));

        // Listings walk `limit` entries; give each one its own timeout slice
        let process_timeout = self.config.timeout_seconds as u64 * (limit.max(1) as u64 + 1);
        let output = run_output_with_timeout(&self.ytdlp_path, args, process_timeout)
            .await
            .map_err(BackendError::ExecutionError)?;

        // --ignore-errors makes yt-dlp exit nonzero when any entry failed,
        // even if others extracted fine. Use whatever came through.
        if !output.status.success() && output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::from(stderr.to_string()));
        }

        Self::parse_listing(&output.stdout)
    }

    async fn probe(&self, video_id: &str) -> Result<ProbeOutcome, BackendError> {
        match self.run_single(video_id).await {
            Ok(candidate) if !candidate.title.is_empty() => Ok(ProbeOutcome::Present),
            Ok(_) => Ok(ProbeOutcome::Absent(UnavailableReason::Unknown)),
            Err(BackendError::ExecutionError(e)) => Err(BackendError::ExecutionError(e)),
            Err(BackendError::ToolNotFound(e)) => Err(BackendError::ToolNotFound(e)),
            Err(other) => {
                let reason = classify_unavailable(&other.to_string())
                    .unwrap_or(UnavailableReason::Unknown);
                warn!(
                    "[YtDlpMetadata] Probe {} unavailable: {}",
                    video_id,
                    reason.description()
                );
                Ok(ProbeOutcome::Absent(reason))
            }
        }
    }

    async fn fetch_full(&self, video_id: &str) -> Result<VideoCandidate, BackendError> {
        self.run_single(video_id).await
    }
}
