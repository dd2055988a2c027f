// yt-dlp acquisition backend
//
// Downloads one video's audio track to `{stem}.mp3` plus its thumbnail,
// transcoding through yt-dlp's ffmpeg postprocessors. Availability is
// re-verified immediately before transfer: a candidate can vanish between
// the selection probe and the download.

use std::path::Path;

use async_trait::async_trait;
use log::{info, warn};

use super::errors::BackendError;
use super::models::DownloadOptions;
use super::traits::AcquisitionBackend;
use super::utils::{find_ytdlp, run_output_with_timeout, ytdlp_version};

/// Hard ceiling for one transfer; a stuck download should not wedge the
/// polling loop forever.
const TRANSFER_TIMEOUT_SECS: u64 = 3600;
const PREFLIGHT_TIMEOUT_SECS: u64 = 60;

pub struct YtDlpAcquisition {
    ytdlp_path: String,
}

impl YtDlpAcquisition {
    pub fn new() -> Self {
        Self {
            ytdlp_path: find_ytdlp(),
        }
    }

    fn build_args(video_id: &str, stem: &Path, options: &DownloadOptions) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            options.format.clone(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            "30".to_string(),
            "--retries".to_string(),
            "5".to_string(),
            "-x".to_string(),
            "--audio-format".to_string(),
            options.audio_codec.clone(),
            "--audio-quality".to_string(),
            options.audio_quality.clone(),
            "--write-thumbnail".to_string(),
            "--convert-thumbnails".to_string(),
            options.thumbnail_format.clone(),
            "-o".to_string(),
            format!("{}.%(ext)s", stem.display()),
        ];

        if options.write_subtitles {
            args.push("--write-subs".to_string());
        }
        if options.write_automatic_subtitles {
            args.push("--write-auto-subs".to_string());
        }

        args.push(format!("https://www.youtube.com/watch?v={}", video_id));
        args
    }

    /// Metadata-only recheck right before the transfer.
    async fn preflight(&self, video_id: &str) -> Result<(), BackendError> {
        let args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            "15".to_string(),
            format!("https://www.youtube.com/watch?v={}", video_id),
        ];

        let output = run_output_with_timeout(&self.ytdlp_path, args, PREFLIGHT_TIMEOUT_SECS)
            .await
            .map_err(BackendError::ExecutionError)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::from(stderr.to_string()));
        }
        Ok(())
    }

    /// Drop any `.part` leftovers so a failed transfer leaves no partial
    /// artifact behind.
    fn cleanup_partials(stem: &Path) {
        let Some(dir) = stem.parent() else { return };
        let Some(stem_name) = stem.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        let Ok(entries) = std::fs::read_dir(dir) else { return };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(stem_name) && name.ends_with(".part") {
                if let Err(e) = std::fs::remove_file(entry.path()) {
                    warn!("[YtDlpAcquisition] Could not remove partial {}: {}", name, e);
                }
            }
        }
    }
}

impl Default for YtDlpAcquisition {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AcquisitionBackend for YtDlpAcquisition {
    fn name(&self) -> &'static str {
        "yt-dlp-acquisition"
    }

    fn is_available(&self) -> bool {
        ytdlp_version(&self.ytdlp_path).is_some()
    }

    async fn acquire(
        &self,
        video_id: &str,
        stem: &Path,
        options: &DownloadOptions,
    ) -> Result<(), BackendError> {
        self.preflight(video_id).await?;

        let args = Self::build_args(video_id, stem, options);
        info!("[YtDlpAcquisition] Downloading {} -> {}.mp3", video_id, stem.display());

        let result = run_output_with_timeout(&self.ytdlp_path, args, TRANSFER_TIMEOUT_SECS)
            .await
            .map_err(BackendError::ExecutionError)?;

        if !result.status.success() {
            Self::cleanup_partials(stem);
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(BackendError::from(stderr.to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_build_args_shape() {
        let stem = PathBuf::from("data/news/00aabb");
        let args = YtDlpAcquisition::build_args("vid01", &stem, &DownloadOptions::default());

        assert!(args.contains(&"-x".to_string()));
        assert!(args.contains(&"--write-thumbnail".to_string()));
        assert!(args.contains(&"data/news/00aabb.%(ext)s".to_string()));
        assert_eq!(
            args.last().map(String::as_str),
            Some("https://www.youtube.com/watch?v=vid01")
        );
        // Subtitles are off by default
        assert!(!args.contains(&"--write-subs".to_string()));
    }

    #[test]
    fn test_build_args_subtitle_flags() {
        let stem = PathBuf::from("data/news/00aabb");
        let options = DownloadOptions {
            write_subtitles: true,
            write_automatic_subtitles: true,
            ..DownloadOptions::default()
        };
        let args = YtDlpAcquisition::build_args("vid01", &stem, &options);
        assert!(args.contains(&"--write-subs".to_string()));
        assert!(args.contains(&"--write-auto-subs".to_string()));
    }

    #[test]
    fn test_cleanup_partials_removes_only_matching() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("feedcafe");

        let partial = dir.path().join("feedcafe.webm.part");
        let unrelated = dir.path().join("other.webm.part");
        let finished = dir.path().join("feedcafe.mp3");
        std::fs::write(&partial, b"x").unwrap();
        std::fs::write(&unrelated, b"x").unwrap();
        std::fs::write(&finished, b"x").unwrap();

        YtDlpAcquisition::cleanup_partials(&stem);

        assert!(!partial.exists());
        assert!(unrelated.exists());
        assert!(finished.exists());
    }
}
