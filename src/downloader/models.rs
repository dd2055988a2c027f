// Common data models for the pipeline

use std::cmp::Ordering;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One video discovered in a source's listing. Transient: produced fresh on
/// every poll, never persisted — only its downloaded artifact survives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCandidate {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration_seconds: Option<u64>,
    pub view_count: Option<u64>,
    /// Coarse upload date as reported by the platform (YYYYMMDD)
    pub upload_date: Option<String>,
    /// Fine-grained upload time (unix seconds); 0 is treated as absent
    pub timestamp: Option<i64>,
    /// Position within the playlist, playlist sources only
    pub playlist_position: Option<u32>,
}

impl VideoCandidate {
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }

    /// Timestamp usable as a sort key; the platform reports 0 for unknown.
    pub fn sort_timestamp(&self) -> Option<i64> {
        match self.timestamp {
            Some(ts) if ts > 0 => Some(ts),
            _ => None,
        }
    }

    /// Upload date formatted YYYY-MM-DD for display, when known.
    pub fn formatted_upload_date(&self) -> Option<String> {
        self.upload_date.as_deref().and_then(|d| {
            if d.len() == 8 {
                Some(format!("{}-{}-{}", &d[..4], &d[4..6], &d[6..8]))
            } else {
                None
            }
        })
    }
}

/// Newest-first ordering: fine-grained timestamps win when both sides have
/// one; otherwise fall back to comparing the coarse date strings.
pub fn newest_first(a: &VideoCandidate, b: &VideoCandidate) -> Ordering {
    match (a.sort_timestamp(), b.sort_timestamp()) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        _ => b
            .upload_date
            .as_deref()
            .unwrap_or("")
            .cmp(a.upload_date.as_deref().unwrap_or("")),
    }
}

/// The downloaded file pair for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub fingerprint: String,
    pub audio_path: PathBuf,
    pub thumbnail_path: PathBuf,
}

/// Options handed to the acquisition backend, sourced from the `download`
/// section of the configuration.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub format: String,
    pub audio_codec: String,
    pub audio_quality: String,
    pub thumbnail_format: String,
    pub write_subtitles: bool,
    pub write_automatic_subtitles: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            format: "bestaudio/best".to_string(),
            audio_codec: "mp3".to_string(),
            audio_quality: "192".to_string(),
            thumbnail_format: "webp".to_string(),
            write_subtitles: false,
            write_automatic_subtitles: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, timestamp: Option<i64>, upload_date: Option<&str>) -> VideoCandidate {
        VideoCandidate {
            id: id.to_string(),
            title: format!("video {}", id),
            uploader: "uploader".to_string(),
            duration_seconds: None,
            view_count: None,
            upload_date: upload_date.map(String::from),
            timestamp,
            playlist_position: None,
        }
    }

    #[test]
    fn test_newest_first_by_timestamp() {
        let older = candidate("a", Some(1_700_000_000), Some("20231114"));
        let newer = candidate("b", Some(1_710_000_000), Some("20240309"));
        assert_eq!(newest_first(&newer, &older), Ordering::Less);
        assert_eq!(newest_first(&older, &newer), Ordering::Greater);
    }

    #[test]
    fn test_newest_first_date_fallback_when_timestamp_missing() {
        let older = candidate("a", None, Some("20240101"));
        let newer = candidate("b", Some(0), Some("20240601"));
        assert_eq!(newest_first(&newer, &older), Ordering::Less);
    }

    #[test]
    fn test_zero_timestamp_treated_as_absent() {
        let c = candidate("a", Some(0), None);
        assert_eq!(c.sort_timestamp(), None);
    }

    #[test]
    fn test_sort_newest_first() {
        let mut list = vec![
            candidate("oldest", Some(100), None),
            candidate("newest", Some(300), None),
            candidate("middle", Some(200), None),
        ];
        list.sort_by(newest_first);
        let ids: Vec<&str> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["newest", "middle", "oldest"]);
    }

    #[test]
    fn test_watch_url() {
        let c = candidate("dQw4w9WgXcQ", None, None);
        assert_eq!(c.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn test_formatted_upload_date() {
        let c = candidate("a", None, Some("20241201"));
        assert_eq!(c.formatted_upload_date().as_deref(), Some("2024-12-01"));
        let bad = candidate("b", None, Some("dec 1"));
        assert_eq!(bad.formatted_upload_date(), None);
    }
}
