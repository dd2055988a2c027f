// Video directory resolution - one implementation per source kind
//
// CHANNEL and PLAYLIST sources need different URL handling, so each kind
// gets its own VideoDirectory implementation instead of branching on a tag
// at every call site. Both bound the fetch at the backend level and re-sort
// the result newest-first; the platform does not always return candidates
// in upload order.

use async_trait::async_trait;
use log::{info, warn};

use crate::config::{Source, SourceKind};
use crate::downloader::models::{newest_first, VideoCandidate};
use crate::metadata::MetadataBackend;

#[async_trait]
pub trait VideoDirectory: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Newest-first candidate list, bounded by the source's look-back count.
    /// Resolution failures are logged and yield an empty list; a source with
    /// no candidates this cycle is a recoverable condition, not an error.
    async fn list_candidates(&self, backend: &dyn MetadataBackend) -> Vec<VideoCandidate>;

    /// Only the single newest entry, without building the full list.
    async fn latest_candidate(&self, backend: &dyn MetadataBackend) -> Option<VideoCandidate>;
}

/// Select the directory implementation for a configured source.
pub fn directory_for(source: &Source) -> Box<dyn VideoDirectory> {
    match source.kind {
        SourceKind::Channel => Box::new(ChannelDirectory::new(source)),
        SourceKind::Playlist => Box::new(PlaylistDirectory::new(source)),
    }
}

async fn bounded_fetch(
    backend: &dyn MetadataBackend,
    url: &str,
    limit: usize,
) -> Vec<VideoCandidate> {
    match backend.resolve(url, limit).await {
        Ok(listing) => {
            let mut candidates = listing.candidates;
            candidates.sort_by(newest_first);
            info!("[Resolver] {} candidates from {}", candidates.len(), url);
            candidates
        }
        Err(e) => {
            warn!("[Resolver] Could not resolve {}: {}", url, e);
            Vec::new()
        }
    }
}

pub struct ChannelDirectory {
    url: String,
    look_back: usize,
}

impl ChannelDirectory {
    pub fn new(source: &Source) -> Self {
        Self {
            url: source.url.clone(),
            look_back: source.look_back_count,
        }
    }

    /// Channel pages expand to every tab (shorts, streams, ...); the uploads
    /// tab keeps the listing to regular uploads.
    fn uploads_url(&self) -> String {
        if self.url.ends_with("/videos") {
            self.url.clone()
        } else {
            format!("{}/videos", self.url.trim_end_matches('/'))
        }
    }
}

#[async_trait]
impl VideoDirectory for ChannelDirectory {
    fn kind(&self) -> SourceKind {
        SourceKind::Channel
    }

    async fn list_candidates(&self, backend: &dyn MetadataBackend) -> Vec<VideoCandidate> {
        bounded_fetch(backend, &self.uploads_url(), self.look_back).await
    }

    async fn latest_candidate(&self, backend: &dyn MetadataBackend) -> Option<VideoCandidate> {
        bounded_fetch(backend, &self.uploads_url(), 1).await.into_iter().next()
    }
}

pub struct PlaylistDirectory {
    url: String,
    look_back: usize,
}

impl PlaylistDirectory {
    pub fn new(source: &Source) -> Self {
        Self {
            url: source.url.clone(),
            look_back: source.look_back_count,
        }
    }
}

#[async_trait]
impl VideoDirectory for PlaylistDirectory {
    fn kind(&self) -> SourceKind {
        SourceKind::Playlist
    }

    async fn list_candidates(&self, backend: &dyn MetadataBackend) -> Vec<VideoCandidate> {
        bounded_fetch(backend, &self.url, self.look_back).await
    }

    async fn latest_candidate(&self, backend: &dyn MetadataBackend) -> Option<VideoCandidate> {
        bounded_fetch(backend, &self.url, 1).await.into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CATEGORY;
    use crate::testing::{make_candidate, ScriptedMetadata};
    use std::sync::atomic::Ordering;

    fn source(kind: SourceKind, url: &str, look_back: usize) -> Source {
        Source {
            name: "test".to_string(),
            url: url.to_string(),
            kind,
            enabled: true,
            poll_interval_minutes: 10,
            look_back_count: look_back,
            custom_title: None,
            custom_description: None,
            category: DEFAULT_CATEGORY.to_string(),
            author: None,
        }
    }

    #[test]
    fn test_channel_uploads_url() {
        let dir = ChannelDirectory::new(&source(
            SourceKind::Channel,
            "https://www.youtube.com/@varlamov",
            5,
        ));
        assert_eq!(dir.uploads_url(), "https://www.youtube.com/@varlamov/videos");

        let already = ChannelDirectory::new(&source(
            SourceKind::Channel,
            "https://www.youtube.com/@varlamov/videos",
            5,
        ));
        assert_eq!(already.uploads_url(), "https://www.youtube.com/@varlamov/videos");
    }

    #[tokio::test]
    async fn test_list_sorts_newest_first() {
        let backend = ScriptedMetadata::new(vec![
            make_candidate("old", "old video", 100),
            make_candidate("new", "new video", 300),
            make_candidate("mid", "mid video", 200),
        ]);
        let dir = directory_for(&source(SourceKind::Playlist, "https://pl", 5));

        let list = dir.list_candidates(&backend).await;
        let ids: Vec<&str> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_list_is_bounded_at_backend_level() {
        let backend = ScriptedMetadata::new(vec![
            make_candidate("a", "a", 300),
            make_candidate("b", "b", 200),
            make_candidate("c", "c", 100),
        ]);
        let dir = directory_for(&source(SourceKind::Playlist, "https://pl", 2));

        let list = dir.list_candidates(&backend).await;
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn test_resolution_failure_yields_empty() {
        let backend = ScriptedMetadata::new(vec![]).with_failing_resolve();
        let dir = directory_for(&source(SourceKind::Channel, "https://ch", 5));

        assert!(dir.list_candidates(&backend).await.is_empty());
        assert!(dir.latest_candidate(&backend).await.is_none());
    }

    #[tokio::test]
    async fn test_latest_candidate_fetches_single_entry() {
        let backend = ScriptedMetadata::new(vec![
            make_candidate("head", "head video", 300),
            make_candidate("tail", "tail video", 200),
        ]);
        let dir = directory_for(&source(SourceKind::Playlist, "https://pl", 5));

        let latest = dir.latest_candidate(&backend).await.unwrap();
        assert_eq!(latest.id, "head");
        assert_eq!(backend.resolve_calls.load(Ordering::SeqCst), 1);
    }
}
