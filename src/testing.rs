// Scripted backends shared by the unit tests. Compiled only for tests.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::downloader::errors::BackendError;
use crate::downloader::models::{DownloadOptions, VideoCandidate};
use crate::downloader::traits::AcquisitionBackend;
use crate::metadata::{
    MetadataBackend, ProbeOutcome, SourceListing, UnavailableReason,
};

/// Convenience constructor used across test modules.
pub fn make_candidate(id: &str, title: &str, timestamp: i64) -> VideoCandidate {
    VideoCandidate {
        id: id.to_string(),
        title: title.to_string(),
        uploader: "Test Channel".to_string(),
        duration_seconds: Some(1800),
        view_count: Some(1000),
        upload_date: Some("20240101".to_string()),
        timestamp: Some(timestamp),
        playlist_position: None,
    }
}

/// Metadata backend driven entirely by pre-scripted data.
pub struct ScriptedMetadata {
    listing: Mutex<SourceListing>,
    available: Mutex<HashSet<String>>,
    resolve_fails: bool,
    fetch_full_fails: bool,
    pub probe_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    pub fetch_full_calls: AtomicUsize,
}

impl ScriptedMetadata {
    pub fn new(candidates: Vec<VideoCandidate>) -> Self {
        Self {
            listing: Mutex::new(SourceListing {
                title: Some("Scripted listing".to_string()),
                uploader: Some("Test Channel".to_string()),
                candidates,
            }),
            available: Mutex::new(HashSet::new()),
            resolve_fails: false,
            fetch_full_fails: false,
            probe_calls: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
            fetch_full_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_available(self, ids: &[&str]) -> Self {
        {
            let mut available = self.available.lock().unwrap();
            for id in ids {
                available.insert(id.to_string());
            }
        }
        self
    }

    pub fn with_failing_resolve(mut self) -> Self {
        self.resolve_fails = true;
        self
    }

    pub fn with_failing_fetch_full(mut self) -> Self {
        self.fetch_full_fails = true;
        self
    }

    pub fn probes(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataBackend for ScriptedMetadata {
    fn name(&self) -> &'static str {
        "scripted-metadata"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn resolve(&self, _url: &str, limit: usize) -> Result<SourceListing, BackendError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if self.resolve_fails {
            return Err(BackendError::NetworkTimeout);
        }
        let mut listing = self.listing.lock().unwrap().clone();
        listing.candidates.truncate(limit);
        Ok(listing)
    }

    async fn probe(&self, video_id: &str) -> Result<ProbeOutcome, BackendError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.available.lock().unwrap().contains(video_id) {
            Ok(ProbeOutcome::Present)
        } else {
            Ok(ProbeOutcome::Absent(UnavailableReason::Deleted))
        }
    }

    async fn fetch_full(&self, video_id: &str) -> Result<VideoCandidate, BackendError> {
        self.fetch_full_calls.fetch_add(1, Ordering::SeqCst);
        if self.fetch_full_fails {
            return Err(BackendError::Unknown("Video unavailable".to_string()));
        }
        self.listing
            .lock()
            .unwrap()
            .candidates
            .iter()
            .find(|c| c.id == video_id)
            .cloned()
            .ok_or_else(|| BackendError::Unknown("Video unavailable".to_string()))
    }
}

/// Acquisition backend that records every call and, on success, drops the
/// file pair a real backend would have produced.
pub struct RecordingAcquisition {
    fail_with: Option<String>,
    call_count: AtomicUsize,
}

impl RecordingAcquisition {
    pub fn succeeding() -> Self {
        Self {
            fail_with: None,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcquisitionBackend for RecordingAcquisition {
    fn name(&self) -> &'static str {
        "recording-acquisition"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn acquire(
        &self,
        _video_id: &str,
        stem: &Path,
        options: &DownloadOptions,
    ) -> Result<(), BackendError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_with {
            return Err(BackendError::from(message.clone()));
        }

        let audio = stem.with_extension("mp3");
        let thumb = stem.with_extension(options.thumbnail_format.as_str());
        std::fs::write(audio, b"test mp3 content").map_err(|e| {
            BackendError::ExecutionError(format!("mock write failed: {}", e))
        })?;
        std::fs::write(thumb, b"test thumbnail content").map_err(|e| {
            BackendError::ExecutionError(format!("mock write failed: {}", e))
        })?;
        Ok(())
    }
}
