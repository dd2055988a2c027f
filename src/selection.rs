// Selection policy - first available candidate within the look-back window
//
// Platform-side unavailability is usually permanent for a given video, so
// instead of retrying one video we fall back across the N newest candidates
// and take the first that probes as available. When the whole window is
// exhausted, a deep diagnostic runs against the last probed candidate; the
// log is all an operator gets when a source silently stops producing.

use log::{info, warn};

use crate::downloader::models::VideoCandidate;
use crate::metadata::{error_context, MetadataBackend, ProbeOutcome};

/// Walk `candidates` (already newest-first) probing availability, bounded by
/// `look_back`. Returns the first available candidate, or None when the
/// window is exhausted.
pub async fn select_latest_available(
    backend: &dyn MetadataBackend,
    candidates: &[VideoCandidate],
    look_back: usize,
) -> Option<VideoCandidate> {
    let window = look_back.min(candidates.len());

    for (index, candidate) in candidates[..window].iter().enumerate() {
        info!(
            "[Selection] Probing candidate {}/{}: '{}'",
            index + 1,
            window,
            candidate.title
        );

        match backend.probe(&candidate.id).await {
            Ok(ProbeOutcome::Present) => {
                info!("[Selection] '{}' is available", candidate.title);
                return Some(candidate.clone());
            }
            Ok(ProbeOutcome::Absent(reason)) => {
                warn!(
                    "[Selection] '{}' unavailable: {}",
                    candidate.title,
                    reason.description()
                );
            }
            Err(e) => {
                warn!("[Selection] Probe failed for '{}': {}", candidate.title, e);
            }
        }

        if index == window - 1 {
            diagnose_last(backend, candidate).await;
        }
    }

    None
}

/// Exhaustion diagnostic: attempt a full metadata fetch for the last probed
/// candidate and log what the backend reports.
async fn diagnose_last(backend: &dyn MetadataBackend, candidate: &VideoCandidate) {
    warn!(
        "[Selection] Look-back window exhausted; diagnosing last candidate '{}' ({})",
        candidate.title,
        candidate.watch_url()
    );

    match backend.fetch_full(&candidate.id).await {
        Ok(full) => {
            // The probe said no but a full fetch succeeds: transient wobble
            warn!(
                "[Selection] Full fetch succeeded after failed probe: '{}' by {} ({} s, {} views)",
                full.title,
                full.uploader,
                full.duration_seconds.unwrap_or(0),
                full.view_count.unwrap_or(0)
            );
        }
        Err(e) => {
            let raw = e.to_string();
            match error_context(&raw) {
                Some(context) => warn!("[Selection] Diagnostic detail: {}", context),
                None => warn!("[Selection] Diagnostic detail: {}", raw),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{make_candidate, ScriptedMetadata};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_first_available_wins() {
        // [A(unavailable), B(available), C(available)] with look_back=3 -> B
        let candidates = vec![
            make_candidate("a", "A", 300),
            make_candidate("b", "B", 200),
            make_candidate("c", "C", 100),
        ];
        let backend = ScriptedMetadata::new(candidates.clone()).with_available(&["b", "c"]);

        let selected = select_latest_available(&backend, &candidates, 3).await;
        assert_eq!(selected.unwrap().id, "b");
        // C was never probed
        assert_eq!(backend.probes(), 2);
    }

    #[tokio::test]
    async fn test_probe_count_never_exceeds_look_back() {
        let candidates: Vec<_> = (0..10)
            .map(|i| make_candidate(&format!("v{}", i), &format!("video {}", i), 1000 - i))
            .collect();
        let backend = ScriptedMetadata::new(candidates.clone());

        let selected = select_latest_available(&backend, &candidates, 3).await;
        assert!(selected.is_none());
        assert_eq!(backend.probes(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_diagnoses_last_candidate() {
        let candidates = vec![
            make_candidate("a", "A", 300),
            make_candidate("b", "B", 200),
        ];
        let backend =
            ScriptedMetadata::new(candidates.clone()).with_failing_fetch_full();

        let selected = select_latest_available(&backend, &candidates, 5).await;
        assert!(selected.is_none());
        // Window clamps to the list length, and the deep diagnostic ran once
        assert_eq!(backend.probes(), 2);
        assert_eq!(backend.fetch_full_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_candidate_list() {
        let backend = ScriptedMetadata::new(vec![]);
        let selected = select_latest_available(&backend, &[], 5).await;
        assert!(selected.is_none());
        assert_eq!(backend.probes(), 0);
        assert_eq!(backend.fetch_full_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_available_head_probes_once() {
        let candidates = vec![
            make_candidate("a", "A", 300),
            make_candidate("b", "B", 200),
        ];
        let backend = ScriptedMetadata::new(candidates.clone()).with_available(&["a"]);

        let selected = select_latest_available(&backend, &candidates, 2).await;
        assert_eq!(selected.unwrap().id, "a");
        assert_eq!(backend.probes(), 1);
        assert_eq!(backend.fetch_full_calls.load(Ordering::SeqCst), 0);
    }
}
