// Acquisition gate - idempotency check in front of the download backend
//
// The artifact store is content-addressed by title fingerprint, so deciding
// "do we need to download this" is a single file-existence check. Repeated
// cycles over an unchanged latest video never touch the backend again.

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use super::models::{Artifact, DownloadOptions, VideoCandidate};
use super::traits::AcquisitionBackend;
use crate::fingerprint::fingerprint;

/// Why the gate did not produce an artifact this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Kill-switch active: acquisition bypassed wholesale
    DownloadsDisabled,
    /// The backend failed or the video vanished before transfer
    BackendFailure(String),
}

/// Outcome of one pass through the gate.
#[derive(Debug, Clone)]
pub enum GateOutcome {
    /// The artifact already existed; the backend was not contacted
    AlreadyPresent(Artifact),
    /// Freshly downloaded this cycle
    Downloaded(Artifact),
    /// Nothing on disk and nothing downloaded
    Skipped(SkipReason),
}

impl GateOutcome {
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            Self::AlreadyPresent(a) | Self::Downloaded(a) => Some(a),
            Self::Skipped(_) => None,
        }
    }
}

pub struct AcquisitionGate {
    backend: Arc<dyn AcquisitionBackend>,
    options: DownloadOptions,
    /// Out-of-band kill-switch: skip all transfers, keep the rest of the
    /// pipeline running
    downloads_disabled: bool,
}

impl AcquisitionGate {
    pub fn new(
        backend: Arc<dyn AcquisitionBackend>,
        options: DownloadOptions,
        downloads_disabled: bool,
    ) -> Self {
        Self {
            backend,
            options,
            downloads_disabled,
        }
    }

    fn artifact_for(&self, fp: &str, subscription_dir: &Path) -> Artifact {
        Artifact {
            fingerprint: fp.to_string(),
            audio_path: subscription_dir.join(format!("{}.mp3", fp)),
            thumbnail_path: subscription_dir
                .join(format!("{}.{}", fp, self.options.thumbnail_format)),
        }
    }

    /// Ensure the candidate's audio artifact exists in `subscription_dir`.
    pub async fn ensure_downloaded(
        &self,
        candidate: &VideoCandidate,
        subscription_dir: &Path,
    ) -> GateOutcome {
        let fp = fingerprint(&candidate.title);
        let artifact = self.artifact_for(&fp, subscription_dir);

        if artifact.audio_path.exists() {
            info!(
                "[AcquisitionGate] {} already on disk, skipping download of '{}'",
                artifact.audio_path.display(),
                candidate.title
            );
            return GateOutcome::AlreadyPresent(artifact);
        }

        if self.downloads_disabled {
            info!(
                "[AcquisitionGate] Downloads disabled, not acquiring '{}'",
                candidate.title
            );
            return GateOutcome::Skipped(SkipReason::DownloadsDisabled);
        }

        if let Err(e) = std::fs::create_dir_all(subscription_dir) {
            warn!(
                "[AcquisitionGate] Could not create {}: {}",
                subscription_dir.display(),
                e
            );
            return GateOutcome::Skipped(SkipReason::BackendFailure(e.to_string()));
        }

        let stem = subscription_dir.join(&fp);
        match self
            .backend
            .acquire(&candidate.id, &stem, &self.options)
            .await
        {
            Ok(()) => {
                info!(
                    "[AcquisitionGate] Downloaded '{}' via {} -> {}",
                    candidate.title,
                    self.backend.name(),
                    artifact.audio_path.display()
                );
                GateOutcome::Downloaded(artifact)
            }
            Err(e) => {
                warn!(
                    "[AcquisitionGate] {} failed for '{}': {}",
                    self.backend.name(),
                    candidate.title,
                    e
                );
                GateOutcome::Skipped(SkipReason::BackendFailure(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingAcquisition;

    fn candidate(title: &str) -> VideoCandidate {
        VideoCandidate {
            id: "vid01".to_string(),
            title: title.to_string(),
            uploader: "Uploader".to_string(),
            duration_seconds: Some(60),
            view_count: None,
            upload_date: None,
            timestamp: None,
            playlist_position: None,
        }
    }

    #[tokio::test]
    async fn test_existing_artifact_skips_backend() {
        let dir = tempfile::tempdir().unwrap();
        let c = candidate("an episode");
        let fp = fingerprint(&c.title);
        std::fs::write(dir.path().join(format!("{}.mp3", fp)), b"audio").unwrap();

        let backend = Arc::new(RecordingAcquisition::succeeding());
        let gate = AcquisitionGate::new(backend.clone(), DownloadOptions::default(), false);

        let outcome = gate.ensure_downloaded(&c, dir.path()).await;
        assert!(matches!(outcome, GateOutcome::AlreadyPresent(_)));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_artifact_downloads_once() {
        let dir = tempfile::tempdir().unwrap();
        let c = candidate("a fresh episode");

        let backend = Arc::new(RecordingAcquisition::succeeding());
        let gate = AcquisitionGate::new(backend.clone(), DownloadOptions::default(), false);

        let first = gate.ensure_downloaded(&c, dir.path()).await;
        assert!(matches!(first, GateOutcome::Downloaded(_)));
        assert_eq!(backend.calls(), 1);

        // The mock backend wrote the file; the second pass must not call out
        let second = gate.ensure_downloaded(&c, dir.path()).await;
        assert!(matches!(second, GateOutcome::AlreadyPresent(_)));
        assert_eq!(backend.calls(), 1);

        assert_eq!(first.artifact(), second.artifact());
    }

    #[tokio::test]
    async fn test_kill_switch_bypasses_backend() {
        let dir = tempfile::tempdir().unwrap();
        let c = candidate("never downloaded");

        let backend = Arc::new(RecordingAcquisition::succeeding());
        let gate = AcquisitionGate::new(backend.clone(), DownloadOptions::default(), true);

        let outcome = gate.ensure_downloaded(&c, dir.path()).await;
        assert!(matches!(
            outcome,
            GateOutcome::Skipped(SkipReason::DownloadsDisabled)
        ));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_is_a_skip() {
        let dir = tempfile::tempdir().unwrap();
        let c = candidate("flaky episode");

        let backend = Arc::new(RecordingAcquisition::failing("Video unavailable"));
        let gate = AcquisitionGate::new(backend.clone(), DownloadOptions::default(), false);

        let outcome = gate.ensure_downloaded(&c, dir.path()).await;
        assert!(matches!(
            outcome,
            GateOutcome::Skipped(SkipReason::BackendFailure(_))
        ));
        assert_eq!(backend.calls(), 1);
    }
}
