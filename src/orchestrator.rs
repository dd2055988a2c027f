// Orchestrator - drives poll cycles across subscriptions and sources
//
// One source is fully processed (resolve -> probe -> select -> acquire ->
// synthesize) before the next begins. A failing source never aborts its
// siblings; the cycle just counts it as unsuccessful and moves on.
// Cancellation is cooperative: a termination signal flips one atomic flag,
// observed once per loop iteration and once per second during the
// inter-cycle sleep. An in-flight download is allowed to finish naturally.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::config::{ConfigManager, Source, Subscription};
use crate::downloader::gate::{AcquisitionGate, GateOutcome, SkipReason};
use crate::downloader::models::VideoCandidate;
use crate::downloader::traits::AcquisitionBackend;
use crate::feed::{report_feed_failure, FeedSettings, FeedSynthesizer};
use crate::fingerprint::fingerprint;
use crate::metadata::{MetadataBackend, ProbeOutcome, UnavailableReason};
use crate::resolver::directory_for;
use crate::selection::select_latest_available;

/// Mode flags translated straight from the CLI.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub subscription_filter: Option<String>,
    pub source_filter: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CycleStats {
    pub attempted: usize,
    pub succeeded: usize,
}

/// One probed candidate in a dry-run analysis.
#[derive(Debug, Clone)]
pub struct ProbedCandidate {
    pub candidate: VideoCandidate,
    pub available: bool,
    pub reason: Option<UnavailableReason>,
}

/// What a cycle would have done to one source, without doing it.
#[derive(Debug, Clone)]
pub struct DryRunReport {
    pub subscription: String,
    pub source: String,
    pub total_candidates: usize,
    pub probed: Vec<ProbedCandidate>,
    pub would_download: Option<VideoCandidate>,
    pub artifact_exists: bool,
}

#[derive(Debug, Default)]
pub struct CycleSummary {
    pub stats: CycleStats,
    pub reports: Vec<DryRunReport>,
}

pub struct Orchestrator {
    metadata: Arc<dyn MetadataBackend>,
    gate: AcquisitionGate,
    synthesizer: FeedSynthesizer,
    output_root: PathBuf,
    shutdown: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        config: &ConfigManager,
        metadata: Arc<dyn MetadataBackend>,
        acquisition: Arc<dyn AcquisitionBackend>,
        downloads_disabled: bool,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let options = config.download_options();
        let settings = FeedSettings {
            base_url: config.base_url(),
            language: config.language(),
            thumbnail_format: options.thumbnail_format.clone(),
        };
        Self {
            metadata,
            gate: AcquisitionGate::new(acquisition, options, downloads_disabled),
            synthesizer: FeedSynthesizer::new(settings),
            output_root: config.output_dir(),
            shutdown,
        }
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run exactly one cycle over the enabled graph and return its summary.
    pub async fn run_once(&self, config: &ConfigManager, options: &RunOptions) -> CycleSummary {
        let subscriptions = config.enabled_subscriptions();
        if subscriptions.is_empty() {
            warn!("[Orchestrator] No enabled subscriptions to process");
            return CycleSummary::default();
        }
        info!(
            "[Orchestrator] Starting cycle over {} subscription(s)",
            subscriptions.len()
        );

        let mut summary = CycleSummary::default();
        for subscription in subscriptions {
            if self.stopping() {
                break;
            }
            if let Some(filter) = &options.subscription_filter {
                if subscription.name != *filter {
                    continue;
                }
            }

            info!(
                "[Orchestrator] Subscription '{}' ({} source(s))",
                subscription.title,
                subscription.sources.len()
            );

            for source in subscription.enabled_sources() {
                if self.stopping() {
                    break;
                }
                if let Some(filter) = &options.source_filter {
                    if source.name != *filter {
                        continue;
                    }
                }

                summary.stats.attempted += 1;
                if options.dry_run {
                    if let Some(report) = self.dry_run_source(subscription, source).await {
                        log_report(&report);
                        summary.reports.push(report);
                        summary.stats.succeeded += 1;
                    }
                } else if self.process_source(subscription, source).await {
                    summary.stats.succeeded += 1;
                }
            }
        }

        info!(
            "[Orchestrator] Cycle finished: {}/{} source(s) succeeded",
            summary.stats.succeeded, summary.stats.attempted
        );
        summary
    }

    /// Continuous mode: cycles separated by the configured interval until
    /// the shutdown flag is raised or nothing is left enabled.
    pub async fn run_loop(&self, config: &ConfigManager, options: &RunOptions) {
        let interval = Duration::from_secs(config.check_interval_minutes() * 60);
        info!(
            "[Orchestrator] Polling every {} minute(s); Ctrl+C to stop",
            config.check_interval_minutes()
        );

        while !self.stopping() {
            if config.enabled_subscriptions().is_empty() {
                warn!("[Orchestrator] No enabled subscriptions, stopping loop");
                break;
            }

            self.run_once(config, options).await;

            if self.stopping() {
                break;
            }
            info!(
                "[Orchestrator] Sleeping {} minute(s) until the next cycle",
                config.check_interval_minutes()
            );
            self.interruptible_sleep(interval).await;
        }

        info!("[Orchestrator] Stopped");
    }

    /// Sleep in one-second steps so a termination signal is honored promptly.
    async fn interruptible_sleep(&self, total: Duration) {
        let mut remaining = total;
        while remaining > Duration::ZERO && !self.stopping() {
            let step = remaining.min(Duration::from_secs(1));
            tokio::time::sleep(step).await;
            remaining = remaining.saturating_sub(step);
        }
    }

    /// Full pipeline for one source. Returns whether the source produced a
    /// valid feed this cycle.
    async fn process_source(&self, subscription: &Subscription, source: &Source) -> bool {
        info!(
            "[Orchestrator] Processing source '{}' ({}, {})",
            source.name,
            source.kind,
            source.url
        );

        let directory = directory_for(source);
        let mut candidates = directory.list_candidates(self.metadata.as_ref()).await;
        if candidates.is_empty() {
            // Degraded path: the full listing failed, try just the head
            match directory.latest_candidate(self.metadata.as_ref()).await {
                Some(latest) => candidates = vec![latest],
                None => {
                    warn!("[Orchestrator] No candidates for source '{}'", source.name);
                    return false;
                }
            }
        }

        let selected = select_latest_available(
            self.metadata.as_ref(),
            &candidates,
            source.look_back_count,
        )
        .await;
        let Some(selected) = selected else {
            warn!(
                "[Orchestrator] No available candidate for source '{}' this cycle",
                source.name
            );
            return false;
        };

        let subscription_dir = self.output_root.join(&subscription.name);
        match self.gate.ensure_downloaded(&selected, &subscription_dir).await {
            GateOutcome::Skipped(SkipReason::BackendFailure(e)) => {
                warn!(
                    "[Orchestrator] Source '{}' failed to acquire '{}': {}",
                    source.name, selected.title, e
                );
                false
            }
            // Fresh download, already on disk, or downloads disabled: the
            // feed is rebuilt from whatever the directory actually holds
            _ => match self.synthesizer.rebuild_feed(
                subscription,
                &subscription_dir,
                &candidates,
                &selected,
            ) {
                Ok(_) => true,
                Err(e) => {
                    report_feed_failure(&subscription.name, &e);
                    false
                }
            },
        }
    }

    /// Analysis-only variant of `process_source`: probes the look-back
    /// window and reports what a real cycle would do. No writes, no
    /// acquisition calls.
    async fn dry_run_source(
        &self,
        subscription: &Subscription,
        source: &Source,
    ) -> Option<DryRunReport> {
        let directory = directory_for(source);
        let candidates = directory.list_candidates(self.metadata.as_ref()).await;
        if candidates.is_empty() {
            warn!("[Orchestrator] Dry run: no candidates for source '{}'", source.name);
            return None;
        }

        let window = source.look_back_count.min(candidates.len());
        let mut probed = Vec::new();
        let mut would_download = None;

        for candidate in &candidates[..window] {
            match self.metadata.probe(&candidate.id).await {
                Ok(ProbeOutcome::Present) => {
                    if would_download.is_none() {
                        would_download = Some(candidate.clone());
                    }
                    probed.push(ProbedCandidate {
                        candidate: candidate.clone(),
                        available: true,
                        reason: None,
                    });
                }
                Ok(ProbeOutcome::Absent(reason)) => probed.push(ProbedCandidate {
                    candidate: candidate.clone(),
                    available: false,
                    reason: Some(reason),
                }),
                Err(e) => {
                    warn!(
                        "[Orchestrator] Dry run probe failed for '{}': {}",
                        candidate.title, e
                    );
                    probed.push(ProbedCandidate {
                        candidate: candidate.clone(),
                        available: false,
                        reason: None,
                    });
                }
            }
        }

        let artifact_exists = would_download
            .as_ref()
            .map(|c| {
                self.output_root
                    .join(&subscription.name)
                    .join(format!("{}.mp3", fingerprint(&c.title)))
                    .exists()
            })
            .unwrap_or(false);

        Some(DryRunReport {
            subscription: subscription.name.clone(),
            source: source.name.clone(),
            total_candidates: candidates.len(),
            probed,
            would_download,
            artifact_exists,
        })
    }
}

fn log_report(report: &DryRunReport) {
    info!(
        "[DryRun] {}/{}: {} candidate(s), {} probed",
        report.subscription,
        report.source,
        report.total_candidates,
        report.probed.len()
    );
    for entry in &report.probed {
        match (&entry.available, &entry.reason) {
            (true, _) => info!("[DryRun]   available: '{}'", entry.candidate.title),
            (false, Some(reason)) => info!(
                "[DryRun]   unavailable ({}): '{}'",
                reason.description(),
                entry.candidate.title
            ),
            (false, None) => info!("[DryRun]   probe failed: '{}'", entry.candidate.title),
        }
    }
    match &report.would_download {
        Some(candidate) => info!(
            "[DryRun]   would download: '{}' (artifact exists: {})",
            candidate.title, report.artifact_exists
        ),
        None => info!("[DryRun]   nothing to download"),
    }
}
