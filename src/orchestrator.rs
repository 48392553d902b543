//! Batch download orchestrator.
//!
//! Drives one batch of items strictly in sequence: attempt, classify, pace.
//! Three extraction failures in a row stop the batch.

use crate::cleanup::{CleanupGuard, TMP_DIR, UNCONVERTED_DIR};
use crate::cli::Output;
use crate::config::Settings;
use crate::convert::Transcoder;
use crate::error::{ExtractionError, ItemError, Result};
use crate::extract::{random_rate_limit, AttemptBundle, AttemptOptions, Extractor, UserAgentPool};
use indicatif::ProgressBar;
use rand::Rng;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Consecutive extraction failures that abort a batch.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Upper bound of the random pause added to the base delay, in tenths of a second.
const JITTER_TENTHS: u32 = 30;

/// Why an item was skipped without counting as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Within the shorts duration threshold.
    Short,
    /// Not one of the full-quality source formats.
    LowBitrate,
}

/// Result of one item.
#[derive(Debug)]
pub enum DownloadOutcome {
    Success(PathBuf),
    SoftSkip(SkipReason),
    HardFailure(ItemError),
}

/// Why a batch stopped before its last item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Too many consecutive extraction failures.
    LikelyBlocked,
    Cancelled,
}

/// An item that failed, with the rendered error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub url: String,
    pub reason: String,
}

/// Summary of one batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<PathBuf>,
    pub skipped_short: usize,
    pub skipped_low_bitrate: usize,
    pub failed: Vec<FailedItem>,
    /// Items never attempted because the batch stopped early.
    pub remaining: Vec<String>,
    pub aborted: Option<AbortReason>,
    /// The failure streak that stopped the batch included a rate-limit or
    /// bot-check response.
    pub block_signal_seen: bool,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.skipped_short + self.skipped_low_bitrate + self.failed.len()
    }
}

/// Per-batch knobs taken from [`Settings`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub filename_format: String,
    pub base_delay: Duration,
    pub skip_shorts: bool,
    pub shorts_max_seconds: u64,
    pub proxy: Option<String>,
    pub write_thumbnail: bool,
    pub write_metadata: bool,
    /// Draw progress bars and the pacing countdown.
    pub show_progress: bool,
}

impl BatchConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let download = &settings.download;
        Self {
            filename_format: download.filename_format.clone(),
            base_delay: Duration::from_secs_f64(download.delay_between_downloads.max(0.0)),
            skip_shorts: download.skip_shorts,
            shorts_max_seconds: download.shorts_max_seconds,
            proxy: settings.network.proxy.clone(),
            write_thumbnail: download.write_thumbnail,
            write_metadata: download.write_metadata,
            show_progress: true,
        }
    }
}

/// Pause still owed before the next attempt, if any.
pub fn pacing_delay(base: Duration, jitter: Duration, elapsed: Duration) -> Option<Duration> {
    (base + jitter)
        .checked_sub(elapsed)
        .filter(|d| !d.is_zero())
}

fn random_jitter() -> Duration {
    let tenths = rand::thread_rng().gen_range(0..=JITTER_TENTHS);
    Duration::from_millis(u64::from(tenths) * 100)
}

/// Sequential batch runner.
pub struct Orchestrator {
    extractor: Arc<dyn Extractor>,
    transcoder: Arc<dyn Transcoder>,
    agents: UserAgentPool,
    config: BatchConfig,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        transcoder: Arc<dyn Transcoder>,
        config: BatchConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            extractor,
            transcoder,
            agents: UserAgentPool::default(),
            config,
            cancel,
        }
    }

    /// Replace the built-in user agent pool.
    pub fn with_agents(mut self, agents: UserAgentPool) -> Self {
        self.agents = agents;
        self
    }

    /// Download every URL into `batch_root`, in order.
    ///
    /// Cleanup of `batch_root` runs when this returns, whatever the outcome.
    #[instrument(skip(self, urls), fields(items = urls.len()))]
    pub async fn run_batch(&self, urls: Vec<String>, batch_root: &Path) -> Result<BatchReport> {
        std::fs::create_dir_all(batch_root.join(TMP_DIR))?;
        let _guard = CleanupGuard::new(batch_root);

        let total = urls.len() as u64;
        let mut pending: VecDeque<String> = urls.into();
        let mut report = BatchReport::default();
        let mut consecutive_failures = 0u32;
        let mut streak_block_signal = false;

        let bar = if self.config.show_progress {
            Output::progress_bar(total, "downloading")
        } else {
            ProgressBar::hidden()
        };

        while let Some(url) = pending.pop_front() {
            if self.cancel.is_cancelled() {
                pending.push_front(url);
                report.aborted = Some(AbortReason::Cancelled);
                break;
            }

            let started = Instant::now();
            bar.set_message(url.clone());

            match self.process_item(&url, batch_root).await {
                DownloadOutcome::Success(path) => {
                    consecutive_failures = 0;
                    streak_block_signal = false;
                    bar.println(format!("  saved {}", path.display()));
                    report.succeeded.push(path);
                }
                DownloadOutcome::SoftSkip(reason) => {
                    consecutive_failures = 0;
                    streak_block_signal = false;
                    bar.println(format!("  skipped {} ({:?})", url, reason));
                    match reason {
                        SkipReason::Short => report.skipped_short += 1,
                        SkipReason::LowBitrate => report.skipped_low_bitrate += 1,
                    }
                }
                DownloadOutcome::HardFailure(err) => {
                    if err.counts_toward_block() {
                        consecutive_failures += 1;
                        streak_block_signal |= err.is_block_signal();
                    }
                    warn!("{} failed: {}", url, err);
                    bar.println(format!("  failed {}: {}", url, err));
                    report.failed.push(FailedItem {
                        url: url.clone(),
                        reason: err.to_string(),
                    });
                }
            }
            bar.inc(1);

            if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                if streak_block_signal {
                    warn!(
                        "{} consecutive failures, the remote service is likely blocking requests",
                        consecutive_failures
                    );
                } else {
                    warn!("{} consecutive failures, stopping the batch", consecutive_failures);
                }
                report.aborted = Some(AbortReason::LikelyBlocked);
                report.block_signal_seen = streak_block_signal;
                break;
            }

            if pending.is_empty() {
                break;
            }

            if let Some(delay) = pacing_delay(self.config.base_delay, random_jitter(), started.elapsed()) {
                if !self.pace(delay).await {
                    report.aborted = Some(AbortReason::Cancelled);
                    break;
                }
            }
        }

        bar.finish_and_clear();
        report.remaining = pending.into();
        info!(
            "Batch done: {} saved, {} failed, {} left",
            report.succeeded.len(),
            report.failed.len(),
            report.remaining.len()
        );
        Ok(report)
    }

    /// Attempt one item and classify the result.
    #[instrument(skip(self, batch_root))]
    pub async fn process_item(&self, url: &str, batch_root: &Path) -> DownloadOutcome {
        let tmp_dir = batch_root.join(TMP_DIR);
        if let Err(e) = std::fs::create_dir_all(&tmp_dir) {
            return DownloadOutcome::HardFailure(ItemError::Filesystem(format!(
                "cannot create {:?}: {}",
                tmp_dir, e
            )));
        }

        let options = self.attempt_options(&tmp_dir);

        if self.config.skip_shorts {
            match self.extractor.probe_duration(url, &options).await {
                Ok(Some(secs)) if (0.0..=self.config.shorts_max_seconds as f64).contains(&secs) => {
                    debug!("{} is {:.0}s long, skipping as short", url, secs);
                    return DownloadOutcome::SoftSkip(SkipReason::Short);
                }
                Ok(_) => {}
                Err(e) => return DownloadOutcome::HardFailure(e.into()),
            }
        }

        let bundle = match self.extractor.download(url, &options).await {
            Ok(bundle) => bundle,
            Err(e) => return DownloadOutcome::HardFailure(e.into()),
        };
        if !bundle.audio_path.is_file() {
            return DownloadOutcome::HardFailure(ExtractionError::MissingOutput.into());
        }

        if !bundle.bitrate_eligible {
            info!("{} has no full-quality audio stream, skipping", url);
            remove_temp_files(&bundle);
            return DownloadOutcome::SoftSkip(SkipReason::LowBitrate);
        }

        match self.transcoder.convert(&bundle).await {
            Ok(path) => {
                remove_temp_files(&bundle);
                DownloadOutcome::Success(path)
            }
            Err(e) => {
                retain_source(&bundle, batch_root);
                DownloadOutcome::HardFailure(e.into())
            }
        }
    }

    fn attempt_options(&self, tmp_dir: &Path) -> AttemptOptions {
        AttemptOptions {
            output_template: tmp_dir.join(&self.config.filename_format),
            user_agent: self.agents.pick().to_string(),
            rate_limit: random_rate_limit(),
            proxy: self.config.proxy.clone(),
            write_thumbnail: self.config.write_thumbnail,
            write_metadata: self.config.write_metadata,
        }
    }

    /// Sleep for `delay` with a countdown. Returns false if cancelled meanwhile.
    async fn pace(&self, delay: Duration) -> bool {
        debug!("Pausing {:.1}s before the next item", delay.as_secs_f64());
        let bar = if self.config.show_progress {
            Output::countdown(delay)
        } else {
            ProgressBar::hidden()
        };

        let deadline = Instant::now() + delay;
        let mut ticker = tokio::time::interval(Duration::from_millis(100));
        let finished = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break false,
                _ = tokio::time::sleep_until(deadline) => break true,
                _ = ticker.tick() => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    bar.set_position((delay - left).as_millis() as u64);
                    bar.set_message(format!("{:.1}s", left.as_secs_f64()));
                }
            }
        };

        bar.finish_and_clear();
        finished
    }
}

fn remove_temp_files(bundle: &AttemptBundle) {
    let paths = std::iter::once(&bundle.audio_path).chain(bundle.thumbnail_path.as_ref());
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove {:?}: {}", path, e);
            }
        }
    }
}

/// Move the raw download into `unconverted/` so it survives cleanup without
/// counting as downloaded on the next run.
fn retain_source(bundle: &AttemptBundle, batch_root: &Path) {
    let Some(name) = bundle.audio_path.file_name() else {
        return;
    };
    let dir = batch_root.join(UNCONVERTED_DIR);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!("Could not create {:?}: {}", dir, e);
        return;
    }
    let dest = dir.join(name);
    match std::fs::rename(&bundle.audio_path, &dest) {
        Ok(()) => info!("Kept unconverted source at {:?}", dest),
        Err(e) => warn!("Could not keep {:?}: {}", bundle.audio_path, e),
    }
}
