//! Download command implementation.

use crate::catalog::{CatalogResolver, Link, YoutubeApiCatalog};
use crate::cli::preflight::{self, Operation};
use crate::cli::{format_duration, DownloadArgs, Output};
use crate::config::{Settings, ValidatedSettings};
use crate::convert::{ConvertOptions, FfmpegTranscoder};
use crate::extract::{UserAgentPool, YtDlpExtractor};
use crate::filter::ItemFilter;
use crate::orchestrator::{
    AbortReason, BatchConfig, BatchReport, Orchestrator, MAX_CONSECUTIVE_FAILURES,
};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run the download command.
pub async fn run_download(
    args: &DownloadArgs,
    mut settings: Settings,
    cancel: CancellationToken,
) -> Result<()> {
    apply_overrides(&mut settings, args);

    let validated = match settings.validate() {
        Ok(v) => v,
        Err(e) => {
            Output::error(&format!("{}", e));
            return Err(e.into());
        }
    };

    if let Err(e) = preflight::check(Operation::Download, &validated.settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'ytaudio doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let link = Link::parse(&args.url)?;
    let api_key = validated.settings.api.youtube_api_key.clone().unwrap_or_default();
    let catalog = YoutubeApiCatalog::new(api_key)?;

    let spinner = Output::spinner(&format!("Resolving {}...", link));
    let resolved = catalog.list_items(&link).await;
    spinner.finish_and_clear();
    let catalog = resolved?;

    let library_root = validated.settings.download_dir();
    let batch_root = match &catalog.name {
        Some(name) => library_root.join(folder_name(name)),
        None => library_root.clone(),
    };

    if let Some(name) = &catalog.name {
        Output::info(&format!("{} ({} items)", name, catalog.items.len()));
    }

    let mut filter = ItemFilter::new(
        validated.date_filter.clone(),
        validated.settings.download.skip_downloaded,
    );
    if validated.settings.download.scan_whole_library {
        filter = filter.with_library_root(&library_root);
    }
    let filtered = filter
        .apply(&catalog.items, &batch_root)
        .with_context(|| format!("Failed to filter items for {:?}", batch_root))?;

    if filtered.already_downloaded() > 0 {
        Output::info(&format!(
            "{} of {} items already downloaded",
            filtered.already_downloaded(),
            filtered.total_considered
        ));
    }
    if filtered.urls.is_empty() {
        Output::success("Nothing to download.");
        return Ok(());
    }

    let orchestrator = build_orchestrator(&validated, cancel)?;
    Output::info(&format!(
        "Downloading {} items into {}",
        filtered.urls.len(),
        batch_root.display()
    ));

    let started = Instant::now();
    let report = orchestrator.run_batch(filtered.urls, &batch_root).await?;
    print_report(&report, started.elapsed());

    match report.aborted {
        Some(AbortReason::LikelyBlocked) => Err(anyhow::anyhow!(abort_message(&report))),
        Some(AbortReason::Cancelled) => {
            Output::warning("Interrupted.");
            Ok(())
        }
        None => Ok(()),
    }
}

/// Fold command-line options into the loaded settings.
fn apply_overrides(settings: &mut Settings, args: &DownloadArgs) {
    let download = &mut settings.download;
    if let Some(format) = &args.format {
        download.audio_ext = format.clone();
    }
    if let Some(dir) = &args.output_dir {
        download.download_directory = dir.clone();
    }
    if let Some(delay) = args.delay {
        download.delay_between_downloads = delay;
    }
    if let Some(expr) = &args.filter_date {
        download.filter_date = expr.clone();
    }
    if args.no_thumbnail {
        download.write_thumbnail = false;
    }
    if args.no_metadata {
        download.write_metadata = false;
    }
    if args.skip_shorts {
        download.skip_shorts = true;
    }
    if args.no_skip_downloaded {
        download.skip_downloaded = false;
    }
    if let Some(proxy) = &args.proxy {
        settings.network.proxy = Some(proxy.clone());
    }
}

fn build_orchestrator(validated: &ValidatedSettings, cancel: CancellationToken) -> Result<Orchestrator> {
    let settings = &validated.settings;
    let download = &settings.download;

    let extractor = Arc::new(YtDlpExtractor::new(Duration::from_secs(
        download.extract_timeout_secs,
    )));
    let transcoder = Arc::new(FfmpegTranscoder::new(ConvertOptions {
        target: validated.target,
        write_thumbnail: download.write_thumbnail,
        write_metadata: download.write_metadata,
        thumbnail_max_edge: download
            .thumbnail_resize
            .then_some(download.thumbnail_max_width),
    }));

    let agents = match &settings.network.user_agents_file {
        Some(path) => {
            let path = Settings::expand_path(path);
            UserAgentPool::from_file(&path)
                .with_context(|| format!("Failed to read user agents from {:?}", path))?
        }
        None => UserAgentPool::builtin(),
    };
    info!("Using {} user agents", agents.len());

    Ok(
        Orchestrator::new(extractor, transcoder, BatchConfig::from_settings(settings), cancel)
            .with_agents(agents),
    )
}

fn print_report(report: &BatchReport, elapsed: Duration) {
    Output::header("Summary");
    Output::kv("Saved", &report.succeeded.len().to_string());
    if report.skipped_short > 0 {
        Output::kv("Skipped (shorts)", &report.skipped_short.to_string());
    }
    if report.skipped_low_bitrate > 0 {
        Output::kv("Skipped (low bitrate)", &report.skipped_low_bitrate.to_string());
    }
    Output::kv("Failed", &report.failed.len().to_string());
    if !report.remaining.is_empty() {
        Output::kv("Not attempted", &report.remaining.len().to_string());
    }
    Output::kv("Time", &format_duration(elapsed.as_secs_f64()));

    for failed in &report.failed {
        warn!("{}: {}", failed.url, failed.reason);
        Output::list_item(&format!("{} - {}", failed.url, failed.reason));
    }
}

/// Why a batch stopped after consecutive failures.
fn abort_message(report: &BatchReport) -> String {
    if report.block_signal_seen {
        format!(
            "stopped after {} consecutive failures, YouTube is likely blocking requests; try again later or use a proxy",
            MAX_CONSECUTIVE_FAILURES
        )
    } else {
        format!(
            "stopped after {} consecutive failures; see the errors above",
            MAX_CONSECUTIVE_FAILURES
        )
    }
}

/// Directory name for a playlist or channel title.
fn folder_name(title: &str) -> PathBuf {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_end_matches('.').trim();
    if cleaned.is_empty() {
        PathBuf::from("untitled")
    } else {
        PathBuf::from(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let mut settings = Settings::default();
        let args = DownloadArgs {
            url: "x".into(),
            format: Some("mp3".into()),
            delay: Some(2.5),
            no_thumbnail: true,
            no_skip_downloaded: true,
            proxy: Some("socks5://127.0.0.1:9050".into()),
            ..Default::default()
        };

        apply_overrides(&mut settings, &args);

        assert_eq!(settings.download.audio_ext, "mp3");
        assert_eq!(settings.download.delay_between_downloads, 2.5);
        assert!(!settings.download.write_thumbnail);
        assert!(settings.download.write_metadata);
        assert!(!settings.download.skip_downloaded);
        assert_eq!(settings.network.proxy.as_deref(), Some("socks5://127.0.0.1:9050"));
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let mut settings = Settings::default();
        settings.download.skip_shorts = true;
        apply_overrides(&mut settings, &DownloadArgs::default());
        assert!(settings.download.skip_shorts);
        assert_eq!(settings.download.audio_ext, "opus");
    }

    #[test]
    fn test_abort_message_wording() {
        let mut report = BatchReport {
            aborted: Some(AbortReason::LikelyBlocked),
            ..Default::default()
        };
        assert!(!abort_message(&report).contains("blocking"));

        report.block_signal_seen = true;
        assert!(abort_message(&report).contains("likely blocking"));
    }

    #[test]
    fn test_folder_name() {
        assert_eq!(folder_name("Best of 2020/2021"), PathBuf::from("Best of 2020_2021"));
        assert_eq!(folder_name("  Mix: Vol. 1...  "), PathBuf::from("Mix_ Vol. 1"));
        assert_eq!(folder_name("???"), PathBuf::from("___"));
        assert_eq!(folder_name("   "), PathBuf::from("untitled"));
    }
}
