//! yt-dlp backed extractor.

use super::{AttemptBundle, AttemptOptions, Extractor, Metadata};
use crate::error::ExtractionError;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Format ids of the full-quality audio streams (opus 251, aac 140).
const ELIGIBLE_FORMAT_IDS: &[&str] = &["251", "140"];

/// Fields printed by yt-dlp once the file is in its final place.
const AFTER_MOVE_PRINT: &str =
    "after_move:%(.{filepath,format_id,title,uploader,upload_date,webpage_url,thumbnails})j";

/// Extractor that shells out to yt-dlp.
pub struct YtDlpExtractor {
    program: String,
    timeout: Duration,
}

impl YtDlpExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "yt-dlp".to_string(),
            timeout,
        }
    }

    /// Use a different yt-dlp executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn run(&self, args: &[String]) -> Result<String, ExtractionError> {
        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Err(_) => return Err(ExtractionError::Timeout(self.timeout.as_secs())),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExtractionError::ToolNotFound(self.program.clone()));
            }
            Ok(Err(e)) => {
                return Err(ExtractionError::Failed(format!("{} execution failed: {e}", self.program)));
            }
            Ok(Ok(o)) => o,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_stderr(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    #[instrument(skip(self, options))]
    async fn probe_duration(
        &self,
        url: &str,
        options: &AttemptOptions,
    ) -> Result<Option<f64>, ExtractionError> {
        let args = probe_args(url, options);
        let stdout = self.run(&args).await?;

        let info: serde_json::Value = stdout
            .lines()
            .rev()
            .find_map(|l| serde_json::from_str(l).ok())
            .ok_or_else(|| ExtractionError::Failed("yt-dlp printed no video info".into()))?;

        Ok(info["duration"].as_f64())
    }

    #[instrument(skip(self, options))]
    async fn download(
        &self,
        url: &str,
        options: &AttemptOptions,
    ) -> Result<AttemptBundle, ExtractionError> {
        let args = download_args(url, options);
        debug!("yt-dlp {}", args.join(" "));

        let stdout = self.run(&args).await?;
        let bundle = parse_after_move(&stdout, options)?;

        if !bundle.audio_path.exists() {
            warn!("yt-dlp reported {:?} but the file is missing", bundle.audio_path);
            return Err(ExtractionError::MissingOutput);
        }
        Ok(bundle)
    }
}

fn common_args(options: &AttemptOptions) -> Vec<String> {
    let mut args = vec![
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--user-agent".to_string(),
        options.user_agent.clone(),
    ];
    if let Some(proxy) = &options.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.clone());
    }
    args
}

fn probe_args(url: &str, options: &AttemptOptions) -> Vec<String> {
    let mut args = vec!["--dump-json".to_string(), "--skip-download".to_string()];
    args.extend(common_args(options));
    args.push(url.to_string());
    args
}

fn download_args(url: &str, options: &AttemptOptions) -> Vec<String> {
    let mut args = vec![
        "--format".to_string(),
        "bestaudio/best".to_string(),
        "--no-simulate".to_string(),
        "--no-progress".to_string(),
        "--print".to_string(),
        AFTER_MOVE_PRINT.to_string(),
        "--output".to_string(),
        options.output_template.to_string_lossy().into_owned(),
        "--limit-rate".to_string(),
        format!("{}K", options.rate_limit / 1024),
    ];
    if options.write_thumbnail {
        args.push("--write-thumbnail".to_string());
    }
    args.extend(common_args(options));
    args.push(url.to_string());
    args
}

#[derive(Debug, Deserialize)]
struct AfterMove {
    filepath: Option<PathBuf>,
    format_id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    upload_date: Option<String>,
    webpage_url: Option<String>,
    #[serde(default)]
    thumbnails: Option<Vec<Thumbnail>>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    filepath: Option<PathBuf>,
}

/// Build the bundle from the `after_move` line yt-dlp printed.
fn parse_after_move(stdout: &str, options: &AttemptOptions) -> Result<AttemptBundle, ExtractionError> {
    let info: AfterMove = stdout
        .lines()
        .rev()
        .find_map(|l| serde_json::from_str(l.trim()).ok())
        .ok_or(ExtractionError::MissingOutput)?;

    let audio_path = info.filepath.ok_or(ExtractionError::MissingOutput)?;

    // The list is ordered by preference; the written file is the best one.
    let thumbnail_path = if options.write_thumbnail {
        info.thumbnails
            .unwrap_or_default()
            .into_iter()
            .rev()
            .find_map(|t| t.filepath)
    } else {
        None
    };

    let metadata = options.write_metadata.then(|| Metadata {
        title: info.title.unwrap_or_default(),
        artist: info.uploader.unwrap_or_default(),
        date: info.upload_date.unwrap_or_default(),
        comment: info.webpage_url.unwrap_or_default(),
    });

    let bitrate_eligible = info
        .format_id
        .as_deref()
        .map(|id| ELIGIBLE_FORMAT_IDS.contains(&id))
        .unwrap_or(false);

    Ok(AttemptBundle {
        audio_path,
        thumbnail_path,
        metadata,
        bitrate_eligible,
    })
}

/// Map yt-dlp's error output onto an extraction error.
fn classify_stderr(stderr: &str) -> ExtractionError {
    let lower = stderr.to_lowercase();
    let detail = stderr
        .lines()
        .rev()
        .find(|l| l.contains("ERROR"))
        .unwrap_or_else(|| stderr.trim())
        .to_string();

    const BLOCK_MARKERS: &[&str] = &[
        "http error 429",
        "too many requests",
        "not a bot",
        "rate-limited",
        "sign in to confirm",
    ];
    const UNAVAILABLE_MARKERS: &[&str] = &[
        "video unavailable",
        "private video",
        "this video is not available",
        "members-only",
        "has been removed",
    ];
    const NETWORK_MARKERS: &[&str] = &[
        "timed out",
        "connection reset",
        "temporary failure in name resolution",
        "unable to download webpage",
        "network is unreachable",
    ];

    if BLOCK_MARKERS.iter().any(|m| lower.contains(m)) {
        ExtractionError::RateLimited(detail)
    } else if UNAVAILABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        ExtractionError::Unavailable(detail)
    } else if NETWORK_MARKERS.iter().any(|m| lower.contains(m)) {
        ExtractionError::Network(detail)
    } else {
        ExtractionError::Failed(detail)
    }
}

/// Print the formats yt-dlp offers for a URL, without downloading.
pub async fn list_formats(url: &str) -> Result<String, ExtractionError> {
    let output = Command::new("yt-dlp")
        .arg("--list-formats")
        .arg("--no-warnings")
        .arg(url)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExtractionError::ToolNotFound("yt-dlp".to_string())
            } else {
                ExtractionError::Failed(format!("Failed to run yt-dlp: {}", e))
            }
        })?;

    if !output.status.success() {
        return Err(classify_stderr(&String::from_utf8_lossy(&output.stderr)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
