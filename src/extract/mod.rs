//! Extraction engine interface.
//!
//! The orchestrator talks to the extraction engine through the [`Extractor`]
//! trait. One call downloads one item and returns its [`AttemptBundle`]
//! directly; nothing is handed back through shared state.

mod agents;
mod ytdlp;

pub use agents::{random_rate_limit, UserAgentPool, RATE_LIMIT_KIB};
pub use ytdlp::{list_formats, YtDlpExtractor};

use crate::error::ExtractionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tags written into the finished file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub artist: String,
    /// Upload date as reported by the engine (YYYYMMDD).
    pub date: String,
    /// Canonical page URL.
    pub comment: String,
}

/// Parameters of one extraction attempt.
#[derive(Debug, Clone)]
pub struct AttemptOptions {
    /// Output template, including the `tmp/` working directory.
    pub output_template: PathBuf,
    pub user_agent: String,
    /// Download ceiling in bytes per second.
    pub rate_limit: u64,
    pub proxy: Option<String>,
    pub write_thumbnail: bool,
    pub write_metadata: bool,
}

/// What a finished download left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptBundle {
    pub audio_path: PathBuf,
    /// Highest-resolution thumbnail written to disk, if any.
    pub thumbnail_path: Option<PathBuf>,
    pub metadata: Option<Metadata>,
    /// Whether the source stream is one of the known full-quality formats.
    pub bitrate_eligible: bool,
}

/// The external media-extraction engine.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Duration of the item in seconds, without downloading it.
    async fn probe_duration(
        &self,
        url: &str,
        options: &AttemptOptions,
    ) -> Result<Option<f64>, ExtractionError>;

    /// Download the best audio stream of one item.
    async fn download(
        &self,
        url: &str,
        options: &AttemptOptions,
    ) -> Result<AttemptBundle, ExtractionError>;
}
