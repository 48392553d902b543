//! ytaudio - YouTube audio downloader
//!
//! Downloads the best audio stream of a video, playlist or channel through
//! yt-dlp and turns it into tagged files with embedded cover art.
//!
//! # Architecture
//!
//! - `catalog` - Link parsing and YouTube Data API listing
//! - `filter` - Date filter and already-downloaded detection
//! - `extract` - yt-dlp extraction engine
//! - `convert` - Format resolution, ffmpeg transcoding, tagging
//! - `orchestrator` - Sequential batch runner with pacing and circuit breaker
//! - `cleanup` - Temporary file removal at the end of a batch
//! - `config` - Configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use ytaudio::config::Settings;
//! use ytaudio::convert::{ConvertOptions, FfmpegTranscoder};
//! use ytaudio::extract::YtDlpExtractor;
//! use ytaudio::orchestrator::{BatchConfig, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let validated = settings.validate()?;
//!
//!     let orchestrator = Orchestrator::new(
//!         Arc::new(YtDlpExtractor::new(Duration::from_secs(900))),
//!         Arc::new(FfmpegTranscoder::new(ConvertOptions {
//!             target: validated.target,
//!             write_thumbnail: true,
//!             write_metadata: true,
//!             thumbnail_max_edge: Some(300),
//!         })),
//!         BatchConfig::from_settings(&settings),
//!         CancellationToken::new(),
//!     );
//!
//!     let urls = vec!["https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string()];
//!     let report = orchestrator.run_batch(urls, &settings.download_dir()).await?;
//!     println!("Saved {} files", report.succeeded.len());
//!
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod filter;
pub mod orchestrator;

pub use error::{AppError, Result};
