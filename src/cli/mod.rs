//! CLI module for ytaudio.

pub mod commands;
pub mod interrupt;
mod output;
pub mod preflight;

pub use output::{format_duration, Output};

use clap::{Args, Parser, Subcommand};

/// ytaudio - YouTube audio downloader
///
/// Downloads the best audio stream of a video, playlist or channel and turns
/// it into tagged files with embedded cover art.
#[derive(Parser, Debug)]
#[command(name = "ytaudio")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "YTAUDIO_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a video, playlist or channel as audio
    Download(DownloadArgs),

    /// List the formats yt-dlp can fetch for a video
    Formats {
        /// Video URL or ID
        url: String,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options of the download command. Each one overrides the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct DownloadArgs {
    /// Video, playlist or channel URL (or a bare ID / @handle)
    pub url: String,

    /// Target container (opus, m4a, mp3, best)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Library root directory
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Base delay between downloads, in seconds
    #[arg(long)]
    pub delay: Option<f64>,

    /// Publication-year filter, e.g. "2017 < x <= 2024"
    #[arg(long)]
    pub filter_date: Option<String>,

    /// Do not embed the thumbnail as cover art
    #[arg(long)]
    pub no_thumbnail: bool,

    /// Do not write tags
    #[arg(long)]
    pub no_metadata: bool,

    /// Skip shorts
    #[arg(long)]
    pub skip_shorts: bool,

    /// Proxy URL for yt-dlp
    #[arg(long)]
    pub proxy: Option<String>,

    /// Download items even if they are already on disk
    #[arg(long)]
    pub no_skip_downloaded: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
