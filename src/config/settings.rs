//! Configuration settings for ytaudio.

use crate::convert::TargetFormat;
use crate::error::{AppError, Result};
use crate::filter::DateFilter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides `api.youtube_api_key`.
pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub download: DownloadSettings,
    pub network: NetworkSettings,
    pub api: ApiSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Download and conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Root directory of the audio library.
    pub download_directory: String,
    /// Target container (opus, m4a, mp3, best).
    pub audio_ext: String,
    /// yt-dlp output template for the downloaded file name.
    pub filename_format: String,
    /// Embed the video thumbnail as cover art.
    pub write_thumbnail: bool,
    /// Write title/artist/date/comment tags.
    pub write_metadata: bool,
    /// Shrink the thumbnail before embedding.
    pub thumbnail_resize: bool,
    /// Longest edge of the embedded thumbnail, in pixels.
    pub thumbnail_max_width: u32,
    /// Base pause between two downloads, in seconds.
    pub delay_between_downloads: f64,
    /// Skip videos no longer than `shorts_max_seconds`.
    pub skip_shorts: bool,
    pub shorts_max_seconds: u64,
    /// Skip items already present on disk.
    pub skip_downloaded: bool,
    /// Look for already-downloaded files under the whole library root.
    pub scan_whole_library: bool,
    /// Boolean expression over the publication year `x`, e.g. `2017 < x <= 2024`.
    pub filter_date: String,
    /// Upper bound for a single extractor call, in seconds.
    pub extract_timeout_secs: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            download_directory: "~/Music/ytaudio".to_string(),
            audio_ext: "opus".to_string(),
            filename_format: "%(title)s.%(ext)s".to_string(),
            write_thumbnail: true,
            write_metadata: true,
            thumbnail_resize: true,
            thumbnail_max_width: 300,
            delay_between_downloads: 13.0,
            skip_shorts: false,
            shorts_max_seconds: 60,
            skip_downloaded: true,
            scan_whole_library: false,
            filter_date: String::new(),
            extract_timeout_secs: 900,
        }
    }
}

/// Outbound network settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NetworkSettings {
    /// Proxy URL passed to yt-dlp (e.g. socks5://127.0.0.1:1080).
    pub proxy: Option<String>,
    /// File with one user agent per line; the built-in pool is used if unset.
    pub user_agents_file: Option<String>,
}

/// YouTube Data API settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApiSettings {
    /// YouTube Data API v3 key.
    pub youtube_api_key: Option<String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Settings>(&content)?
        } else {
            Settings::default()
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                settings.api.youtube_api_key = Some(key);
            }
        }

        Ok(settings)
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ytaudio")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded library root.
    pub fn download_dir(&self) -> PathBuf {
        Self::expand_path(&self.download.download_directory)
    }

    /// Check every option that can be wrong before any network activity starts.
    pub fn validate(&self) -> Result<ValidatedSettings> {
        let target: TargetFormat = self.download.audio_ext.parse()?;
        let date_filter = DateFilter::parse(&self.download.filter_date)?;

        if self.download.delay_between_downloads < 0.0 {
            return Err(AppError::Config(
                "download.delay_between_downloads must not be negative".to_string(),
            ));
        }
        if self.download.thumbnail_resize && self.download.thumbnail_max_width == 0 {
            return Err(AppError::Config(
                "download.thumbnail_max_width must be positive".to_string(),
            ));
        }
        if !self.download.filename_format.contains("%(ext)s") {
            return Err(AppError::Config(
                "download.filename_format must contain the %(ext)s field".to_string(),
            ));
        }

        Ok(ValidatedSettings {
            settings: self.clone(),
            target,
            date_filter,
        })
    }
}

/// Settings whose free-form fields have been parsed and checked.
#[derive(Debug, Clone)]
pub struct ValidatedSettings {
    pub settings: Settings,
    pub target: TargetFormat,
    pub date_filter: Option<DateFilter>,
}
