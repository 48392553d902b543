//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::{Settings, API_KEY_ENV};
use crate::error::{AppError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Downloading needs the API key and every external tool.
    Download,
    /// Listing formats only needs yt-dlp.
    Formats,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Download => {
            check_api_key(settings)?;
            check_tool("yt-dlp")?;
            check_tool("ffmpeg")?;
            check_tool("ffprobe")?;
        }
        Operation::Formats => {
            check_tool("yt-dlp")?;
        }
    }
    Ok(())
}

/// Check that a YouTube Data API key is configured.
fn check_api_key(settings: &Settings) -> Result<()> {
    match settings.api.youtube_api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => Ok(()),
        _ => Err(AppError::Config(format!(
            "YouTube API key not set. Set it with: export {}='...' or api.youtube_api_key in the config file",
            API_KEY_ENV
        ))),
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    // ffmpeg/ffprobe use -version (single dash), others use --version
    let version_arg = match name {
        "ffmpeg" | "ffprobe" => "-version",
        _ => "--version",
    };
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(AppError::ToolFailed(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AppError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(AppError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_blocks_download() {
        let settings = Settings::default();
        let err = check(Operation::Download, &settings).unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains(API_KEY_ENV)));
    }

    #[test]
    fn test_blank_api_key_rejected() {
        let mut settings = Settings::default();
        settings.api.youtube_api_key = Some("   ".into());
        assert!(check_api_key(&settings).is_err());

        settings.api.youtube_api_key = Some("AIzaSyExample".into());
        assert!(check_api_key(&settings).is_ok());
    }

    #[test]
    fn test_unknown_tool() {
        assert!(matches!(
            check_tool("ytaudio-definitely-missing"),
            Err(AppError::ToolNotFound(_))
        ));
    }
}
