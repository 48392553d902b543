//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{Settings, API_KEY_ENV};
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("ytaudio doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("External Tools").bold());
    let tools = [
        check_tool("yt-dlp", "--version", install_hint_ytdlp()),
        check_tool("ffmpeg", "-version", install_hint_ffmpeg()),
        check_tool("ffprobe", "-version", install_hint_ffmpeg()),
    ];
    for check in tools {
        check.print();
        checks.push(check);
    }

    println!();

    println!("{}", style("API Configuration").bold());
    let api_check = check_api_key(settings);
    api_check.print();
    checks.push(api_check);

    println!();

    println!("{}", style("Configuration").bold());
    let config_checks = vec![
        check_config_file(),
        check_settings(settings),
        check_library(settings),
    ];
    for check in &config_checks {
        check.print();
    }
    checks.extend(config_checks);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before downloading.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! ytaudio is ready to use.");
    }

    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str, version_arg: &str, hint: &str) -> CheckResult {
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();
            CheckResult::ok(name, &truncate(&version, 50))
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// Check that a YouTube Data API key is configured.
fn check_api_key(settings: &Settings) -> CheckResult {
    let hint = format!("Set with: export {}='...'", API_KEY_ENV);
    match settings.api.youtube_api_key.as_deref() {
        Some(key) if key.chars().count() > 12 => {
            CheckResult::ok(API_KEY_ENV, &format!("configured ({})", mask_key(key)))
        }
        Some(key) if key.trim().is_empty() => CheckResult::error(API_KEY_ENV, "empty", &hint),
        Some(_) => CheckResult::warning(
            API_KEY_ENV,
            "set but looks too short",
            "YouTube Data API keys are usually 39 characters",
        ),
        None => CheckResult::error(API_KEY_ENV, "not set", &hint),
    }
}

/// First and last four characters of a key.
fn mask_key(key: &str) -> String {
    let head: String = key.chars().take(4).collect();
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("{}...{}", head, tail)
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: ytaudio config edit",
        )
    }
}

/// Check that the configured values validate.
fn check_settings(settings: &Settings) -> CheckResult {
    match settings.validate() {
        Ok(validated) => {
            let filter = validated
                .date_filter
                .as_ref()
                .map(|f| format!(", years {}", f))
                .unwrap_or_default();
            CheckResult::ok("Settings", &format!("target {}{}", validated.target, filter))
        }
        Err(e) => CheckResult::error("Settings", &e.to_string(), "Fix with: ytaudio config edit"),
    }
}

/// Check the library root.
fn check_library(settings: &Settings) -> CheckResult {
    let dir = settings.download_dir();
    if dir.is_dir() {
        CheckResult::ok("Library", &format!("{}", dir.display()))
    } else {
        CheckResult::warning(
            "Library",
            &format!("{} (will be created)", dir.display()),
            "Directory will be created on first download",
        )
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_api_key_states() {
        let mut settings = Settings::default();
        assert_eq!(check_api_key(&settings).status, CheckStatus::Error);

        settings.api.youtube_api_key = Some("short".into());
        assert_eq!(check_api_key(&settings).status, CheckStatus::Warning);

        settings.api.youtube_api_key = Some("AIzaSyA-0123456789abcdefghijklmnopqrs".into());
        let check = check_api_key(&settings);
        assert_eq!(check.status, CheckStatus::Ok);
        assert!(check.message.contains("AIza...pqrs"));
    }

    #[test]
    fn test_mask_non_ascii_key() {
        assert_eq!(mask_key("ключ-0123456789-ключ"), "ключ...ключ");

        let mut settings = Settings::default();
        settings.api.youtube_api_key = Some("ääääääääääääää".into());
        let check = check_api_key(&settings);
        assert_eq!(check.status, CheckStatus::Ok);
        assert!(check.message.contains("ääää...ääää"));
    }

    #[test]
    fn test_bad_settings_reported() {
        let mut settings = Settings::default();
        settings.download.audio_ext = "flac".into();
        assert_eq!(check_settings(&settings).status, CheckStatus::Error);

        settings.download.audio_ext = "m4a".into();
        settings.download.filter_date = "2017 < x".into();
        let check = check_settings(&settings);
        assert_eq!(check.status, CheckStatus::Ok);
        assert!(check.message.contains("m4a"));
    }

    #[test]
    fn test_missing_tool() {
        let check = check_tool("ytaudio-no-such-tool", "--version", "install it");
        assert_eq!(check.status, CheckStatus::Error);
        assert_eq!(check.message, "not found");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
