//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings, config_path: Option<PathBuf>) -> Result<()> {
    let config_path = config_path.unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&redacted(settings))
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Edit => {
            // Create default config if it doesn't exist
            if !config_path.exists() {
                Settings::default().save_to(&config_path)?;
                Output::info(&format!("Created default config at {:?}", config_path));
            }

            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string());
            Output::info(&format!("Opening config in {}...", editor));

            let status = std::process::Command::new(&editor).arg(&config_path).status();

            match status {
                Ok(s) if s.success() => match Settings::load_from(Some(&config_path))
                    .and_then(|s| s.validate())
                {
                    Ok(_) => Output::success("Config saved."),
                    Err(e) => Output::warning(&format!("Config saved but invalid: {}", e)),
                },
                Ok(_) => {
                    Output::warning("Editor exited with non-zero status.");
                }
                Err(e) => {
                    Output::error(&format!("Failed to open editor: {}", e));
                    Output::info(&format!("Config file is at: {:?}", config_path));
                }
            }
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

/// Mask the API key for display.
fn redacted(mut settings: Settings) -> Settings {
    if let Some(key) = settings.api.youtube_api_key.as_mut() {
        let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        *key = format!("****{}", tail);
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_key() {
        let mut settings = Settings::default();
        settings.api.youtube_api_key = Some("AIzaSyA-secret-1234".into());
        let shown = redacted(settings);
        assert_eq!(shown.api.youtube_api_key.as_deref(), Some("****1234"));
    }

    #[test]
    fn test_redacted_without_key() {
        let shown = redacted(Settings::default());
        assert!(shown.api.youtube_api_key.is_none());
    }
}
