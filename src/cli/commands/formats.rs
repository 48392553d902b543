//! Formats command implementation.

use crate::catalog::{watch_url, Link};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::extract::list_formats;
use anyhow::Result;

/// Print the yt-dlp format table of a single video.
pub async fn run_formats(url: &str, settings: &Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Formats, settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let target = match Link::parse(url)? {
        Link::Video(id) => watch_url(&id),
        other => {
            Output::error(&format!("{} is not a single video", other));
            return Err(anyhow::anyhow!("formats needs a video link"));
        }
    };

    let spinner = Output::spinner("Fetching formats...");
    let table = list_formats(&target).await;
    spinner.finish_and_clear();

    println!("{}", table?);
    Ok(())
}
