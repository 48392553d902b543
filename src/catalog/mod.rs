//! Catalog resolution.
//!
//! Turns a user-supplied link into an ordered list of candidate items. The
//! [`CatalogResolver`] trait is the seam; [`YoutubeApiCatalog`] implements it
//! against the YouTube Data API.

mod link;
mod youtube;

pub use link::{ChannelRef, Link};
pub use youtube::YoutubeApiCatalog;

use crate::error::CatalogError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One downloadable entry of a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub title: String,
    /// Canonical watch URL.
    pub url: String,
    pub published_at: DateTime<Utc>,
}

/// The items behind a link, in catalog order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Playlist or channel title. `None` for a single video.
    pub name: Option<String>,
    pub items: Vec<CandidateItem>,
}

/// Source of catalogs.
#[async_trait]
pub trait CatalogResolver: Send + Sync {
    /// List every item behind a link. Pagination is handled internally.
    async fn list_items(&self, link: &Link) -> Result<Catalog, CatalogError>;
}

/// Build the canonical watch URL for a video id.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}
