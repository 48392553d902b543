//! YouTube Data API v3 catalog.

use super::{watch_url, CandidateItem, Catalog, CatalogResolver, ChannelRef, Link};
use crate::error::CatalogError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Page size accepted by the `playlistItems` endpoint.
const PAGE_SIZE: &str = "50";

/// Upper bound on pages fetched for one playlist.
const MAX_PAGES: usize = 2000;

/// Follows `nextPageToken` and stops on a repeated token or past [`MAX_PAGES`].
#[derive(Debug, Default)]
struct PageCursor {
    seen: HashSet<String>,
    pages: usize,
}

impl PageCursor {
    /// Record a fetched page. Returns the token of the next request, or `None`
    /// when paging is over.
    fn advance(&mut self, next: Option<String>) -> Option<String> {
        self.pages += 1;
        let token = next?;
        if self.pages >= MAX_PAGES {
            warn!("Stopping after {} pages", self.pages);
            return None;
        }
        if !self.seen.insert(token.clone()) {
            warn!("Page token {} came back twice, stopping", token);
            return None;
        }
        Some(token)
    }
}

/// Catalog backed by the YouTube Data API.
pub struct YoutubeApiCatalog {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl YoutubeApiCatalog {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CatalogError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a catalog against a different API root.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(CatalogError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(format!("{} ({})", endpoint, status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api(format!("{} returned {}: {}", endpoint, status, body)));
        }

        Ok(response.json::<T>().await?)
    }

    /// Fetch a single video as a one-item catalog.
    #[instrument(skip(self))]
    async fn video(&self, video_id: &str) -> Result<Catalog, CatalogError> {
        let page: ListResponse<VideoResource> = self
            .get("videos", &[("part", "snippet"), ("id", video_id)])
            .await?;

        let video = page
            .items
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::NotFound(format!("video {}", video_id)))?;

        Ok(Catalog {
            name: None,
            items: vec![CandidateItem {
                title: video.snippet.title,
                url: watch_url(&video.id),
                published_at: video.snippet.published_at,
            }],
        })
    }

    /// Title of a playlist.
    async fn playlist_title(&self, playlist_id: &str) -> Result<String, CatalogError> {
        let page: ListResponse<PlaylistResource> = self
            .get("playlists", &[("part", "snippet"), ("id", playlist_id)])
            .await?;

        page.items
            .into_iter()
            .next()
            .map(|p| p.snippet.title)
            .ok_or_else(|| CatalogError::NotFound(format!("playlist {}", playlist_id)))
    }

    /// Every item of a playlist, following `nextPageToken`.
    #[instrument(skip(self))]
    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<CandidateItem>, CatalogError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        let mut cursor = PageCursor::default();

        loop {
            let mut params = vec![
                ("part", "snippet,contentDetails"),
                ("playlistId", playlist_id),
                ("maxResults", PAGE_SIZE),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.as_str()));
            }

            let page: ListResponse<PlaylistItemResource> =
                self.get("playlistItems", &params).await?;
            items.extend(page.items.into_iter().map(PlaylistItemResource::into_candidate));

            match cursor.advance(page.next_page_token) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Playlist {} has {} items", playlist_id, items.len());
        Ok(items)
    }

    /// Resolve a channel into (title, uploads playlist id).
    async fn channel_uploads(&self, channel: &ChannelRef) -> Result<(String, String), CatalogError> {
        let (key, value) = match channel {
            ChannelRef::Id(id) => ("id", id.as_str()),
            ChannelRef::Handle(handle) => ("forHandle", handle.as_str()),
        };

        let page: ListResponse<ChannelResource> = self
            .get("channels", &[("part", "snippet,contentDetails"), (key, value)])
            .await?;

        let channel_res = page
            .items
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::NotFound(format!("channel {}", value)))?;

        Ok((
            channel_res.snippet.title,
            channel_res.content_details.related_playlists.uploads,
        ))
    }
}

#[async_trait]
impl CatalogResolver for YoutubeApiCatalog {
    async fn list_items(&self, link: &Link) -> Result<Catalog, CatalogError> {
        info!("Resolving {}", link);
        match link {
            Link::Video(id) => self.video(id).await,
            Link::Playlist(id) => {
                let name = self.playlist_title(id).await?;
                let items = self.playlist_items(id).await?;
                Ok(Catalog {
                    name: Some(name),
                    items,
                })
            }
            Link::Channel(channel) => {
                let (name, uploads) = self.channel_uploads(channel).await?;
                let items = self.playlist_items(&uploads).await?;
                Ok(Catalog {
                    name: Some(name),
                    items,
                })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistResource {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemResource {
    snippet: PlaylistItemSnippet,
    content_details: Option<PlaylistItemDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemSnippet {
    title: String,
    published_at: DateTime<Utc>,
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
    video_published_at: Option<DateTime<Utc>>,
}

impl PlaylistItemResource {
    /// The video's own publication date wins over the date it was added.
    fn into_candidate(self) -> CandidateItem {
        let published_at = self
            .content_details
            .and_then(|d| d.video_published_at)
            .unwrap_or(self.snippet.published_at);

        CandidateItem {
            title: self.snippet.title,
            url: watch_url(&self.snippet.resource_id.video_id),
            published_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelResource {
    snippet: ChannelSnippet,
    content_details: ChannelDetails,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_page_cursor_stops_on_repeat() {
        let mut cursor = PageCursor::default();
        assert_eq!(cursor.advance(Some("A".into())).as_deref(), Some("A"));
        assert_eq!(cursor.advance(Some("B".into())).as_deref(), Some("B"));
        assert_eq!(cursor.advance(Some("A".into())), None);
    }

    #[test]
    fn test_page_cursor_limits() {
        let mut cursor = PageCursor::default();
        assert_eq!(cursor.advance(None), None);

        let mut cursor = PageCursor::default();
        let mut pages = 0;
        while cursor.advance(Some(format!("token{}", pages))).is_some() {
            pages += 1;
        }
        assert_eq!(pages, MAX_PAGES - 1);
    }

    #[test]
    fn test_missing_api_key() {
        assert!(matches!(
            YoutubeApiCatalog::new(""),
            Err(CatalogError::MissingApiKey)
        ));
    }

    #[test]
    fn test_playlist_page_parsing() {
        let json = r#"{
            "nextPageToken": "CDIQAA",
            "items": [
                {
                    "snippet": {
                        "title": "First",
                        "publishedAt": "2023-01-05T10:00:00Z",
                        "resourceId": { "kind": "youtube#video", "videoId": "aaaaaaaaaaa" }
                    },
                    "contentDetails": {
                        "videoId": "aaaaaaaaaaa",
                        "videoPublishedAt": "2019-03-01T08:00:00Z"
                    }
                },
                {
                    "snippet": {
                        "title": "Private video",
                        "publishedAt": "2023-02-05T10:00:00Z",
                        "resourceId": { "kind": "youtube#video", "videoId": "bbbbbbbbbbb" }
                    },
                    "contentDetails": { "videoId": "bbbbbbbbbbb" }
                }
            ]
        }"#;

        let page: ListResponse<PlaylistItemResource> = serde_json::from_str(json).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("CDIQAA"));

        let items: Vec<CandidateItem> = page
            .items
            .into_iter()
            .map(PlaylistItemResource::into_candidate)
            .collect();

        assert_eq!(items[0].url, "https://www.youtube.com/watch?v=aaaaaaaaaaa");
        assert_eq!(items[0].published_at.year(), 2019);
        assert_eq!(items[1].title, "Private video");
        assert_eq!(items[1].published_at.year(), 2023);
    }

    #[test]
    fn test_empty_page_parsing() {
        let page: ListResponse<VideoResource> =
            serde_json::from_str(r#"{"kind": "youtube#videoListResponse"}"#).unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_channel_parsing() {
        let json = r#"{
            "items": [{
                "snippet": { "title": "Some Artist" },
                "contentDetails": { "relatedPlaylists": { "likes": "", "uploads": "UU0123456789abcdefghijkl" } }
            }]
        }"#;
        let page: ListResponse<ChannelResource> = serde_json::from_str(json).unwrap();
        let channel = &page.items[0];
        assert_eq!(channel.snippet.title, "Some Artist");
        assert_eq!(
            channel.content_details.related_playlists.uploads,
            "UU0123456789abcdefghijkl"
        );
    }
}
