//! Classification of user-supplied links.

use crate::error::AppError;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// A channel is addressed either by its `UC…` id or by its `@handle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    Id(String),
    Handle(String),
}

/// What a link points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    Video(String),
    Playlist(String),
    Channel(ChannelRef),
}

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9A-Za-z_-]{11}$").expect("valid regex"))
}

fn playlist_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9A-Za-z_-]{13,}$").expect("valid regex"))
}

fn channel_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^UC[0-9A-Za-z_-]{22}$").expect("valid regex"))
}

fn is_video_id(s: &str) -> bool {
    video_id_regex().is_match(s)
}

impl Link {
    /// Classify a URL or bare identifier.
    ///
    /// A URL carrying both a video and a playlist (`watch?v=…&list=…`) is a
    /// video.
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let input = input.trim();
        let invalid = || AppError::InvalidInput(format!("Not a video, playlist or channel link: {}", input));

        if input.is_empty() {
            return Err(invalid());
        }

        if !input.contains('/') && !input.contains('?') {
            return Self::parse_bare(input).ok_or_else(invalid);
        }

        let with_scheme = if input.contains("://") {
            input.to_string()
        } else {
            format!("https://{}", input)
        };
        let url = Url::parse(&with_scheme).map_err(|_| invalid())?;
        let host = url.host_str().unwrap_or_default().trim_start_matches("www.");
        let host = host.trim_start_matches("m.").trim_start_matches("music.");

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        if host == "youtu.be" {
            return segments
                .first()
                .filter(|id| is_video_id(id))
                .map(|id| Link::Video(id.to_string()))
                .ok_or_else(invalid);
        }

        if host != "youtube.com" {
            return Err(invalid());
        }

        let query = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        };

        if let Some(v) = query("v").filter(|v| is_video_id(v)) {
            return Ok(Link::Video(v));
        }

        match segments.as_slice() {
            ["shorts" | "embed" | "live" | "v", id, ..] if is_video_id(id) => {
                return Ok(Link::Video(id.to_string()))
            }
            ["channel", id, ..] if channel_id_regex().is_match(id) => {
                return Ok(Link::Channel(ChannelRef::Id(id.to_string())))
            }
            [handle, ..] if handle.starts_with('@') && handle.len() > 1 => {
                return Ok(Link::Channel(ChannelRef::Handle(handle.to_string())))
            }
            _ => {}
        }

        if let Some(list) = query("list").filter(|l| playlist_id_regex().is_match(l)) {
            return Ok(Link::Playlist(list));
        }

        Err(invalid())
    }

    fn parse_bare(input: &str) -> Option<Self> {
        if let Some(handle) = input.strip_prefix('@') {
            return (!handle.is_empty()).then(|| Link::Channel(ChannelRef::Handle(input.to_string())));
        }
        if channel_id_regex().is_match(input) {
            return Some(Link::Channel(ChannelRef::Id(input.to_string())));
        }
        if is_video_id(input) {
            return Some(Link::Video(input.to_string()));
        }
        if playlist_id_regex().is_match(input) {
            return Some(Link::Playlist(input.to_string()));
        }
        None
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Link::Video(id) => write!(f, "video {}", id),
            Link::Playlist(id) => write!(f, "playlist {}", id),
            Link::Channel(ChannelRef::Id(id)) => write!(f, "channel {}", id),
            Link::Channel(ChannelRef::Handle(h)) => write!(f, "channel {}", h),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_links() {
        assert_eq!(
            Link::parse("https://www.youtube.com/watch?v=YYwmlS8wkW0").unwrap(),
            Link::Video("YYwmlS8wkW0".into())
        );
        assert_eq!(
            Link::parse("https://youtu.be/ILpS4Fq3lmw?feature=shared").unwrap(),
            Link::Video("ILpS4Fq3lmw".into())
        );
        assert_eq!(
            Link::parse("youtube.com/shorts/dQw4w9WgXcQ").unwrap(),
            Link::Video("dQw4w9WgXcQ".into())
        );
        assert_eq!(Link::parse("dQw4w9WgXcQ").unwrap(), Link::Video("dQw4w9WgXcQ".into()));
    }

    #[test]
    fn test_playlist_link() {
        assert_eq!(
            Link::parse("https://youtube.com/playlist?list=PL-adxGZ1y-OXzOAXG5gB0pF5g5Pw7jBEG")
                .unwrap(),
            Link::Playlist("PL-adxGZ1y-OXzOAXG5gB0pF5g5Pw7jBEG".into())
        );
    }

    #[test]
    fn test_video_wins_over_playlist() {
        assert_eq!(
            Link::parse(
                "https://www.youtube.com/watch?v=GIGJS6TJ1mY&list=PL-adxGZ1y-OXzOAXG5gB0pF5g5Pw7jBEG"
            )
            .unwrap(),
            Link::Video("GIGJS6TJ1mY".into())
        );
    }

    #[test]
    fn test_channel_links() {
        assert_eq!(
            Link::parse("https://www.youtube.com/@SomeArtist/videos").unwrap(),
            Link::Channel(ChannelRef::Handle("@SomeArtist".into()))
        );
        assert_eq!(
            Link::parse("https://www.youtube.com/channel/UC0123456789abcdefghijkl").unwrap(),
            Link::Channel(ChannelRef::Id("UC0123456789abcdefghijkl".into()))
        );
    }

    #[test]
    fn test_bad_links() {
        assert!(Link::parse("https://www.youtube.com/watch?x=badlink").is_err());
        assert!(Link::parse("https://www.example.com/somepage").is_err());
        assert!(Link::parse("").is_err());
        assert!(Link::parse("short").is_err());
    }
}
