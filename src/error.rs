//! Error types for ytaudio.

use std::path::PathBuf;
use thiserror::Error;

/// Library-level error type for ytaudio operations.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),
}

/// Errors raised while resolving an identifier into a list of items.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("YouTube API error: {0}")]
    Api(String),

    #[error("YouTube API key is not configured (set YOUTUBE_API_KEY or api.youtube_api_key)")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from a single extraction-engine call.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Remote service is rate limiting or blocking requests: {0}")]
    RateLimited(String),

    #[error("Media unavailable: {0}")]
    Unavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Extraction timed out after {0}s")]
    Timeout(u64),

    #[error("Extractor finished without reporting an output file")]
    MissingOutput,

    #[error("Extraction failed: {0}")]
    Failed(String),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),
}

impl ExtractionError {
    /// Whether this error is a direct sign of an upstream bot-block.
    pub fn is_block_signal(&self) -> bool {
        matches!(self, ExtractionError::RateLimited(_))
    }
}

/// Errors from the transcode and tag pipeline.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("ffmpeg exited with status {status}: {stderr}")]
    Transcoder { status: i32, stderr: String },

    #[error("Bitrate probe failed: {0}")]
    Probe(String),

    #[error("Thumbnail processing failed: {0}")]
    Thumbnail(#[from] image::ImageError),

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),
}

/// Errors from writing tags into a finished container.
#[derive(Error, Debug)]
pub enum TagError {
    #[error("No tag mapping for container {0:?}")]
    UnsupportedContainer(PathBuf),

    #[error("Tag write failed: {0}")]
    Lofty(#[from] lofty::error::LoftyError),
}

/// Errors from the item filter and its date expression.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Date filter must not exceed {max} characters (got {len})")]
    TooLong { len: usize, max: usize },

    #[error("Date filter error at position {pos}: {message}")]
    Expression { pos: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single item failed. The payload of a hard failure.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("Filesystem error: {0}")]
    Filesystem(String),
}

impl ItemError {
    /// Only extraction failures feed the consecutive-failure circuit breaker.
    pub fn counts_toward_block(&self) -> bool {
        matches!(self, ItemError::Extraction(_))
    }

    pub fn is_block_signal(&self) -> bool {
        matches!(self, ItemError::Extraction(e) if e.is_block_signal())
    }
}

/// Result type alias for ytaudio operations.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_extraction_counts_toward_block() {
        let extraction = ItemError::Extraction(ExtractionError::Network("reset".into()));
        let conversion = ItemError::Conversion(ConversionError::Transcoder {
            status: 1,
            stderr: "bad".into(),
        });
        let fs = ItemError::Filesystem("missing".into());

        assert!(extraction.counts_toward_block());
        assert!(!conversion.counts_toward_block());
        assert!(!fs.counts_toward_block());
    }

    #[test]
    fn test_block_signal() {
        assert!(ExtractionError::RateLimited("429".into()).is_block_signal());
        assert!(!ExtractionError::Timeout(10).is_block_signal());

        assert!(ItemError::Extraction(ExtractionError::RateLimited("429".into())).is_block_signal());
        assert!(!ItemError::Extraction(ExtractionError::Unavailable("gone".into())).is_block_signal());
        assert!(!ItemError::Filesystem("x".into()).is_block_signal());
    }
}
