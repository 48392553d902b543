//! Format resolution.
//!
//! Maps (source container, target container, thumbnail flag) onto the codecs
//! ffmpeg should use. Every supported target has a row for every source; an
//! unsupported target never gets this far because [`TargetFormat`] refuses to
//! parse it.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Container the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Opus,
    M4a,
    Mp3,
    /// Keep whatever the best source stream comes in.
    Best,
}

impl TargetFormat {
    pub const SUPPORTED: &'static [&'static str] = &["opus", "m4a", "mp3", "best"];
}

impl std::str::FromStr for TargetFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "opus" => Ok(TargetFormat::Opus),
            "m4a" => Ok(TargetFormat::M4a),
            "mp3" => Ok(TargetFormat::Mp3),
            "best" => Ok(TargetFormat::Best),
            other => Err(AppError::Config(format!(
                "Audio container not supported: {} (use one of: {})",
                other,
                TargetFormat::SUPPORTED.join(", ")
            ))),
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetFormat::Opus => write!(f, "opus"),
            TargetFormat::M4a => write!(f, "m4a"),
            TargetFormat::Mp3 => write!(f, "mp3"),
            TargetFormat::Best => write!(f, "best"),
        }
    }
}

/// Container family of a finished file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    /// Ogg Opus (`.opus`).
    Opus,
    /// MPEG-4 audio (`.m4a`).
    M4a,
    Mp3,
}

impl Container {
    pub fn extension(self) -> &'static str {
        match self {
            Container::Opus => "opus",
            Container::M4a => "m4a",
            Container::Mp3 => "mp3",
        }
    }

    /// Container family of a source file extension, if recognized.
    pub fn from_source_ext(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "webm" | "opus" | "ogg" => Some(Container::Opus),
            "m4a" | "mp4" | "aac" => Some(Container::M4a),
            "mp3" => Some(Container::Mp3),
            _ => None,
        }
    }

    /// Container family of a finished file.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "opus" => Some(Container::Opus),
            "m4a" => Some(Container::M4a),
            "mp3" => Some(Container::Mp3),
            _ => None,
        }
    }

    fn encoder(self) -> AudioCodec {
        match self {
            Container::Opus => AudioCodec::Libopus,
            Container::M4a => AudioCodec::Aac,
            Container::Mp3 => AudioCodec::Libmp3lame,
        }
    }

    /// Ogg cannot carry an attached-picture video stream.
    fn accepts_attached_picture(self) -> bool {
        !matches!(self, Container::Opus)
    }
}

/// Audio codec argument for ffmpeg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCodec {
    Copy,
    Libopus,
    Aac,
    Libmp3lame,
}

impl AudioCodec {
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            AudioCodec::Copy => "copy",
            AudioCodec::Libopus => "libopus",
            AudioCodec::Aac => "aac",
            AudioCodec::Libmp3lame => "libmp3lame",
        }
    }
}

/// Image codec for the embedded cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageCodec {
    Mjpeg,
}

impl ImageCodec {
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            ImageCodec::Mjpeg => "mjpeg",
        }
    }
}

/// How one item is transcoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversionScheme {
    /// `None` when an unrecognized source is passed through under `best`.
    pub container: Option<Container>,
    pub audio_codec: AudioCodec,
    pub image_codec: Option<ImageCodec>,
    /// Re-encodes pass the source bitrate explicitly instead of the encoder default.
    pub needs_bitrate_probe: bool,
}

/// Resolve the conversion scheme for a source extension.
pub fn resolve_scheme(source_ext: &str, target: TargetFormat, write_thumbnail: bool) -> ConversionScheme {
    let source = Container::from_source_ext(source_ext);

    let (container, audio_codec) = match (target, source) {
        (TargetFormat::Best, source) => (source, AudioCodec::Copy),
        (target, source) => {
            let wanted = match target {
                TargetFormat::Opus => Container::Opus,
                TargetFormat::M4a => Container::M4a,
                TargetFormat::Mp3 => Container::Mp3,
                TargetFormat::Best => unreachable!("handled above"),
            };
            if source == Some(wanted) {
                (Some(wanted), AudioCodec::Copy)
            } else {
                (Some(wanted), wanted.encoder())
            }
        }
    };

    let image_codec = container
        .filter(|c| write_thumbnail && c.accepts_attached_picture())
        .map(|_| ImageCodec::Mjpeg);

    ConversionScheme {
        container,
        audio_codec,
        image_codec,
        needs_bitrate_probe: audio_codec != AudioCodec::Copy,
    }
}

/// Resolve the finished path and scheme for a downloaded file.
///
/// Downloads live in `<dir>/tmp/`; the finished file goes to `<dir>/` with the
/// same stem and the scheme's extension (the source extension on passthrough).
/// Returns `None` when the path has no stem or no grandparent directory.
pub fn resolve(
    audio_path: &Path,
    target: TargetFormat,
    write_thumbnail: bool,
) -> Option<(PathBuf, ConversionScheme)> {
    let ext = audio_path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let scheme = resolve_scheme(ext, target, write_thumbnail);

    let stem = audio_path.file_stem()?;
    let final_dir = audio_path.parent()?.parent()?;
    let mut file_name = stem.to_os_string();
    file_name.push(".");
    file_name.push(scheme.container.map(Container::extension).unwrap_or(ext));

    Some((final_dir.join(file_name), scheme))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_container_is_stream_copy() {
        let scheme = resolve_scheme("m4a", TargetFormat::M4a, true);
        assert_eq!(scheme.audio_codec, AudioCodec::Copy);
        assert!(!scheme.needs_bitrate_probe);
        assert_eq!(scheme.container, Some(Container::M4a));

        let scheme = resolve_scheme("webm", TargetFormat::Opus, false);
        assert_eq!(scheme.audio_codec, AudioCodec::Copy);
        assert_eq!(scheme.container, Some(Container::Opus));
    }

    #[test]
    fn test_cross_container_reencodes_with_probe() {
        let scheme = resolve_scheme("webm", TargetFormat::M4a, true);
        assert_eq!(scheme.audio_codec, AudioCodec::Aac);
        assert!(scheme.needs_bitrate_probe);

        let scheme = resolve_scheme("m4a", TargetFormat::Opus, true);
        assert_eq!(scheme.audio_codec, AudioCodec::Libopus);
        assert!(scheme.needs_bitrate_probe);

        let scheme = resolve_scheme("webm", TargetFormat::Mp3, true);
        assert_eq!(scheme.audio_codec, AudioCodec::Libmp3lame);
        assert!(scheme.needs_bitrate_probe);
        assert_eq!(scheme.image_codec, Some(ImageCodec::Mjpeg));
    }

    #[test]
    fn test_best_keeps_source() {
        let scheme = resolve_scheme("webm", TargetFormat::Best, true);
        assert_eq!(scheme.container, Some(Container::Opus));
        assert_eq!(scheme.audio_codec, AudioCodec::Copy);
        assert!(!scheme.needs_bitrate_probe);

        let scheme = resolve_scheme("m4a", TargetFormat::Best, true);
        assert_eq!(scheme.container, Some(Container::M4a));
        assert_eq!(scheme.audio_codec, AudioCodec::Copy);

        let scheme = resolve_scheme("flac", TargetFormat::Best, true);
        assert_eq!(scheme.container, None);
        assert_eq!(scheme.audio_codec, AudioCodec::Copy);
        assert_eq!(scheme.image_codec, None);
    }

    #[test]
    fn test_opus_never_gets_image_codec() {
        for source in ["webm", "opus", "m4a", "mp3", "wav"] {
            for target in [TargetFormat::Opus, TargetFormat::Best] {
                let scheme = resolve_scheme(source, target, true);
                if scheme.container == Some(Container::Opus) {
                    assert_eq!(scheme.image_codec, None, "{} -> {}", source, target);
                }
            }
        }
        assert_eq!(resolve_scheme("m4a", TargetFormat::Opus, true).image_codec, None);
    }

    #[test]
    fn test_thumbnail_flag_off() {
        assert_eq!(resolve_scheme("m4a", TargetFormat::M4a, false).image_codec, None);
    }

    #[test]
    fn test_resolve_is_pure() {
        let sources = ["webm", "opus", "m4a", "mp4", "mp3", "flac", ""];
        let targets = [TargetFormat::Opus, TargetFormat::M4a, TargetFormat::Mp3, TargetFormat::Best];
        for source in sources {
            for target in targets {
                for thumb in [true, false] {
                    assert_eq!(
                        resolve_scheme(source, target, thumb),
                        resolve_scheme(source, target, thumb)
                    );
                }
            }
        }
    }

    #[test]
    fn test_resolve_output_path() {
        let (out, scheme) =
            resolve(Path::new("/music/List/tmp/Song.webm"), TargetFormat::Best, true).unwrap();
        assert_eq!(out, PathBuf::from("/music/List/Song.opus"));
        assert_eq!(scheme.audio_codec, AudioCodec::Copy);

        let (out, _) =
            resolve(Path::new("/music/tmp/A.B.m4a"), TargetFormat::Mp3, true).unwrap();
        assert_eq!(out, PathBuf::from("/music/A.B.mp3"));

        let (out, _) =
            resolve(Path::new("/music/tmp/Live.flac"), TargetFormat::Best, true).unwrap();
        assert_eq!(out, PathBuf::from("/music/Live.flac"));
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!("OPUS".parse::<TargetFormat>().unwrap(), TargetFormat::Opus);
        assert_eq!("best".parse::<TargetFormat>().unwrap(), TargetFormat::Best);
        assert!("flac".parse::<TargetFormat>().is_err());
        assert!("".parse::<TargetFormat>().is_err());
    }
}
