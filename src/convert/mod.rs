//! Transcoding, cover embedding and tagging of downloaded items.

mod ffmpeg;
mod scheme;
mod tags;
mod thumbnail;

pub use ffmpeg::{bitrate_kbps, build_args, probe_bitrate};
pub use scheme::{
    resolve, resolve_scheme, AudioCodec, Container, ConversionScheme, ImageCodec, TargetFormat,
};
pub use tags::{embed_cover, write_tags};
pub use thumbnail::prepare_cover;

use crate::error::ConversionError;
use crate::extract::AttemptBundle;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

/// Turns a downloaded bundle into a finished, tagged file.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the path of the finished file.
    async fn convert(&self, bundle: &AttemptBundle) -> Result<PathBuf, ConversionError>;
}

/// What the conversion step produces.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub target: TargetFormat,
    pub write_thumbnail: bool,
    pub write_metadata: bool,
    /// Longest cover edge in pixels; `None` keeps the original size.
    pub thumbnail_max_edge: Option<u32>,
}

/// [`Transcoder`] backed by ffmpeg, ffprobe and lofty.
pub struct FfmpegTranscoder {
    options: ConvertOptions,
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegTranscoder {
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }

    /// Use different ffmpeg/ffprobe executables.
    pub fn with_programs(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    /// Cover bytes for the bundle, or `None` when no cover is embedded.
    fn cover(&self, bundle: &AttemptBundle) -> Option<Vec<u8>> {
        if !self.options.write_thumbnail {
            return None;
        }
        let path = bundle.thumbnail_path.as_ref()?;
        match prepare_cover(path, self.options.thumbnail_max_edge) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Skipping cover {:?}: {}", path, e);
                None
            }
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    #[instrument(skip_all, fields(source = ?bundle.audio_path))]
    async fn convert(&self, bundle: &AttemptBundle) -> Result<PathBuf, ConversionError> {
        let (output, scheme) = resolve(
            &bundle.audio_path,
            self.options.target,
            self.options.write_thumbnail,
        )
        .ok_or_else(|| {
            ConversionError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("no output location for {:?}", bundle.audio_path),
            ))
        })?;
        debug!("Scheme {:?} -> {:?}", scheme, output);

        let bitrate = if scheme.needs_bitrate_probe {
            Some(probe_bitrate(&self.ffprobe, &bundle.audio_path).await?)
        } else {
            None
        };

        // ffmpeg attaches the cover where the container takes a picture stream;
        // opus gets it as a tag picture once the file exists.
        let (attached, tagged_cover) = match (self.cover(bundle), scheme.image_codec) {
            (Some(cover), Some(_)) => (Some(cover), None),
            (cover, None) => (None, cover),
            (None, Some(_)) => (None, None),
        };
        let args = build_args(&bundle.audio_path, &output, &scheme, bitrate, attached.is_some());
        ffmpeg::run_ffmpeg(&self.ffmpeg, &args, attached).await?;

        match (&bundle.metadata, scheme.container) {
            (Some(metadata), Some(_)) if self.options.write_metadata => {
                write_tags(&output, metadata)?;
            }
            (Some(_), None) if self.options.write_metadata => {
                warn!("No tag mapping for passthrough file {:?}, leaving it untagged", output);
            }
            _ => {}
        }

        if let (Some(cover), Some(Container::Opus)) = (tagged_cover, scheme.container) {
            embed_cover(&output, cover)?;
        }

        info!("Converted {:?}", output);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(target: TargetFormat) -> ConvertOptions {
        ConvertOptions {
            target,
            write_thumbnail: true,
            write_metadata: true,
            thumbnail_max_edge: Some(300),
        }
    }

    #[test]
    fn test_cover_follows_write_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let thumb = dir.path().join("a.png");
        image::RgbImage::new(10, 10).save(&thumb).unwrap();

        let bundle = AttemptBundle {
            audio_path: dir.path().join("tmp/a.webm"),
            thumbnail_path: Some(thumb),
            metadata: None,
            bitrate_eligible: true,
        };

        let opus = FfmpegTranscoder::new(options(TargetFormat::Opus));
        let cover = opus.cover(&bundle).unwrap();
        assert_eq!(&cover[1..4], b"PNG");
        // Opus covers never go through ffmpeg.
        assert!(resolve_scheme("webm", TargetFormat::Opus, true).image_codec.is_none());

        let mut no_thumb = options(TargetFormat::M4a);
        no_thumb.write_thumbnail = false;
        assert!(FfmpegTranscoder::new(no_thumb).cover(&bundle).is_none());

        let missing = AttemptBundle {
            thumbnail_path: None,
            ..bundle
        };
        assert!(opus.cover(&missing).is_none());
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tmp")).unwrap();
        let audio = dir.path().join("tmp/a.m4a");
        std::fs::write(&audio, b"data").unwrap();

        let transcoder = FfmpegTranscoder::new(options(TargetFormat::M4a))
            .with_programs("ytaudio-no-ffmpeg", "ytaudio-no-ffprobe");
        let bundle = AttemptBundle {
            audio_path: audio,
            thumbnail_path: None,
            metadata: None,
            bitrate_eligible: true,
        };

        let err = transcoder.convert(&bundle).await.unwrap_err();
        assert!(matches!(err, ConversionError::ToolNotFound(ref p) if p == "ytaudio-no-ffmpeg"));
    }
}
