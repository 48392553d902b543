//! Cover preparation.

use crate::error::ConversionError;
use image::imageops::FilterType;
use image::ImageFormat;
use std::io::Cursor;
use std::path::Path;

/// Load a thumbnail and re-encode it as PNG for piping into ffmpeg.
///
/// With `max_edge`, images larger than the bound are shrunk so their longest
/// edge fits; smaller images are never upscaled.
pub fn prepare_cover(path: &Path, max_edge: Option<u32>) -> Result<Vec<u8>, ConversionError> {
    let mut img = image::open(path)?;

    if let Some(bound) = max_edge {
        if img.width() > bound || img.height() > bound {
            img = img.resize(bound, bound, FilterType::Lanczos3);
        }
    }

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbImage};

    fn write_image(dir: &Path, w: u32, h: u32) -> std::path::PathBuf {
        let path = dir.join("cover.png");
        RgbImage::new(w, h).save(&path).unwrap();
        path
    }

    #[test]
    fn test_shrinks_to_longest_edge() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(dir.path(), 1280, 720);

        let png = prepare_cover(&path, Some(300)).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.dimensions().0, 300);
        assert!(img.dimensions().1 <= 300);
    }

    #[test]
    fn test_never_upscales() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(dir.path(), 120, 90);

        let png = prepare_cover(&path, Some(300)).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.dimensions(), (120, 90));
    }

    #[test]
    fn test_resize_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(dir.path(), 640, 480);

        let png = prepare_cover(&path, None).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.dimensions(), (640, 480));
    }

    #[test]
    fn test_unreadable_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        assert!(matches!(
            prepare_cover(&path, Some(300)),
            Err(ConversionError::Thumbnail(_))
        ));
    }
}
