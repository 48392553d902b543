//! Tag writing.
//!
//! Each finished container has exactly one tag scheme:
//!
//! | container | scheme          |
//! |-----------|-----------------|
//! | opus      | Vorbis comments |
//! | m4a       | MP4 ilst        |
//! | mp3       | ID3v2           |
//!
//! Ogg cannot carry an attached-picture stream, so opus covers go in as a
//! Vorbis `METADATA_BLOCK_PICTURE` through [`embed_cover`].

use super::scheme::Container;
use crate::error::TagError;
use crate::extract::Metadata;
use lofty::config::{ParseOptions, WriteOptions};
use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagType};
use std::path::Path;
use tracing::debug;

/// Tag scheme used for a container.
pub fn tag_type_for(container: Container) -> TagType {
    match container {
        Container::Opus => TagType::VorbisComments,
        Container::M4a => TagType::Mp4Ilst,
        Container::Mp3 => TagType::Id3v2,
    }
}

/// `YYYYMMDD` becomes `YYYY-MM-DD`; anything else passes through.
pub fn format_date(raw: &str) -> String {
    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..])
    } else {
        raw.to_string()
    }
}

/// Write title, artist, date and comment into a finished file.
///
/// Existing tags of the same scheme are updated in place, so an embedded cover
/// already written by ffmpeg survives.
pub fn write_tags(path: &Path, metadata: &Metadata) -> Result<(), TagError> {
    let (mut tagged, tag_type) = open_tagged(path)?;
    let tag = tagged
        .tag_mut(tag_type)
        .ok_or_else(|| TagError::UnsupportedContainer(path.to_path_buf()))?;

    apply(tag, metadata);
    tagged.save_to_path(path, WriteOptions::default())?;

    debug!("Tagged {:?} ({:?})", path, tag_type);
    Ok(())
}

/// Store `png` as the front cover of a finished file, replacing any previous one.
pub fn embed_cover(path: &Path, png: Vec<u8>) -> Result<(), TagError> {
    let (mut tagged, tag_type) = open_tagged(path)?;
    let tag = tagged
        .tag_mut(tag_type)
        .ok_or_else(|| TagError::UnsupportedContainer(path.to_path_buf()))?;

    tag.remove_picture_type(PictureType::CoverFront);
    tag.push_picture(Picture::new_unchecked(
        PictureType::CoverFront,
        Some(MimeType::Png),
        None,
        png,
    ));
    tagged.save_to_path(path, WriteOptions::default())?;

    debug!("Embedded cover in {:?}", path);
    Ok(())
}

/// Read a finished file for tag updates, adding an empty tag of its scheme if needed.
fn open_tagged(path: &Path) -> Result<(TaggedFile, TagType), TagError> {
    let container =
        Container::from_path(path).ok_or_else(|| TagError::UnsupportedContainer(path.to_path_buf()))?;
    let tag_type = tag_type_for(container);

    // Audio properties are not needed to rewrite tags.
    let mut tagged = Probe::open(path)?
        .options(ParseOptions::new().read_properties(false))
        .read()?;
    if tagged.tag(tag_type).is_none() {
        tagged.insert_tag(Tag::new(tag_type));
    }
    Ok((tagged, tag_type))
}

fn apply(tag: &mut Tag, metadata: &Metadata) {
    if !metadata.title.is_empty() {
        tag.set_title(metadata.title.clone());
    }
    if !metadata.artist.is_empty() {
        tag.set_artist(metadata.artist.clone());
    }
    if !metadata.date.is_empty() {
        tag.insert_text(ItemKey::RecordingDate, format_date(&metadata.date));
    }
    if !metadata.comment.is_empty() {
        tag.set_comment(metadata.comment.clone());
    }
}
