//! File type classification for uploaded attachments.
//!
//! Pure and total: a MIME prefix wins first, then the filename extension,
//! and anything unrecognized lands in `Document`. The document category is
//! the deliberate catch-all, not an error.

use crate::entities::ItemType;

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "heic", "avif",
];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "flac", "aac", "opus"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];

/// Map a filename/MIME hint to a content category. Either hint may be
/// empty; `(name: "", mime: "")` classifies as `Document`.
pub fn classify(file_name: &str, mime_type: &str) -> ItemType {
    let mime = mime_type.trim().to_ascii_lowercase();
    if mime.starts_with("image/") {
        return ItemType::Image;
    }
    if mime.starts_with("audio/") {
        return ItemType::Audio;
    }
    if mime.starts_with("video/") {
        return ItemType::Video;
    }

    match extension(file_name) {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => ItemType::Image,
        Some(ext) if AUDIO_EXTENSIONS.contains(&ext.as_str()) => ItemType::Audio,
        Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => ItemType::Video,
        _ => ItemType::Document,
    }
}

fn extension(file_name: &str) -> Option<String> {
    let name = file_name.trim();
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
