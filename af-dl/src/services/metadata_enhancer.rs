//! Best-effort ID3 tagging of produced MP3 files
//!
//! The container is probed with `lofty`; tags are written with the `id3`
//! crate as ID3v2.3 for the widest player compatibility. Callers treat every
//! error as non-fatal.

use id3::{Tag, TagLike, Version};
use lofty::file::FileType;
use lofty::probe::Probe;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Characters stripped from tag text
const DISALLOWED_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Metadata write failure
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not an MP3 file: {}", .0.display())]
    UnsupportedContainer(PathBuf),

    #[error("Tag error: {0}")]
    Tag(#[from] id3::Error),
}

/// Remove characters that are not allowed in filenames
pub fn clean_text(text: &str) -> String {
    text.chars().filter(|c| !DISALLOWED_CHARS.contains(c)).collect()
}

/// Writes title, artist and album frames
#[derive(Debug, Clone)]
pub struct MetadataEnhancer {
    album: String,
}

impl MetadataEnhancer {
    pub fn new(album: impl Into<String>) -> Self {
        Self {
            album: album.into(),
        }
    }

    /// Tag `path` with `title`, `artist` and the configured album
    ///
    /// A file without a tag gets a fresh one. Missing title or artist leave
    /// the corresponding frame untouched.
    pub fn enhance(
        &self,
        path: &Path,
        title: Option<&str>,
        artist: Option<&str>,
    ) -> Result<(), MetadataError> {
        let reader = BufReader::new(File::open(path)?);
        let file_type = Probe::new(reader).guess_file_type()?.file_type();
        if file_type != Some(FileType::Mpeg) {
            return Err(MetadataError::UnsupportedContainer(path.to_path_buf()));
        }

        let mut tag = match Tag::read_from_path(path) {
            Ok(tag) => tag,
            Err(e) if matches!(e.kind, id3::ErrorKind::NoTag) => {
                debug!(file = %path.display(), "No ID3 tag present, creating one");
                Tag::new()
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(title) = title {
            tag.set_title(clean_text(title));
        }
        if let Some(artist) = artist {
            tag.set_artist(clean_text(artist));
        }
        tag.set_album(clean_text(&self.album));

        tag.write_to_path(path, Version::Id3v23)?;
        debug!(file = %path.display(), "ID3 tags written");
        Ok(())
    }
}
