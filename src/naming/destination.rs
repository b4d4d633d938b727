use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::audio::tags::TagSet;
use crate::naming::normalize::{clean_file_name, short_hash};
use crate::utils::file_ops::FileManager;
use crate::Result;

pub const TARGET_EXTENSION: &str = "mp3";

/// Where a track lives in the converted library:
/// `<root>/<directory_name>/<file_name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DestinationKey {
    pub directory_name: String,
    pub file_name: String,
}

impl DestinationKey {
    /// Same tags, same key. The three-digit suffix tells apart tracks that
    /// share artist and title but differ in album or track number; distinct
    /// tracks can still collide on it.
    pub fn resolve(tags: &TagSet) -> Self {
        let suffix = short_hash(&[
            tags.artist(),
            tags.album(),
            tags.title(),
            tags.track_number(),
        ]);
        Self {
            directory_name: clean_file_name(tags.artist()),
            file_name: format!(
                "{}-{}.{}",
                clean_file_name(tags.title()),
                suffix,
                TARGET_EXTENSION
            ),
        }
    }

    pub fn directory(&self, root: impl AsRef<Path>) -> PathBuf {
        root.as_ref().join(&self.directory_name)
    }

    pub fn path_under(&self, root: impl AsRef<Path>) -> PathBuf {
        self.directory(root).join(&self.file_name)
    }
}

/// Creates `dest_dir` unless `dry_run`, then reports whether
/// `dest_dir/dest_file` already exists.
pub fn check_existence(dest_dir: &Path, dest_file: &str, dry_run: bool) -> Result<bool> {
    FileManager::new(dry_run).ensure_directory(dest_dir)?;
    Ok(dest_dir.join(dest_file).exists())
}
