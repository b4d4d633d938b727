use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::audio::tags::TagSet;
use crate::converter::ConvertOptions;
use crate::naming::destination::DestinationKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Route {
    /// Source is already MP3; its bytes are copied.
    Copy,
    Transcode,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Copy => f.write_str("copy"),
            Route::Transcode => f.write_str("transcode"),
        }
    }
}

/// One file's planned conversion.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub destination: DestinationKey,
    pub dest_root: PathBuf,
    pub quality: i32,
    pub dry_run: bool,
    pub route: Route,
}

impl ConversionJob {
    pub fn new(source: impl AsRef<Path>, tags: &TagSet, options: &ConvertOptions) -> Self {
        let route = if tags.is_target_codec() {
            Route::Copy
        } else {
            Route::Transcode
        };
        Self {
            source: source.as_ref().to_path_buf(),
            destination: DestinationKey::resolve(tags),
            dest_root: options.dest_root.clone(),
            quality: options.quality,
            dry_run: options.dry_run,
            route,
        }
    }

    pub fn destination_dir(&self) -> PathBuf {
        self.destination.directory(&self.dest_root)
    }

    pub fn destination_path(&self) -> PathBuf {
        self.destination.path_under(&self.dest_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mp3_sources_are_copied() {
        let options = ConvertOptions::new("/library");
        let mp3 = TagSet::new("Band", "Album", "Song", "1", "MPEG-1 Layer 3 (MP3)");
        let flac = TagSet::new("Band", "Album", "Song", "1", "flac");

        assert_eq!(ConversionJob::new("/in/a.mp3", &mp3, &options).route, Route::Copy);
        assert_eq!(ConversionJob::new("/in/a.flac", &flac, &options).route, Route::Transcode);
    }

    #[test]
    fn test_destination_joins_root() {
        let mut options = ConvertOptions::new("/library");
        options.quality = 0;
        let tags = TagSet::new("Band", "Album", "Song", "1", "flac");
        let job = ConversionJob::new("/in/a.flac", &tags, &options);

        assert_eq!(job.destination_dir(), PathBuf::from("/library/Band"));
        assert_eq!(job.destination_path(), PathBuf::from("/library/Band/Song-30c.mp3"));
        assert_eq!(job.quality, 0);
    }
}
