use std::path::PathBuf;

pub mod batch;
pub mod job;

/// Settings shared by every file of a conversion run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub dest_root: PathBuf,
    pub quality: i32,
    pub verbose: bool,
    pub dry_run: bool,
    pub jobs: usize,
}

impl ConvertOptions {
    pub const DEFAULT_QUALITY: i32 = 3;

    pub fn new(dest_root: impl Into<PathBuf>) -> Self {
        Self {
            dest_root: dest_root.into(),
            quality: Self::DEFAULT_QUALITY,
            verbose: false,
            dry_run: false,
            jobs: 1,
        }
    }
}
