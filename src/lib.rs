use std::path::PathBuf;

pub mod analyzers;
pub mod audio;
pub mod cli;
pub mod converter;
pub mod naming;
pub mod pipeline;
pub mod utils;

use audio::tags::TagKey;
use pipeline::PipelineError;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("File does not exist: \"{}\"", .0.display())]
    NotFound(PathBuf),
    #[error("Could not find all tags in {}: missing {}", path.display(), format_keys(missing))]
    IncompleteTags { path: PathBuf, missing: Vec<TagKey> },
    #[error("Tag extraction failed for {}: {message}", path.display())]
    Extraction { path: PathBuf, message: String },
    #[error("Missing required tag: {0}")]
    MissingField(TagKey),
    #[error("Encoding {} failed: {message}", path.display())]
    Encode { path: PathBuf, message: String },
    #[error("Pipeline for {} did not finish within {seconds}s", path.display())]
    Timeout { path: PathBuf, seconds: u64 },
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("Usage error: {0}")]
    Usage(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ConvertError {
    /// Failures the batch driver and duplicate finder skip past: the file
    /// could not yield a complete tag set in time.
    pub fn is_tag_failure(&self) -> bool {
        matches!(
            self,
            Self::IncompleteTags { .. }
                | Self::Extraction { .. }
                | Self::MissingField(_)
                | Self::Timeout { .. }
        )
    }
}

fn format_keys(keys: &[TagKey]) -> String {
    keys.iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ConvertError>;

// Re-exports for convenience
pub use analyzers::duplicate::{DuplicateFinder, DuplicateReport};
pub use audio::metadata::TagExtractor;
pub use audio::tags::TagSet;
pub use audio::transcode::TranscodeOrchestrator;
pub use converter::batch::{ActionLog, BatchConverter, BatchSummary, FileOutcome};
pub use converter::job::ConversionJob;
pub use naming::destination::DestinationKey;
pub use pipeline::{EngineConfig, Pipeline, PipelineExecutor};
