use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::audio::tags::{TagCollector, TagKey, TagSet};
use crate::pipeline::{Pipeline, PipelineError, PipelineEvent, PipelineFactory, LOCATION, SRC};
use crate::{ConvertError, Result};

/// Reads the required tags of one file at a time through a probe pipeline.
///
/// The pipeline is owned and reused; every call resets it first and stops
/// it before returning, whatever the outcome.
pub struct TagExtractor {
    pipeline: Pipeline,
    timeout: Option<Duration>,
}

impl TagExtractor {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            timeout: None,
        }
    }

    pub fn from_factory(factory: &dyn PipelineFactory) -> Self {
        Self::new(factory.probe_pipeline()).with_timeout(factory.timeout())
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Collects artist, album, title, track number and codec for `path`.
    ///
    /// Returns as soon as every tag is known, unless `verbose` is set: then
    /// each discovered tag is printed and the stream is drained to its end.
    pub fn extract_tags(&mut self, path: impl AsRef<Path>, verbose: bool) -> Result<TagSet> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConvertError::NotFound(path.to_path_buf()));
        }

        let outcome = self.run(path, verbose);
        self.pipeline.stop();
        outcome
    }

    fn run(&mut self, path: &Path, verbose: bool) -> Result<TagSet> {
        self.pipeline.prepare()?;
        self.pipeline.set_property(SRC, LOCATION, path)?;
        self.pipeline.start()?;

        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let seconds = self.timeout.map_or(0, |timeout| timeout.as_secs());
        let mut tags = TagCollector::new();

        loop {
            let event = self.pipeline.next_event(deadline).map_err(|e| match e {
                PipelineError::Timeout => ConvertError::Timeout {
                    path: path.to_path_buf(),
                    seconds,
                },
                other => other.into(),
            })?;

            match event {
                PipelineEvent::TagDiscovered { key, value } => {
                    if verbose {
                        println!("{}: {}", key, value);
                    }
                    let Some(tag) = TagKey::from_engine_name(&key) else {
                        trace!("Ignoring tag {} in {}", key, path.display());
                        continue;
                    };
                    if tags.record(tag, value) && !verbose && tags.is_complete() {
                        debug!("All tags found for {}", path.display());
                        return tags.finish();
                    }
                }
                PipelineEvent::Error(message) => {
                    tags.clear();
                    return Err(ConvertError::Extraction {
                        path: path.to_path_buf(),
                        message,
                    });
                }
                PipelineEvent::EndOfStream => {
                    if tags.is_complete() {
                        return tags.finish();
                    }
                    return Err(ConvertError::IncompleteTags {
                        path: path.to_path_buf(),
                        missing: tags.missing(),
                    });
                }
                PipelineEvent::None => {}
            }
        }
    }
}
