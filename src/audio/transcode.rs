use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::pipeline::{
    Pipeline, PipelineError, PipelineEvent, PipelineFactory, ENCODER, LOCATION, QUALITY, SINK, SRC,
};
use crate::utils::file_ops::{persist, staging_file};
use crate::{ConvertError, Result};

/// Converts one file at a time to MP3 through an encode pipeline.
pub struct TranscodeOrchestrator {
    pipeline: Pipeline,
    timeout: Option<Duration>,
}

impl TranscodeOrchestrator {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            timeout: None,
        }
    }

    pub fn from_factory(factory: &dyn PipelineFactory) -> Self {
        Self::new(factory.encode_pipeline()).with_timeout(factory.timeout())
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Encodes `src` into `dest` at `quality`, which is handed to the
    /// encoder untouched.
    ///
    /// The encoder writes into a staging file beside `dest`; `dest` only
    /// appears after the pipeline reports end-of-stream, with the
    /// permissions of `src`.
    pub fn transcode(
        &mut self,
        src: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        quality: i32,
    ) -> Result<()> {
        let (src, dest) = (src.as_ref(), dest.as_ref());
        if !src.is_file() {
            return Err(ConvertError::NotFound(src.to_path_buf()));
        }

        let staged = staging_file(dest)?;
        let outcome = self.run(src, staged.path(), quality);
        self.pipeline.stop();
        outcome?;

        persist(staged, dest, src)?;
        debug!("Encoded {} -> {}", src.display(), dest.display());
        Ok(())
    }

    fn run(&mut self, src: &Path, staging: &Path, quality: i32) -> Result<()> {
        self.pipeline.prepare()?;
        self.pipeline.set_property(SRC, LOCATION, src)?;
        self.pipeline.set_property(SINK, LOCATION, staging)?;
        self.pipeline.set_property(ENCODER, QUALITY, quality)?;
        self.pipeline.start()?;

        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let seconds = self.timeout.map_or(0, |timeout| timeout.as_secs());

        loop {
            let event = self.pipeline.next_event(deadline).map_err(|e| match e {
                PipelineError::Timeout => ConvertError::Timeout {
                    path: src.to_path_buf(),
                    seconds,
                },
                other => other.into(),
            })?;

            match event {
                PipelineEvent::EndOfStream => return Ok(()),
                PipelineEvent::Error(message) => {
                    return Err(ConvertError::Encode {
                        path: src.to_path_buf(),
                        message,
                    })
                }
                PipelineEvent::TagDiscovered { key, value } => {
                    trace!("{} carries {} = {}", src.display(), key, value)
                }
                PipelineEvent::None => {}
            }
        }
    }
}
