use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::audio::metadata::TagExtractor;
use crate::audio::transcode::TranscodeOrchestrator;
use crate::converter::job::{ConversionJob, Route};
use crate::converter::ConvertOptions;
use crate::naming::destination::check_existence;
use crate::pipeline::PipelineFactory;
use crate::utils::file_ops::{collect_files, FileManager};
use crate::utils::parallel::{process_with_workers, resolve_jobs};
use crate::{ConvertError, Result};

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Tags could not be read; nothing was written.
    Skipped(String),
    Exists(PathBuf),
    Copied(PathBuf),
    Transcoded(PathBuf),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub transcoded: usize,
    pub copied: usize,
    pub existing: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, path: &Path, outcome: Result<FileOutcome>) {
        match outcome {
            Ok(FileOutcome::Transcoded(_)) => self.transcoded += 1,
            Ok(FileOutcome::Copied(_)) => self.copied += 1,
            Ok(FileOutcome::Exists(_)) => self.existing += 1,
            Ok(FileOutcome::Skipped(_)) => self.skipped += 1,
            Err(e) => {
                error!("Failed to convert {}: {}", path.display(), e);
                self.failed += 1;
            }
        }
    }

    pub fn total(&self) -> usize {
        self.transcoded + self.copied + self.existing + self.skipped + self.failed
    }
}

/// Where the `<src> -> <dest>: <action>` lines go. Clones share one writer,
/// so lines from parallel workers never interleave.
#[derive(Clone)]
pub struct ActionLog {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl ActionLog {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(out))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    fn line(&self, source: &Path, dest: &Path, action: impl fmt::Display) -> Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{} -> {}: {}", source.display(), dest.display(), action)?;
        out.flush()?;
        Ok(())
    }
}

/// The pipelines one thread needs to take a file from tags to MP3.
pub struct ConversionWorker {
    extractor: TagExtractor,
    transcoder: TranscodeOrchestrator,
    actions: ActionLog,
}

impl ConversionWorker {
    pub fn new(factory: &dyn PipelineFactory, actions: ActionLog) -> Self {
        Self {
            extractor: TagExtractor::from_factory(factory),
            transcoder: TranscodeOrchestrator::from_factory(factory),
            actions,
        }
    }

    /// Files whose tags cannot be read are skipped and count as success; a
    /// missing source or a failed copy/encode is returned as an error.
    pub fn process_file(&mut self, path: &Path, options: &ConvertOptions) -> Result<FileOutcome> {
        let tags = match self.extractor.extract_tags(path, options.verbose) {
            Ok(tags) => tags,
            Err(e) if e.is_tag_failure() => {
                warn!("Skipping {}: {}", path.display(), e);
                return Ok(FileOutcome::Skipped(e.to_string()));
            }
            Err(e) => return Err(e),
        };

        let job = ConversionJob::new(path, &tags, options);
        let dest = job.destination_path();

        if check_existence(&job.destination_dir(), &job.destination.file_name, job.dry_run)? {
            self.actions.line(path, &dest, "exists")?;
            return Ok(FileOutcome::Exists(dest));
        }

        self.actions.line(path, &dest, job.route)?;
        if job.dry_run {
            return Ok(planned(job.route, dest));
        }

        let written = match job.route {
            Route::Copy => FileManager::new(false).copy_file(path, &dest).map(|_| ()),
            Route::Transcode => self.transcoder.transcode(path, &dest, job.quality),
        };
        match written {
            Ok(()) => {}
            // Another worker placed the same destination first.
            Err(ConvertError::Io(e)) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{} appeared while converting {}", dest.display(), path.display());
                return Ok(FileOutcome::Exists(dest));
            }
            Err(e) => return Err(e),
        }
        info!("done: {}", dest.display());
        Ok(planned(job.route, dest))
    }
}

fn planned(route: Route, dest: PathBuf) -> FileOutcome {
    match route {
        Route::Copy => FileOutcome::Copied(dest),
        Route::Transcode => FileOutcome::Transcoded(dest),
    }
}

/// Converts a single file or a whole tree into the destination library.
pub struct BatchConverter {
    factory: Arc<dyn PipelineFactory>,
    options: ConvertOptions,
    actions: ActionLog,
    worker: ConversionWorker,
}

impl BatchConverter {
    /// Action lines go to stdout.
    pub fn new(factory: Arc<dyn PipelineFactory>, options: ConvertOptions) -> Self {
        Self::with_actions(factory, options, ActionLog::stdout())
    }

    pub fn with_actions(
        factory: Arc<dyn PipelineFactory>,
        options: ConvertOptions,
        actions: ActionLog,
    ) -> Self {
        let worker = ConversionWorker::new(factory.as_ref(), actions.clone());
        Self {
            factory,
            options,
            actions,
            worker,
        }
    }

    pub fn process_file(&mut self, path: impl AsRef<Path>) -> Result<FileOutcome> {
        self.worker.process_file(path.as_ref(), &self.options)
    }

    /// Converts every file under `root`. Per-file errors are logged and
    /// counted; only a missing `root` fails the call.
    pub fn process_directory(&mut self, root: impl AsRef<Path>) -> Result<BatchSummary> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ConvertError::NotFound(root.to_path_buf()));
        }

        let files = collect_files(root);
        info!("Found {} files under {}", files.len(), root.display());

        let jobs = resolve_jobs(self.options.jobs);
        let outcomes: Vec<(PathBuf, Result<FileOutcome>)> = if jobs <= 1 {
            files
                .iter()
                .map(|path| (path.clone(), self.worker.process_file(path, &self.options)))
                .collect()
        } else {
            let factory = self.factory.as_ref();
            let options = &self.options;
            let actions = &self.actions;
            process_with_workers(
                &files,
                jobs,
                || ConversionWorker::new(factory, actions.clone()),
                |worker, path| (path.clone(), worker.process_file(path, options)),
            )
        };

        let mut summary = BatchSummary::default();
        for (path, outcome) in outcomes {
            summary.record(&path, outcome);
        }
        info!(
            "Processed {} files: {} transcoded, {} copied, {} existing, {} skipped, {} failed",
            summary.total(),
            summary.transcoded,
            summary.copied,
            summary.existing,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }
}
