use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::converter::ConvertOptions;
use crate::pipeline::{EngineConfig, ProbeEngine};
use crate::{ConvertError, Result};

#[derive(Parser, Debug)]
#[command(name = "mp3-library-converter")]
#[command(version = "1.0")]
#[command(about = "Convert audio files to mp3 named after their tags", long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["file", "dir"])))]
pub struct Cli {
    /// Input file
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Input directory, scanned recursively
    #[arg(long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Destination folder
    #[arg(long, value_name = "PATH")]
    pub dest: PathBuf,

    /// Encoder quality, passed to the encoder as-is
    #[arg(long, default_value_t = ConvertOptions::DEFAULT_QUALITY, allow_negative_numbers = true)]
    pub quality: i32,

    /// Print all tags and read every file to the end
    #[arg(long)]
    pub verbose: bool,

    /// Print planned actions without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Report likely duplicate tracks instead of converting (requires --dir)
    #[arg(long)]
    pub find_dupes: bool,

    /// Directory that suggested duplicate moves point to
    #[arg(long, value_name = "PATH")]
    pub dupes_dir: Option<PathBuf>,

    /// Also write the duplicate report as CSV
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Give up on a file whose pipeline runs longer than this
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Files converted in parallel (0 = one per CPU core)
    #[arg(long, default_value_t = 1)]
    pub jobs: usize,

    /// Engine used to read tags
    #[arg(long, value_enum, default_value_t = ProbeEngine::Native)]
    pub probe_engine: ProbeEngine,

    /// gst-launch executable used for encoding
    #[arg(long, env = "MP3LIB_GST_LAUNCH", default_value = "gst-launch-1.0")]
    pub gst_launch: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    ConvertFile(PathBuf),
    ConvertDirectory(PathBuf),
    FindDuplicates {
        root: PathBuf,
        quarantine: Option<PathBuf>,
        report: Option<PathBuf>,
    },
}

impl Cli {
    pub fn mode(&self) -> Result<Mode> {
        if self.find_dupes {
            let root = self
                .dir
                .clone()
                .ok_or_else(|| ConvertError::Usage("--find-dupes requires --dir".to_string()))?;
            return Ok(Mode::FindDuplicates {
                root,
                quarantine: self.dupes_dir.clone(),
                report: self.report.clone(),
            });
        }
        match (&self.file, &self.dir) {
            (Some(file), None) => Ok(Mode::ConvertFile(file.clone())),
            (None, Some(dir)) => Ok(Mode::ConvertDirectory(dir.clone())),
            _ => Err(ConvertError::Usage(
                "exactly one of --file or --dir is required".to_string(),
            )),
        }
    }

    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            dest_root: self.dest.clone(),
            quality: self.quality,
            verbose: self.verbose,
            dry_run: self.dry_run,
            jobs: self.jobs,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            probe_engine: self.probe_engine,
            gst_launch: self.gst_launch.clone(),
            timeout: self.timeout.map(Duration::from_secs),
        }
    }
}
