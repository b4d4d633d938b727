//! Graphs executed by an external `gst-launch-1.0` process.
//!
//! The child's stdout and stderr are read on two threads and forwarded
//! line by line over a channel; [`LaunchPipeline::poll_event`] turns those
//! lines into bus events.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    Graph, PipelineError, PipelineEvent, PipelineExecutor, PipelineState, PropertyValue, ENCODER,
    LOCATION, QUALITY, SINK, SRC,
};

pub const DEFAULT_PROGRAM: &str = "gst-launch-1.0";

/// `-t` prints each tag as `<padding><nick>: <value>` under a `FOUND TAG` header.
static TAG_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+([a-z][a-z0-9 -]*): (.*)$").expect("tag line regex"));

#[derive(Debug)]
enum EngineLine {
    Stdout(String),
    Stderr(String),
}

pub struct LaunchPipeline {
    program: PathBuf,
    graph: Option<Graph>,
    source: Option<PathBuf>,
    sink: Option<PathBuf>,
    quality: Option<PropertyValue>,
    child: Option<Child>,
    lines: Option<Receiver<EngineLine>>,
    in_tag_block: bool,
    finished: bool,
}

impl LaunchPipeline {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            graph: None,
            source: None,
            sink: None,
            quality: None,
            child: None,
            lines: None,
            in_tag_block: false,
            finished: false,
        }
    }

    /// The argument vector for the constructed graph.
    pub fn launch_args(&self) -> Result<Vec<OsString>, PipelineError> {
        let graph = self.graph.ok_or(PipelineError::NotConstructed)?;
        let source = self.source.as_deref().ok_or(PipelineError::MissingProperty {
            endpoint: SRC,
            key: LOCATION,
        })?;

        let mut args: Vec<OsString> = Vec::new();
        if graph == Graph::Probe {
            push_all(&mut args, &["-t"]);
        }
        push_all(&mut args, &["filesrc", "name=src"]);
        args.push(location_arg(source));
        push_all(&mut args, &["!", "decodebin"]);

        match graph {
            Graph::Probe => push_all(&mut args, &["!", "fakesink"]),
            Graph::Encode => {
                let sink = self.sink.as_deref().ok_or(PipelineError::MissingProperty {
                    endpoint: SINK,
                    key: LOCATION,
                })?;
                push_all(&mut args, &["!", "audioconvert", "!", "lamemp3enc", "name=enc"]);
                if let Some(quality) = &self.quality {
                    args.push(OsString::from(format!("quality={}", quality)));
                }
                push_all(&mut args, &["!", "id3v2mux", "!", "filesink", "name=sink"]);
                args.push(location_arg(sink));
            }
        }
        Ok(args)
    }

    fn spawn(&mut self) -> Result<(), PipelineError> {
        let args = self.launch_args()?;
        debug!("Launching {} {:?}", self.program.display(), args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(PipelineError::Spawn)?;

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone(), EngineLine::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx, EngineLine::Stderr);
        }

        self.child = Some(child);
        self.lines = Some(rx);
        self.in_tag_block = false;
        self.finished = false;
        Ok(())
    }

    fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                trace!("{} already exited: {}", self.program.display(), e);
            }
            if let Err(e) = child.wait() {
                debug!("Failed to reap {}: {}", self.program.display(), e);
            }
        }
        self.lines = None;
        self.in_tag_block = false;
    }

    /// Both output streams closed: the exit status decides the outcome.
    fn reap(&mut self) -> PipelineEvent {
        self.lines = None;
        self.finished = true;
        let Some(mut child) = self.child.take() else {
            return PipelineEvent::EndOfStream;
        };
        match child.wait() {
            Ok(status) if status.success() => PipelineEvent::EndOfStream,
            Ok(status) => PipelineEvent::Error(format!(
                "{} exited with {}",
                self.program.display(),
                status
            )),
            Err(e) => PipelineEvent::Error(e.to_string()),
        }
    }

    fn interpret(&mut self, line: EngineLine) -> PipelineEvent {
        match line {
            EngineLine::Stdout(line) => {
                if self.in_tag_block {
                    if let Some(captures) = TAG_LINE.captures(&line) {
                        return PipelineEvent::tag(captures[1].replace(' ', "-"), captures[2].trim());
                    }
                    self.in_tag_block = false;
                }
                if line.starts_with("FOUND TAG") {
                    self.in_tag_block = true;
                } else {
                    // "Got EOS from element" is followed by a clean exit; the
                    // exit status is what confirms the sink was flushed.
                    trace!("engine: {}", line);
                }
                PipelineEvent::None
            }
            EngineLine::Stderr(line) => {
                let message = line
                    .strip_prefix("ERROR: ")
                    .or_else(|| line.strip_prefix("WARNING: erroneous pipeline: "));
                match message {
                    Some(message) => {
                        self.finished = true;
                        PipelineEvent::Error(message.to_string())
                    }
                    None => {
                        trace!("engine: {}", line);
                        PipelineEvent::None
                    }
                }
            }
        }
    }
}

impl PipelineExecutor for LaunchPipeline {
    fn construct(&mut self, graph: Graph) -> Result<(), PipelineError> {
        self.kill();
        self.graph = Some(graph);
        Ok(())
    }

    fn set_endpoint_property(
        &mut self,
        endpoint: &str,
        key: &str,
        value: PropertyValue,
    ) -> Result<(), PipelineError> {
        let encoding = self.graph == Some(Graph::Encode);
        match (endpoint, key) {
            (SRC, LOCATION) => self.source = Some(value.as_path()),
            (SINK, LOCATION) if encoding => self.sink = Some(value.as_path()),
            (ENCODER, QUALITY) if encoding => self.quality = Some(value),
            _ => return Err(PipelineError::unknown_endpoint(endpoint, key)),
        }
        Ok(())
    }

    fn set_state(&mut self, state: PipelineState) -> Result<(), PipelineError> {
        self.kill();
        if state == PipelineState::Running {
            self.spawn()?;
        }
        Ok(())
    }

    fn poll_event(&mut self, wait: Duration) -> PipelineEvent {
        if self.finished {
            return PipelineEvent::None;
        }
        let received = match self.lines.as_ref() {
            Some(lines) => lines.recv_timeout(wait),
            None => return PipelineEvent::None,
        };
        match received {
            Ok(line) => self.interpret(line),
            Err(RecvTimeoutError::Timeout) => PipelineEvent::None,
            Err(RecvTimeoutError::Disconnected) => self.reap(),
        }
    }
}

impl Drop for LaunchPipeline {
    fn drop(&mut self) {
        self.kill();
    }
}

fn push_all(args: &mut Vec<OsString>, items: &[&str]) {
    args.extend(items.iter().map(OsString::from));
}

fn location_arg(path: &Path) -> OsString {
    let mut arg = OsString::from("location=");
    arg.push(path);
    arg
}

fn forward_lines<R>(reader: R, tx: Sender<EngineLine>, wrap: fn(String) -> EngineLine)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        for line in BufReader::new(reader).lines() {
            let Ok(line) = line else { break };
            if tx.send(wrap(line)).is_err() {
                break;
            }
        }
    });
}
