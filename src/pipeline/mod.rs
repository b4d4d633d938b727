//! Adapter layer over the decode/encode engine.
//!
//! The converter never talks to an engine directly. It drives a
//! [`PipelineExecutor`] through four primitives (construct a graph, set
//! endpoint properties, change state, poll the event bus) and wraps the
//! executor in a [`Pipeline`], which owns it across files and resets it
//! between runs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, warn};
use thiserror::Error;

pub mod launch;
pub mod probe;

pub use launch::LaunchPipeline;
pub use probe::SymphoniaProbe;

/// Endpoint names shared by every graph.
pub const SRC: &str = "src";
pub const SINK: &str = "sink";
pub const ENCODER: &str = "enc";

/// Endpoint property keys.
pub const LOCATION: &str = "location";
pub const QUALITY: &str = "quality";

const POLL_SLICE: Duration = Duration::from_millis(100);
const MAX_STALE_EVENTS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Graph {
    /// `src -> decode -> discard`, used to read tags.
    Probe,
    /// `src -> decode -> convert -> enc -> tag mux -> sink`.
    Encode,
}

impl Graph {
    pub fn name(&self) -> &'static str {
        match self {
            Graph::Probe => "probe",
            Graph::Encode => "encode",
        }
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Int(i64),
    Path(PathBuf),
}

impl PropertyValue {
    pub fn as_path(&self) -> PathBuf {
        match self {
            PropertyValue::Path(path) => path.clone(),
            PropertyValue::Text(text) => PathBuf::from(text),
            PropertyValue::Int(value) => PathBuf::from(value.to_string()),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Text(text) => f.write_str(text),
            PropertyValue::Int(value) => write!(f, "{}", value),
            PropertyValue::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(i64::from(value))
    }
}

impl From<&Path> for PropertyValue {
    fn from(value: &Path) -> Self {
        PropertyValue::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for PropertyValue {
    fn from(value: PathBuf) -> Self {
        PropertyValue::Path(value)
    }
}

/// One message from the engine's bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    TagDiscovered { key: String, value: String },
    EndOfStream,
    Error(String),
    /// Nothing arrived within the poll window.
    None,
}

impl PipelineEvent {
    pub fn tag(key: impl Into<String>, value: impl Into<String>) -> Self {
        PipelineEvent::TagDiscovered {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("graph '{0}' is not supported by this engine")]
    UnsupportedGraph(Graph),
    #[error("pipeline has no graph")]
    NotConstructed,
    #[error("unknown endpoint property {endpoint}.{key}")]
    UnknownEndpoint { endpoint: String, key: String },
    #[error("missing required property {endpoint}.{key}")]
    MissingProperty {
        endpoint: &'static str,
        key: &'static str,
    },
    #[error("failed to start engine: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("timed out waiting for a pipeline event")]
    Timeout,
}

impl PipelineError {
    pub fn unknown_endpoint(endpoint: &str, key: &str) -> Self {
        Self::UnknownEndpoint {
            endpoint: endpoint.to_string(),
            key: key.to_string(),
        }
    }
}

/// The engine primitives the converter relies on.
pub trait PipelineExecutor: Send {
    fn construct(&mut self, graph: Graph) -> Result<(), PipelineError>;

    fn set_endpoint_property(
        &mut self,
        endpoint: &str,
        key: &str,
        value: PropertyValue,
    ) -> Result<(), PipelineError>;

    fn set_state(&mut self, state: PipelineState) -> Result<(), PipelineError>;

    /// Waits at most `wait` for the next bus message.
    fn poll_event(&mut self, wait: Duration) -> PipelineEvent;
}

/// An executor bound to one graph and reused across runs.
///
/// The graph is constructed on first use. Every later run starts with
/// [`Pipeline::reset`], which returns the executor to idle and throws away
/// whatever the previous run left on the bus.
pub struct Pipeline {
    graph: Graph,
    executor: Box<dyn PipelineExecutor>,
    constructed: bool,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(graph: Graph, executor: Box<dyn PipelineExecutor>) -> Self {
        Self {
            graph,
            executor,
            constructed: false,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn prepare(&mut self) -> Result<(), PipelineError> {
        if self.constructed {
            return self.reset();
        }
        debug!("Constructing {} pipeline", self.graph);
        self.executor.construct(self.graph)?;
        self.constructed = true;
        self.state = PipelineState::Idle;
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), PipelineError> {
        self.executor.set_state(PipelineState::Idle)?;
        self.state = PipelineState::Idle;

        let mut drained = 0;
        while drained < MAX_STALE_EVENTS {
            match self.executor.poll_event(Duration::ZERO) {
                PipelineEvent::None => break,
                stale => {
                    debug!("Discarding stale {} event: {:?}", self.graph, stale);
                    drained += 1;
                }
            }
        }
        if drained == MAX_STALE_EVENTS {
            warn!("{} pipeline still had events after {} drains", self.graph, drained);
        }
        Ok(())
    }

    pub fn set_property(
        &mut self,
        endpoint: &str,
        key: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), PipelineError> {
        self.executor.set_endpoint_property(endpoint, key, value.into())
    }

    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.executor.set_state(PipelineState::Running)?;
        self.state = PipelineState::Running;
        Ok(())
    }

    /// Stops the run. Never fails: a stop error is logged and the pipeline
    /// is considered stopped regardless.
    pub fn stop(&mut self) {
        if let Err(e) = self.executor.set_state(PipelineState::Stopped) {
            warn!("Failed to stop {} pipeline: {}", self.graph, e);
        }
        self.state = PipelineState::Stopped;
    }

    /// Blocks until the bus yields an event or `deadline` passes.
    pub fn next_event(&mut self, deadline: Option<Instant>) -> Result<PipelineEvent, PipelineError> {
        loop {
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PipelineError::Timeout);
                    }
                    (deadline - now).min(POLL_SLICE)
                }
                None => POLL_SLICE,
            };
            match self.executor.poll_event(wait) {
                PipelineEvent::None => continue,
                event => return Ok(event),
            }
        }
    }
}

/// Which engine reads tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProbeEngine {
    /// In-process demuxing with symphonia
    Native,
    /// `gst-launch-1.0 -t`
    Gstreamer,
}

/// Builds the pipelines one worker needs.
pub trait PipelineFactory: Send + Sync {
    fn probe_pipeline(&self) -> Pipeline;
    fn encode_pipeline(&self) -> Pipeline;
    /// Deadline applied to every pipeline run, if any.
    fn timeout(&self) -> Option<Duration>;
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub probe_engine: ProbeEngine,
    pub gst_launch: PathBuf,
    pub timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_engine: ProbeEngine::Native,
            gst_launch: PathBuf::from(launch::DEFAULT_PROGRAM),
            timeout: None,
        }
    }
}

impl PipelineFactory for EngineConfig {
    fn probe_pipeline(&self) -> Pipeline {
        let executor: Box<dyn PipelineExecutor> = match self.probe_engine {
            ProbeEngine::Native => Box::new(SymphoniaProbe::new()),
            ProbeEngine::Gstreamer => Box::new(LaunchPipeline::new(&self.gst_launch)),
        };
        Pipeline::new(Graph::Probe, executor)
    }

    fn encode_pipeline(&self) -> Pipeline {
        Pipeline::new(Graph::Encode, Box::new(LaunchPipeline::new(&self.gst_launch)))
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Keeps its queue across state changes, like an engine whose bus
    /// still holds messages from the last run.
    struct LeakyExecutor {
        queue: VecDeque<PipelineEvent>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl PipelineExecutor for LeakyExecutor {
        fn construct(&mut self, graph: Graph) -> Result<(), PipelineError> {
            self.log.lock().unwrap().push(format!("construct {}", graph));
            Ok(())
        }

        fn set_endpoint_property(
            &mut self,
            endpoint: &str,
            key: &str,
            value: PropertyValue,
        ) -> Result<(), PipelineError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}.{}={}", endpoint, key, value));
            Ok(())
        }

        fn set_state(&mut self, state: PipelineState) -> Result<(), PipelineError> {
            self.log.lock().unwrap().push(format!("{:?}", state));
            Ok(())
        }

        fn poll_event(&mut self, _wait: Duration) -> PipelineEvent {
            self.queue.pop_front().unwrap_or(PipelineEvent::None)
        }
    }

    fn leaky(events: Vec<PipelineEvent>) -> (Pipeline, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let executor = LeakyExecutor {
            queue: events.into(),
            log: Arc::clone(&log),
        };
        (Pipeline::new(Graph::Probe, Box::new(executor)), log)
    }

    #[test]
    fn test_graph_is_constructed_once() {
        let (mut pipeline, log) = leaky(Vec::new());
        pipeline.prepare().unwrap();
        pipeline.prepare().unwrap();
        pipeline.prepare().unwrap();

        let constructs = log
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.starts_with("construct"))
            .count();
        assert_eq!(constructs, 1);
    }

    #[test]
    fn test_reset_drains_stale_events() {
        let (mut pipeline, _log) = leaky(vec![
            PipelineEvent::tag("artist", "Stale"),
            PipelineEvent::EndOfStream,
        ]);
        pipeline.prepare().unwrap();
        pipeline.reset().unwrap();

        assert_eq!(pipeline.state(), PipelineState::Idle);
        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(matches!(pipeline.next_event(Some(deadline)), Err(PipelineError::Timeout)));
    }

    #[test]
    fn test_next_event_skips_empty_polls() {
        let (mut pipeline, _log) = leaky(vec![PipelineEvent::None, PipelineEvent::EndOfStream]);
        pipeline.prepare().unwrap();
        pipeline.start().unwrap();
        assert_eq!(pipeline.next_event(None).unwrap(), PipelineEvent::EndOfStream);
    }

    #[test]
    fn test_stop_marks_pipeline_stopped() {
        let (mut pipeline, log) = leaky(Vec::new());
        pipeline.prepare().unwrap();
        pipeline.set_property(SRC, LOCATION, Path::new("/music/a.flac")).unwrap();
        pipeline.start().unwrap();
        pipeline.stop();

        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "construct probe".to_string(),
                "src.location=/music/a.flac".to_string(),
                "Running".to_string(),
                "Stopped".to_string(),
            ]
        );
    }
}
