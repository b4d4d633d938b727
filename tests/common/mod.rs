#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mp3_library_converter::pipeline::{
    Graph, Pipeline, PipelineError, PipelineEvent, PipelineExecutor, PipelineFactory,
    PipelineState, PropertyValue, LOCATION, SINK, SRC,
};
use mp3_library_converter::utils::file_ops::collect_files;

/// Bytes the scripted encoder writes for `source`.
pub fn encoded_bytes(source: &Path) -> Vec<u8> {
    let mut bytes = b"ENCODED:".to_vec();
    bytes.extend(fs::read(source).unwrap_or_default());
    bytes
}

#[derive(Default)]
struct EngineState {
    probes: HashMap<PathBuf, Vec<PipelineEvent>>,
    encodes: HashMap<PathBuf, Vec<PipelineEvent>>,
    rivals: HashMap<PathBuf, PathBuf>,
    transitions: Vec<(Graph, PipelineState)>,
    encoded: Vec<PathBuf>,
    polled: usize,
}

/// An engine that replays per-file event scripts.
///
/// Probing a file with no script reports an engine error, as a real engine
/// would for a file it cannot demux. Encoding a file with no script succeeds.
/// Every encode run writes [`encoded_bytes`] to the sink before its events
/// play, so failed runs leave something to clean up.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    state: Arc<Mutex<EngineState>>,
    timeout: Option<Duration>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn probe_script(&self, path: &Path, events: Vec<PipelineEvent>) {
        self.state
            .lock()
            .unwrap()
            .probes
            .insert(path.to_path_buf(), events);
    }

    /// Scripts a probe that reports `tags` in order, then end-of-stream.
    pub fn tags(&self, path: &Path, tags: &[(&str, &str)]) {
        let mut events: Vec<PipelineEvent> = tags
            .iter()
            .map(|(key, value)| PipelineEvent::tag(*key, *value))
            .collect();
        events.push(PipelineEvent::EndOfStream);
        self.probe_script(path, events);
    }

    pub fn track(&self, path: &Path, artist: &str, album: &str, title: &str, track: &str, codec: &str) {
        self.tags(
            path,
            &[
                ("artist", artist),
                ("album", album),
                ("title", title),
                ("track-number", track),
                ("audio-codec", codec),
            ],
        );
    }

    pub fn encode_script(&self, path: &Path, events: Vec<PipelineEvent>) {
        self.state
            .lock()
            .unwrap()
            .encodes
            .insert(path.to_path_buf(), events);
    }

    /// While `source` is being encoded, another writer creates `dest`.
    pub fn rival_write(&self, source: &Path, dest: &Path) {
        self.state
            .lock()
            .unwrap()
            .rivals
            .insert(source.to_path_buf(), dest.to_path_buf());
    }

    pub fn transitions(&self) -> Vec<(Graph, PipelineState)> {
        self.state.lock().unwrap().transitions.clone()
    }

    pub fn encoded(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().encoded.clone()
    }

    /// Non-empty events handed out so far.
    pub fn polled(&self) -> usize {
        self.state.lock().unwrap().polled
    }

    pub fn executor(&self) -> ScriptedExecutor {
        ScriptedExecutor {
            state: Arc::clone(&self.state),
            graph: None,
            source: None,
            sink: None,
            queue: VecDeque::new(),
        }
    }
}

impl PipelineFactory for ScriptedEngine {
    fn probe_pipeline(&self) -> Pipeline {
        Pipeline::new(Graph::Probe, Box::new(self.executor()))
    }

    fn encode_pipeline(&self) -> Pipeline {
        Pipeline::new(Graph::Encode, Box::new(self.executor()))
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

pub struct ScriptedExecutor {
    state: Arc<Mutex<EngineState>>,
    graph: Option<Graph>,
    source: Option<PathBuf>,
    sink: Option<PathBuf>,
    queue: VecDeque<PipelineEvent>,
}

impl PipelineExecutor for ScriptedExecutor {
    fn construct(&mut self, graph: Graph) -> Result<(), PipelineError> {
        self.graph = Some(graph);
        Ok(())
    }

    fn set_endpoint_property(
        &mut self,
        endpoint: &str,
        key: &str,
        value: PropertyValue,
    ) -> Result<(), PipelineError> {
        match (endpoint, key) {
            (SRC, LOCATION) => self.source = Some(value.as_path()),
            (SINK, LOCATION) => self.sink = Some(value.as_path()),
            _ => {}
        }
        Ok(())
    }

    fn set_state(&mut self, state: PipelineState) -> Result<(), PipelineError> {
        let graph = self.graph.ok_or(PipelineError::NotConstructed)?;
        let mut shared = self.state.lock().unwrap();
        shared.transitions.push((graph, state));
        self.queue.clear();

        if state != PipelineState::Running {
            return Ok(());
        }
        let source = self.source.clone().ok_or(PipelineError::MissingProperty {
            endpoint: SRC,
            key: LOCATION,
        })?;

        match graph {
            Graph::Probe => {
                let script = shared.probes.get(&source).cloned().unwrap_or_else(|| {
                    vec![PipelineEvent::Error(
                        "Could not determine type of stream.".to_string(),
                    )]
                });
                self.queue = script.into();
            }
            Graph::Encode => {
                if let Some(sink) = &self.sink {
                    fs::write(sink, encoded_bytes(&source)).map_err(PipelineError::Spawn)?;
                }
                if let Some(dest) = shared.rivals.get(&source) {
                    fs::write(dest, b"written by another worker").map_err(PipelineError::Spawn)?;
                }
                shared.encoded.push(source.clone());
                let script = shared
                    .encodes
                    .get(&source)
                    .cloned()
                    .unwrap_or_else(|| vec![PipelineEvent::EndOfStream]);
                self.queue = script.into();
            }
        }
        Ok(())
    }

    fn poll_event(&mut self, _wait: Duration) -> PipelineEvent {
        match self.queue.pop_front() {
            Some(event) => {
                self.state.lock().unwrap().polled += 1;
                event
            }
            None => PipelineEvent::None,
        }
    }
}

/// Writes a source file with recognizable content.
pub fn source_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, format!("audio data of {}", name)).unwrap();
    path
}

/// Every file below `root`, relative to it, sorted.
pub fn tree(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = collect_files(root)
        .into_iter()
        .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}

/// A writer whose contents stay readable after it is handed away.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
