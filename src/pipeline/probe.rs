//! In-process probe graph built on symphonia.

use std::collections::VecDeque;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, trace};
use symphonia::core::codecs::{CodecType, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;

use super::{
    Graph, PipelineError, PipelineEvent, PipelineExecutor, PipelineState, PropertyValue, LOCATION,
    SRC,
};

struct ActiveStream {
    format: Box<dyn FormatReader>,
    decoder: Option<Box<dyn Decoder>>,
    track_id: u32,
}

enum Step {
    Continue,
    End,
    Fail(String),
}

/// Runs [`Graph::Probe`] without an external engine.
///
/// Starting the pipeline probes the container and queues every tag it
/// carries, followed by an `audio-codec` tag for the default track. Each
/// later poll decodes one packet, discarding the samples, until the stream
/// ends.
#[derive(Default)]
pub struct SymphoniaProbe {
    constructed: bool,
    location: Option<PathBuf>,
    stream: Option<ActiveStream>,
    pending: VecDeque<PipelineEvent>,
    finished: bool,
}

impl SymphoniaProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn close(&mut self) {
        self.stream = None;
        self.pending.clear();
        self.finished = false;
    }
}

impl PipelineExecutor for SymphoniaProbe {
    fn construct(&mut self, graph: Graph) -> Result<(), PipelineError> {
        match graph {
            Graph::Probe => {
                self.constructed = true;
                Ok(())
            }
            other => Err(PipelineError::UnsupportedGraph(other)),
        }
    }

    fn set_endpoint_property(
        &mut self,
        endpoint: &str,
        key: &str,
        value: PropertyValue,
    ) -> Result<(), PipelineError> {
        match (endpoint, key) {
            (SRC, LOCATION) => {
                self.location = Some(value.as_path());
                Ok(())
            }
            _ => Err(PipelineError::unknown_endpoint(endpoint, key)),
        }
    }

    fn set_state(&mut self, state: PipelineState) -> Result<(), PipelineError> {
        match state {
            PipelineState::Running => {
                if !self.constructed {
                    return Err(PipelineError::NotConstructed);
                }
                let location = self.location.clone().ok_or(PipelineError::MissingProperty {
                    endpoint: SRC,
                    key: LOCATION,
                })?;
                self.close();
                match open_stream(&location, &mut self.pending) {
                    Ok(stream) => self.stream = Some(stream),
                    Err(e) => {
                        debug!("Probe of {} failed: {}", location.display(), e);
                        self.pending.push_back(PipelineEvent::Error(e.to_string()));
                        self.finished = true;
                    }
                }
            }
            PipelineState::Idle | PipelineState::Stopped => self.close(),
        }
        Ok(())
    }

    fn poll_event(&mut self, _wait: Duration) -> PipelineEvent {
        if let Some(event) = self.pending.pop_front() {
            return event;
        }
        if self.finished {
            return PipelineEvent::None;
        }
        let Some(stream) = self.stream.as_mut() else {
            return PipelineEvent::None;
        };

        match decode_next(stream, &mut self.pending) {
            Step::Continue => self.pending.pop_front().unwrap_or(PipelineEvent::None),
            Step::End => {
                self.finished = true;
                self.stream = None;
                PipelineEvent::EndOfStream
            }
            Step::Fail(message) => {
                self.finished = true;
                self.stream = None;
                PipelineEvent::Error(message)
            }
        }
    }
}

fn open_stream(
    path: &Path,
    pending: &mut VecDeque<PipelineEvent>,
) -> Result<ActiveStream, SymphoniaError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let mut probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    // Tags found ahead of the container (ID3v2 on MP3) live on the probe result.
    if let Some(metadata) = probed.metadata.get() {
        if let Some(revision) = metadata.current() {
            queue_revision(revision, pending);
        }
    }

    let mut format = probed.format;
    if let Some(revision) = format.metadata().current() {
        queue_revision(revision, pending);
    }

    let track = format
        .default_track()
        .ok_or(SymphoniaError::Unsupported("no audio track"))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    pending.push_back(PipelineEvent::tag("audio-codec", codec_name(params.codec)));

    let decoder = match symphonia::default::get_codecs().make(&params, &DecoderOptions::default()) {
        Ok(decoder) => Some(decoder),
        Err(e) => {
            debug!("No decoder for {}, reading packets only: {}", path.display(), e);
            None
        }
    };

    Ok(ActiveStream {
        format,
        decoder,
        track_id,
    })
}

fn decode_next(stream: &mut ActiveStream, pending: &mut VecDeque<PipelineEvent>) -> Step {
    let packet = match stream.format.next_packet() {
        Ok(packet) => packet,
        Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
            return Step::End
        }
        Err(SymphoniaError::ResetRequired) => return Step::End,
        Err(e) => return Step::Fail(e.to_string()),
    };

    if packet.track_id() == stream.track_id {
        if let Some(decoder) = stream.decoder.as_mut() {
            match decoder.decode(&packet) {
                Ok(_) => {}
                Err(SymphoniaError::DecodeError(msg)) => trace!("Skipping corrupt packet: {}", msg),
                Err(e) => return Step::Fail(e.to_string()),
            }
        }
    }

    let mut metadata = stream.format.metadata();
    if !metadata.is_latest() {
        if let Some(revision) = metadata.skip_to_latest() {
            queue_revision(revision, pending);
        }
    }
    Step::Continue
}

fn queue_revision(revision: &MetadataRevision, pending: &mut VecDeque<PipelineEvent>) {
    for tag in revision.tags() {
        let raw_key = tag.key.to_lowercase();
        let key = match (tag.std_key.as_ref(), raw_key.as_str()) {
            (Some(StandardTagKey::Artist), _) | (_, "iart") => "artist".to_string(),
            (Some(StandardTagKey::Album), _) | (_, "iprd") => "album".to_string(),
            (Some(StandardTagKey::TrackTitle), _) | (_, "inam") => "title".to_string(),
            (Some(StandardTagKey::TrackNumber), _) | (_, "itrk" | "iprt" | "trck") => {
                "track-number".to_string()
            }
            _ => raw_key.clone(),
        };
        // RIFF INFO strings carry their NUL terminator.
        let value = tag.value.to_string();
        let value = value.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        let value = if key == "track-number" {
            track_number(value)
        } else {
            value.to_string()
        };
        pending.push_back(PipelineEvent::tag(key, value));
    }
}

/// The leading integer of a track field, so `01`, `1/12` and `01/12` all
/// read as `1`. Text without a leading number is kept as-is.
fn track_number(value: &str) -> String {
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return value.to_string();
    }
    match digits.trim_start_matches('0') {
        "" => "0".to_string(),
        number => number.to_string(),
    }
}

fn codec_name(codec: CodecType) -> String {
    symphonia::default::get_codecs()
        .get_codec(codec)
        .map(|descriptor| descriptor.short_name.to_string())
        .unwrap_or_else(|| format!("{:?}", codec))
}
