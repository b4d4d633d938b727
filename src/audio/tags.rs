use std::fmt;

use serde::Serialize;

use crate::{ConvertError, Result};

/// The tags every file must carry before it can be named and converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TagKey {
    Artist,
    Album,
    Title,
    TrackNumber,
    AudioCodec,
}

impl TagKey {
    pub const REQUIRED: [TagKey; 5] = [
        TagKey::Artist,
        TagKey::Album,
        TagKey::Title,
        TagKey::TrackNumber,
        TagKey::AudioCodec,
    ];

    /// Name used on the engine's bus.
    pub fn as_str(&self) -> &'static str {
        match self {
            TagKey::Artist => "artist",
            TagKey::Album => "album",
            TagKey::Title => "title",
            TagKey::TrackNumber => "track-number",
            TagKey::AudioCodec => "audio-codec",
        }
    }

    pub fn from_engine_name(name: &str) -> Option<Self> {
        Self::REQUIRED.into_iter().find(|key| key.as_str() == name)
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete set of required tags for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagSet {
    artist: String,
    album: String,
    title: String,
    track_number: String,
    audio_codec: String,
}

impl TagSet {
    pub fn new(
        artist: impl Into<String>,
        album: impl Into<String>,
        title: impl Into<String>,
        track_number: impl Into<String>,
        audio_codec: impl Into<String>,
    ) -> Self {
        Self {
            artist: artist.into(),
            album: album.into(),
            title: title.into(),
            track_number: track_number.into(),
            audio_codec: audio_codec.into(),
        }
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn album(&self) -> &str {
        &self.album
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn track_number(&self) -> &str {
        &self.track_number
    }

    pub fn audio_codec(&self) -> &str {
        &self.audio_codec
    }

    pub fn get(&self, key: TagKey) -> &str {
        match key {
            TagKey::Artist => &self.artist,
            TagKey::Album => &self.album,
            TagKey::Title => &self.title,
            TagKey::TrackNumber => &self.track_number,
            TagKey::AudioCodec => &self.audio_codec,
        }
    }

    /// True when the audio is already MP3 and can be copied as-is.
    pub fn is_target_codec(&self) -> bool {
        is_mp3_codec(&self.audio_codec)
    }
}

/// Matches the codec names both engines report for MPEG-1 Layer 3 audio,
/// e.g. `mp3` or `MPEG-1 Layer 3 (MP3)`.
pub fn is_mp3_codec(codec: &str) -> bool {
    let codec = codec.to_lowercase();
    codec.contains("mp3")
        || codec.contains("mpeg-1 layer 3")
        || codec.contains("mpeg 1 audio, layer 3")
}

/// Accumulates tags as the engine discovers them.
#[derive(Debug, Default)]
pub struct TagCollector {
    artist: Option<String>,
    album: Option<String>,
    title: Option<String>,
    track_number: Option<String>,
    audio_codec: Option<String>,
}

impl TagCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, key: TagKey) -> &mut Option<String> {
        match key {
            TagKey::Artist => &mut self.artist,
            TagKey::Album => &mut self.album,
            TagKey::Title => &mut self.title,
            TagKey::TrackNumber => &mut self.track_number,
            TagKey::AudioCodec => &mut self.audio_codec,
        }
    }

    fn peek(&self, key: TagKey) -> Option<&String> {
        match key {
            TagKey::Artist => self.artist.as_ref(),
            TagKey::Album => self.album.as_ref(),
            TagKey::Title => self.title.as_ref(),
            TagKey::TrackNumber => self.track_number.as_ref(),
            TagKey::AudioCodec => self.audio_codec.as_ref(),
        }
    }

    /// Stores `value` unless `key` already has one. Returns whether it was stored.
    pub fn record(&mut self, key: TagKey, value: impl Into<String>) -> bool {
        let slot = self.slot(key);
        if slot.is_some() {
            return false;
        }
        *slot = Some(value.into());
        true
    }

    pub fn len(&self) -> usize {
        TagKey::REQUIRED
            .iter()
            .filter(|key| self.peek(**key).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complete(&self) -> bool {
        self.len() == TagKey::REQUIRED.len()
    }

    pub fn missing(&self) -> Vec<TagKey> {
        TagKey::REQUIRED
            .into_iter()
            .filter(|key| self.peek(*key).is_none())
            .collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn finish(self) -> Result<TagSet> {
        if let Some(key) = self.missing().first() {
            return Err(ConvertError::MissingField(*key));
        }
        Ok(TagSet {
            artist: self.artist.unwrap_or_default(),
            album: self.album.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            track_number: self.track_number.unwrap_or_default(),
            audio_codec: self.audio_codec.unwrap_or_default(),
        })
    }
}
