use serde::{Deserialize, Serialize};
use std::fmt;

const NOTE_NAMES: [&str; 12] = [
    "c", "c#", "d", "d#", "e", "f", "f#", "g", "g#", "a", "a#", "b",
];

/// Identity of a note: the track it came from and the index of its note-on
/// event within that track. Stable for the lifetime of a loaded source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId {
    pub track: u16,
    pub event: u32,
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}-e{}", self.track, self.event)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub id: NoteId,
    pub pitch: u8,
    /// Absolute from the start of the track.
    pub start_tick: u64,
    /// Always > 0.
    pub duration_ticks: u64,
    pub track: u16,
    pub channel: u8,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn stream(&self, split_point: u8) -> Stream {
        Stream::for_pitch(self.pitch, split_point)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stream {
    Upper,
    Lower,
}

impl Stream {
    /// Upper first: that is the order live input is checked in.
    pub const ALL: [Stream; 2] = [Stream::Upper, Stream::Lower];

    pub fn for_pitch(pitch: u8, split_point: u8) -> Self {
        if pitch >= split_point {
            Stream::Upper
        } else {
            Stream::Lower
        }
    }

    pub fn index(self) -> usize {
        match self {
            Stream::Upper => 0,
            Stream::Lower => 1,
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Upper => write!(f, "upper"),
            Stream::Lower => write!(f, "lower"),
        }
    }
}

/// Sharp spelling in `name/octave` form, e.g. 61 -> `c#/4`.
pub fn spell_pitch(pitch: u8) -> String {
    let octave = (pitch / 12) as i8 - 1;
    format!("{}/{}", NOTE_NAMES[(pitch % 12) as usize], octave)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseDuration {
    #[serde(rename = "w")]
    Whole,
    #[serde(rename = "h")]
    Half,
    #[serde(rename = "q")]
    Quarter,
    #[serde(rename = "8")]
    Eighth,
    #[serde(rename = "16")]
    Sixteenth,
    #[serde(rename = "32")]
    ThirtySecond,
}

impl BaseDuration {
    pub fn symbol(self) -> &'static str {
        match self {
            BaseDuration::Whole => "w",
            BaseDuration::Half => "h",
            BaseDuration::Quarter => "q",
            BaseDuration::Eighth => "8",
            BaseDuration::Sixteenth => "16",
            BaseDuration::ThirtySecond => "32",
        }
    }
}

impl fmt::Display for BaseDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotatedDuration {
    pub base: BaseDuration,
    pub dots: u8,
}

/// A note as the rendering layer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotatedNote {
    pub id: NoteId,
    pub pitch: u8,
    pub spelling: String,
    pub duration: BaseDuration,
    pub dots: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub index: usize,
    pub upper: Vec<NotatedNote>,
    pub lower: Vec<NotatedNote>,
}

impl Measure {
    pub fn stream(&self, stream: Stream) -> &[NotatedNote] {
        match stream {
            Stream::Upper => &self.upper,
            Stream::Lower => &self.lower,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.upper.is_empty() && self.lower.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats: u32,
    /// Beat unit denominator; a power of two.
    pub unit: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self { beats: 4, unit: 4 }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.unit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub time_signature: TimeSignature,
    pub key_signature: String,
    pub ppq: u16,
    /// Microseconds per quarter note.
    pub tempo: u32,
}

/// The measure-grouped notation handed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notation {
    pub metadata: Metadata,
    pub measures: Vec<Measure>,
}
