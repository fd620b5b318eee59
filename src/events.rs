use serde::Serialize;

use crate::practice::Accuracy;
use crate::transcription::NoteId;

/// A key press from the performer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveInput {
    pub pitch: u8,
    pub velocity: u8,
    /// Microseconds, as reported by the input device.
    pub timestamp: u64,
}

impl LiveInput {
    /// Decodes a raw note-on/note-off message. A note-off comes back with
    /// velocity 0; anything else is `None`.
    pub fn from_bytes(timestamp: u64, msg: &[u8]) -> Option<Self> {
        if msg.len() < 3 {
            return None;
        }
        let status = msg[0] & 0xF0;
        match status {
            0x90 => Some(Self {
                pitch: msg[1] & 0x7F,
                velocity: msg[2] & 0x7F,
                timestamp,
            }),
            0x80 => Some(Self {
                pitch: msg[1] & 0x7F,
                velocity: 0,
                timestamp,
            }),
            _ => None,
        }
    }

    /// Only note-on with a velocity is matched against the score.
    pub fn is_actionable(&self) -> bool {
        self.velocity > 0
    }
}

/// Named per-note state transitions, keyed by note id on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoteSignal {
    /// The note became its stream's active note.
    Expected,
    Matched,
    Missed,
    /// Playback reached the note.
    Playing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PracticeEvent {
    Note { id: NoteId, signal: NoteSignal },
    Completed(Accuracy),
}
