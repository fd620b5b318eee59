use serde::Serialize;
use std::collections::HashMap;

use super::model::{NoteEvent, NoteId};

/// One channel-voice (or ignored) event as it appears in a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub delta: u32,
    pub kind: RawEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
    /// Meta, controller, sysex... only advances time.
    Other,
}

impl RawEvent {
    pub fn note_on(delta: u32, channel: u8, pitch: u8, velocity: u8) -> Self {
        Self {
            delta,
            kind: RawEventKind::NoteOn {
                channel,
                pitch,
                velocity,
            },
        }
    }

    pub fn note_off(delta: u32, channel: u8, pitch: u8) -> Self {
        Self {
            delta,
            kind: RawEventKind::NoteOff { channel, pitch },
        }
    }

    pub fn other(delta: u32) -> Self {
        Self {
            delta,
            kind: RawEventKind::Other,
        }
    }
}

/// Notes that were dropped while pairing events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub zero_length: Vec<NoteId>,
    pub hung: Vec<NoteId>,
}

impl AssemblyReport {
    pub fn dropped(&self) -> usize {
        self.zero_length.len() + self.hung.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Assembly {
    /// Sorted by start tick, ties in the order their closing event was seen.
    pub notes: Vec<NoteEvent>,
    pub report: AssemblyReport,
}

struct OpenNote {
    id: NoteId,
    start_tick: u64,
    velocity: u8,
}

/// Pairs note-on/note-off events of every track into notes.
///
/// A second note-on for a `(channel, pitch)` key that is already open replaces
/// the first one, which never produces a note. Notes with no closing event by
/// the end of their track are dropped.
pub fn assemble(tracks: &[Vec<RawEvent>]) -> Assembly {
    let mut assembly = Assembly::default();

    for (track_idx, events) in tracks.iter().enumerate() {
        let track = track_idx as u16;
        let mut tick: u64 = 0;
        let mut open: HashMap<(u8, u8), OpenNote> = HashMap::new();

        for (event_idx, event) in events.iter().enumerate() {
            tick += event.delta as u64;

            match event.kind {
                RawEventKind::NoteOn {
                    channel,
                    pitch,
                    velocity,
                } if velocity > 0 => {
                    let id = NoteId {
                        track,
                        event: event_idx as u32,
                    };
                    if let Some(stale) = open.insert(
                        (channel, pitch),
                        OpenNote {
                            id,
                            start_tick: tick,
                            velocity,
                        },
                    ) {
                        tracing::debug!("Note {} replaced by {} before closing", stale.id, id);
                    }
                }
                RawEventKind::NoteOn { channel, pitch, .. }
                | RawEventKind::NoteOff { channel, pitch } => {
                    let Some(note) = open.remove(&(channel, pitch)) else {
                        continue;
                    };
                    let duration = tick.saturating_sub(note.start_tick);
                    if duration == 0 {
                        tracing::warn!("Note {} dropped: duration <= 0", note.id);
                        assembly.report.zero_length.push(note.id);
                        continue;
                    }
                    assembly.notes.push(NoteEvent {
                        id: note.id,
                        pitch,
                        start_tick: note.start_tick,
                        duration_ticks: duration,
                        track,
                        channel,
                        velocity: note.velocity,
                    });
                }
                RawEventKind::Other => {}
            }
        }

        let mut hung: Vec<NoteId> = open.into_values().map(|n| n.id).collect();
        hung.sort();
        for id in hung {
            tracing::warn!("Note {} dropped: no note-off before end of track", id);
            assembly.report.hung.push(id);
        }
    }

    assembly.notes.sort_by_key(|n| n.start_tick);
    assembly
}
