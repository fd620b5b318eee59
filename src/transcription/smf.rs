use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use super::assembler::RawEvent;
use super::model::TimeSignature;

const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];
const MINOR_KEYS: [&str; 15] = [
    "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeDivision {
    /// Ticks per quarter note.
    Metrical(u16),
    /// SMPTE frames per second and ticks per frame. Not supported for notation.
    Timecode { fps: f32, subframes: u8 },
}

/// The parts of a Standard MIDI File the transcription pipeline reads.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSource {
    pub division: TimeDivision,
    pub tracks: Vec<Vec<RawEvent>>,
    pub time_signature: Option<TimeSignature>,
    /// Microseconds per quarter note.
    pub tempo: Option<u32>,
    /// Sharps (positive) or flats (negative), and whether the key is minor.
    pub key: Option<(i8, bool)>,
}

impl RawSource {
    pub fn parse(bytes: &[u8]) -> Result<Self, midly::Error> {
        let smf = Smf::parse(bytes)?;
        Ok(Self::from_smf(&smf))
    }

    pub fn from_smf(smf: &Smf) -> Self {
        let division = match smf.header.timing {
            Timing::Metrical(ticks) => TimeDivision::Metrical(ticks.as_int()),
            Timing::Timecode(fps, subframes) => TimeDivision::Timecode {
                fps: fps.as_f32(),
                subframes,
            },
        };

        let mut source = RawSource {
            division,
            tracks: Vec::with_capacity(smf.tracks.len()),
            time_signature: None,
            tempo: None,
            key: None,
        };

        for track in &smf.tracks {
            let mut events = Vec::with_capacity(track.len());
            for event in track {
                let delta = event.delta.as_int();
                let raw = match event.kind {
                    TrackEventKind::Midi { channel, message } => {
                        let channel = channel.as_int();
                        match message {
                            MidiMessage::NoteOn { key, vel } => {
                                RawEvent::note_on(delta, channel, key.as_int(), vel.as_int())
                            }
                            MidiMessage::NoteOff { key, .. } => {
                                RawEvent::note_off(delta, channel, key.as_int())
                            }
                            _ => RawEvent::other(delta),
                        }
                    }
                    TrackEventKind::Meta(meta) => {
                        source.read_meta(meta);
                        RawEvent::other(delta)
                    }
                    _ => RawEvent::other(delta),
                };
                events.push(raw);
            }
            source.tracks.push(events);
        }

        source
    }

    // The first occurrence wins; tempo changes are not followed.
    fn read_meta(&mut self, meta: MetaMessage) {
        match meta {
            MetaMessage::Tempo(tempo) if self.tempo.is_none() => {
                let tempo = tempo.as_int();
                if tempo > 0 {
                    self.tempo = Some(tempo);
                }
            }
            MetaMessage::TimeSignature(numerator, denominator_exp, _, _)
                if self.time_signature.is_none() =>
            {
                let unit = 1u32.checked_shl(denominator_exp as u32).unwrap_or(0);
                self.time_signature = Some(TimeSignature {
                    beats: numerator as u32,
                    unit,
                });
            }
            MetaMessage::KeySignature(accidentals, minor) if self.key.is_none() => {
                self.key = Some((accidentals, minor));
            }
            _ => {}
        }
    }
}

/// Key name for a key signature, e.g. `(2, false)` -> `D`, `(0, true)` -> `Am`.
/// Out-of-range accidentals fall back to `C`.
pub fn key_name(accidentals: i8, minor: bool) -> String {
    let idx = accidentals as i32 + 7;
    if !(0..15).contains(&idx) {
        return "C".to_string();
    }
    if minor {
        format!("{}m", MINOR_KEYS[idx as usize])
    } else {
        MAJOR_KEYS[idx as usize].to_string()
    }
}
