#![allow(dead_code)]

use keyscore::error::PlaybackError;
use keyscore::playback::{Tone, ToneHandle, ToneOutput};
use midly::num::{u4, u7, u15, u24, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

#[derive(Debug, Clone, Copy)]
pub enum Ev {
    On(u8),
    Off(u8),
    Tempo(u32),
    /// Numerator and denominator exponent, as stored in the file.
    TimeSig(u8, u8),
    Key(i8, bool),
}

/// One track from `(absolute tick, event)` pairs, which must be in tick order.
pub fn track(events: &[(u32, Ev)]) -> Vec<TrackEvent<'static>> {
    let mut out = Vec::with_capacity(events.len() + 1);
    let mut last = 0;
    for &(tick, ev) in events {
        let kind = match ev {
            Ev::On(pitch) => TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(pitch),
                    vel: u7::new(96),
                },
            },
            Ev::Off(pitch) => TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOff {
                    key: u7::new(pitch),
                    vel: u7::new(0),
                },
            },
            Ev::Tempo(tempo) => TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo))),
            Ev::TimeSig(n, d) => TrackEventKind::Meta(MetaMessage::TimeSignature(n, d, 24, 8)),
            Ev::Key(acc, minor) => TrackEventKind::Meta(MetaMessage::KeySignature(acc, minor)),
        };
        out.push(TrackEvent {
            delta: u28::new(tick - last),
            kind,
        });
        last = tick;
    }
    out.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    out
}

pub fn smf_bytes(ppq: u16, tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
    let format = if tracks.len() > 1 {
        Format::Parallel
    } else {
        Format::SingleTrack
    };
    let smf = Smf {
        header: Header::new(format, Timing::Metrical(u15::new(ppq))),
        tracks,
    };
    let mut bytes = Vec::new();
    smf.write(&mut bytes).unwrap();
    bytes
}

/// Tone output with a hand-driven clock that remembers which tones still sound.
#[derive(Clone, Default)]
pub struct FakeOutput {
    pub clock: Rc<Cell<f64>>,
    pub sounding: Rc<RefCell<HashSet<ToneHandle>>>,
    pub tones: Rc<RefCell<Vec<Tone>>>,
}

impl ToneOutput for FakeOutput {
    fn now(&self) -> f64 {
        self.clock.get()
    }

    fn start_tone(&mut self, tone: Tone) -> Result<ToneHandle, PlaybackError> {
        let mut tones = self.tones.borrow_mut();
        let handle = ToneHandle(tones.len() as u64);
        tones.push(tone);
        self.sounding.borrow_mut().insert(handle);
        Ok(handle)
    }

    fn silence_all(&mut self) {
        self.sounding.borrow_mut().clear();
    }
}
