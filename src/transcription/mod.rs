//! MIDI to notation.
//!
//! Raw track events are paired into notes ([`assemble`]), each note's length
//! is classified ([`Quantizer`]) and the time-ordered notes are cut into
//! measures ([`MeasureGrouper`]). The result is a [`Transcription`]: the flat
//! note list the practice and playback engines work from, plus the
//! measure-grouped [`Notation`] for renderers.

mod assembler;
mod measures;
mod model;
mod quantize;
mod smf;

pub use assembler::{Assembly, AssemblyReport, RawEvent, RawEventKind, assemble};
pub use measures::MeasureGrouper;
pub use model::{
    BaseDuration, Measure, Metadata, NotatedDuration, NotatedNote, Notation, NoteEvent, NoteId,
    Stream, TimeSignature, spell_pitch,
};
pub use quantize::Quantizer;
pub use smf::{RawSource, TimeDivision, key_name};

use std::fs;
use std::path::Path;

use crate::config::Settings;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct Transcription {
    notes: Vec<NoteEvent>,
    notation: Notation,
    report: AssemblyReport,
    split_point: u8,
}

impl Transcription {
    /// Every note of the source, sorted by start tick.
    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    pub fn notation(&self) -> &Notation {
        &self.notation
    }

    pub fn metadata(&self) -> &Metadata {
        &self.notation.metadata
    }

    pub fn measures(&self) -> &[Measure] {
        &self.notation.measures
    }

    pub fn report(&self) -> &AssemblyReport {
        &self.report
    }

    pub fn split_point(&self) -> u8 {
        self.split_point
    }

    /// A source without usable notes; practice and playback are disabled.
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// The notes of one stream in start-tick order.
    pub fn stream_notes(&self, stream: Stream) -> impl Iterator<Item = &NoteEvent> {
        let split = self.split_point;
        self.notes.iter().filter(move |n| n.stream(split) == stream)
    }
}

pub fn transcribe_file(path: &Path, settings: &Settings) -> Result<Transcription> {
    let bytes = fs::read(path)?;
    transcribe_bytes(&bytes, settings)
}

pub fn transcribe_bytes(bytes: &[u8], settings: &Settings) -> Result<Transcription> {
    let source = RawSource::parse(bytes)?;
    Ok(transcribe(&source, settings))
}

/// Runs the pipeline over an already parsed source. Malformed parts fall back
/// to the configured defaults; this never fails.
pub fn transcribe(source: &RawSource, settings: &Settings) -> Transcription {
    let ppq = match source.division {
        TimeDivision::Metrical(ppq) if ppq > 0 => ppq,
        TimeDivision::Metrical(_) => {
            tracing::warn!("Time division is 0, using ppq {}", settings.default_ppq);
            settings.default_ppq
        }
        TimeDivision::Timecode { fps, subframes } => {
            tracing::warn!(
                "SMPTE time division ({} fps, {} subframes) is not supported, using ppq {}",
                fps,
                subframes,
                settings.default_ppq
            );
            settings.default_ppq
        }
    };

    if source.tracks.is_empty() {
        tracing::warn!("Source has no track data");
    }

    let time_signature = MeasureGrouper::normalize(source.time_signature.unwrap_or_default());
    let metadata = Metadata {
        time_signature,
        key_signature: source
            .key
            .map(|(accidentals, minor)| key_name(accidentals, minor))
            .unwrap_or_else(|| "C".to_string()),
        ppq,
        tempo: source.tempo.unwrap_or(settings.default_tempo),
    };

    let Assembly { notes, report } = assemble(&source.tracks);
    tracing::info!(
        "Assembled {} notes ({} dropped)",
        notes.len(),
        report.dropped()
    );

    let quantizer = Quantizer::new(&settings.quantize);
    let grouper = MeasureGrouper::new(settings.measure_epsilon_ticks);
    let split = settings.split_point;

    let measures = grouper
        .group(&notes, time_signature, ppq)
        .into_iter()
        .enumerate()
        .map(|(index, indices)| {
            let mut measure = Measure {
                index,
                ..Default::default()
            };
            for i in indices {
                let note = &notes[i];
                let NotatedDuration { base, dots } = quantizer.quantize(note.duration_ticks, ppq);
                let notated = NotatedNote {
                    id: note.id,
                    pitch: note.pitch,
                    spelling: spell_pitch(note.pitch),
                    duration: base,
                    dots,
                };
                match note.stream(split) {
                    Stream::Upper => measure.upper.push(notated),
                    Stream::Lower => measure.lower.push(notated),
                }
            }
            measure
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        "Notation: {} measures in {}, key {}",
        measures.len(),
        metadata.time_signature,
        metadata.key_signature
    );

    Transcription {
        notes,
        notation: Notation { metadata, measures },
        report,
        split_point: split,
    }
}
