use std::collections::VecDeque;

use super::voice::midi_to_freq;
use crate::config::PlaybackSettings;
use crate::error::PlaybackError;
use crate::transcription::{NoteEvent, NoteId, Transcription};

/// A tone request in seconds on the output's clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f32,
    pub gain: f32,
    pub start: f64,
    /// The amplitude reaches zero here.
    pub stop: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToneHandle(pub u64);

/// Where tones are sounded. The scheduler reads time from it and hands it
/// one tone per note.
pub trait ToneOutput {
    /// Seconds since the output started.
    fn now(&self) -> f64;

    fn start_tone(&mut self, tone: Tone) -> Result<ToneHandle, PlaybackError>;

    /// Cuts off every tone started so far, sounding or not yet begun.
    fn silence_all(&mut self);

    /// Moves queued tones closer to the device. Called from the engine loop.
    fn service(&mut self) {}

    /// When `service` next has work to do, on this output's clock.
    fn next_service(&self) -> Option<f64> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledNote {
    pub id: NoteId,
    pub start: f64,
    pub stop: f64,
}

/// Absolute start/stop times for every note, in `notes` order.
pub fn build_schedule(
    notes: &[NoteEvent],
    ppq: u16,
    tempo: u32,
    origin: f64,
    min_audible: f64,
) -> Vec<ScheduledNote> {
    // (tempo / 1e6) / ppq seconds per tick, kept as one division
    let ticks_to_seconds = |ticks: u64| ticks as f64 * tempo as f64 / (ppq as f64 * 1_000_000.0);
    notes
        .iter()
        .map(|note| {
            let start = origin + ticks_to_seconds(note.start_tick);
            let length = ticks_to_seconds(note.duration_ticks).max(min_audible);
            ScheduledNote {
                id: note.id,
                start,
                stop: start + length,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    Playing(NoteId),
    /// The end-of-playback cue fired; the run is already torn down.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cue {
    Highlight(NoteId),
    End,
}

#[derive(Debug, Clone, Copy)]
struct PendingCue {
    due: f64,
    cue: Cue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    Started { notes: usize, duration: f64 },
    AlreadyPlaying,
}

struct PlaybackRun {
    origin: f64,
    schedule: Vec<ScheduledNote>,
    tones: Vec<ToneHandle>,
    /// Sorted by due time.
    cues: VecDeque<PendingCue>,
}

/// Replays a transcription as tones plus highlight cues. Owns everything it
/// schedules for one run; stopping releases all of it.
pub struct PlaybackScheduler {
    settings: PlaybackSettings,
    run: Option<PlaybackRun>,
}

impl PlaybackScheduler {
    pub fn new(settings: PlaybackSettings) -> Self {
        Self {
            settings,
            run: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.run.is_some()
    }

    pub fn pending_cues(&self) -> usize {
        self.run.as_ref().map_or(0, |run| run.cues.len())
    }

    pub fn active_tones(&self) -> usize {
        self.run.as_ref().map_or(0, |run| run.tones.len())
    }

    pub fn schedule(&self) -> &[ScheduledNote] {
        self.run.as_ref().map_or(&[], |run| &run.schedule)
    }

    pub fn origin(&self) -> Option<f64> {
        self.run.as_ref().map(|run| run.origin)
    }

    /// When the next cue is due, on the output's clock.
    pub fn next_deadline(&self) -> Option<f64> {
        self.run
            .as_ref()
            .and_then(|run| run.cues.front())
            .map(|c| c.due)
    }

    pub fn start(
        &mut self,
        transcription: &Transcription,
        output: &mut dyn ToneOutput,
    ) -> Result<StartOutcome, PlaybackError> {
        if self.run.is_some() {
            tracing::debug!("Playback already running");
            return Ok(StartOutcome::AlreadyPlaying);
        }
        if transcription.is_empty() {
            return Err(PlaybackError::EmptySource);
        }
        let meta = transcription.metadata();
        if meta.ppq == 0 || meta.tempo == 0 {
            return Err(PlaybackError::InvalidTiming {
                ppq: meta.ppq,
                tempo: meta.tempo,
            });
        }

        let origin = output.now();
        let notes = transcription.notes();
        let schedule = build_schedule(
            notes,
            meta.ppq,
            meta.tempo,
            origin,
            self.settings.min_audible,
        );

        let mut tones = Vec::with_capacity(schedule.len());
        let mut cues = Vec::with_capacity(schedule.len() + 1);
        let mut last_stop = origin;

        for (note, slot) in notes.iter().zip(schedule.iter()) {
            let tone = Tone {
                frequency: midi_to_freq(note.pitch),
                gain: self.settings.voice_gain,
                start: slot.start,
                stop: slot.stop,
            };
            match output.start_tone(tone) {
                Ok(handle) => tones.push(handle),
                Err(e) => {
                    output.silence_all();
                    return Err(e);
                }
            }
            cues.push(PendingCue {
                due: slot.start,
                cue: Cue::Highlight(slot.id),
            });
            last_stop = last_stop.max(slot.stop);
        }

        let end_ms = ((last_stop - origin) * 1000.0).floor() + self.settings.end_margin_ms as f64;
        cues.push(PendingCue {
            due: origin + end_ms / 1000.0,
            cue: Cue::End,
        });
        cues.sort_by(|a, b| a.due.total_cmp(&b.due));

        let duration = last_stop - origin;
        tracing::info!(
            "Playback started: {} notes, {:.2}s (tempo {} us/qn, ppq {})",
            notes.len(),
            duration,
            meta.tempo,
            meta.ppq
        );

        self.run = Some(PlaybackRun {
            origin,
            schedule,
            tones,
            cues: cues.into(),
        });

        Ok(StartOutcome::Started {
            notes: notes.len(),
            duration,
        })
    }

    /// Fires every cue due at `now`, in order.
    pub fn poll(&mut self, now: f64, output: &mut dyn ToneOutput) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Some(run) = self.run.as_mut() {
            match run.cues.front() {
                Some(pending) if pending.due <= now => {}
                _ => break,
            }
            let Some(pending) = run.cues.pop_front() else {
                break;
            };
            match pending.cue {
                Cue::Highlight(id) => events.push(PlaybackEvent::Playing(id)),
                Cue::End => {
                    tracing::info!("Playback finished");
                    self.stop(output);
                    events.push(PlaybackEvent::Finished);
                }
            }
        }
        events
    }

    /// Silences every tone and drops every pending cue. Returns false if
    /// nothing was playing.
    pub fn stop(&mut self, output: &mut dyn ToneOutput) -> bool {
        let Some(run) = self.run.take() else {
            return false;
        };
        output.silence_all();
        tracing::debug!(
            "Playback stopped, {} tones silenced, {} cues cancelled",
            run.tones.len(),
            run.cues.len()
        );
        true
    }
}
