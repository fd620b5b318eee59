//! Audible replay of a transcription.
//!
//! [`PlaybackScheduler`] turns notes into tones plus highlight cues against
//! any [`ToneOutput`]. [`SynthOutput`] is the real device backend.

mod output;
mod scheduler;
mod voice;

pub use output::{SilentOutput, SynthOutput};
pub use scheduler::{
    PlaybackEvent, PlaybackScheduler, ScheduledNote, StartOutcome, Tone, ToneHandle, ToneOutput,
    build_schedule,
};
pub use voice::{Voice, midi_to_freq};
