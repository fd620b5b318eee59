use crate::config::Settings;
use crate::error::PlaybackError;
use crate::events::{LiveInput, PracticeEvent};
use crate::playback::{PlaybackEvent, PlaybackScheduler, StartOutcome, ToneOutput};
use crate::practice::StreamMatcher;
use crate::transcription::Transcription;

/// Everything that belongs to one loaded source. Replaced wholesale when a new
/// source is loaded.
pub struct Session {
    name: String,
    transcription: Transcription,
    matcher: StreamMatcher,
    playback: PlaybackScheduler,
}

impl Session {
    pub fn new(name: impl Into<String>, transcription: Transcription, settings: &Settings) -> Self {
        let matcher = StreamMatcher::from_transcription(&transcription);
        Self {
            name: name.into(),
            transcription,
            matcher,
            playback: PlaybackScheduler::new(settings.playback),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transcription(&self) -> &Transcription {
        &self.transcription
    }

    pub fn matcher(&self) -> &StreamMatcher {
        &self.matcher
    }

    pub fn playback(&self) -> &PlaybackScheduler {
        &self.playback
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Puts both streams on their first note.
    pub fn begin(&mut self) -> Vec<PracticeEvent> {
        self.matcher.start()
    }

    pub fn handle_input(&mut self, input: &LiveInput) -> Vec<PracticeEvent> {
        self.matcher.handle_input(input)
    }

    pub fn play(&mut self, output: &mut dyn ToneOutput) -> Result<StartOutcome, PlaybackError> {
        self.playback.start(&self.transcription, output)
    }

    /// User stop. When something was playing, the active notes are announced
    /// again so the practice view replaces the playback highlighting.
    pub fn stop(&mut self, output: &mut dyn ToneOutput) -> Option<Vec<PracticeEvent>> {
        if self.playback.stop(output) {
            Some(self.matcher.expected_signals())
        } else {
            None
        }
    }

    /// Stops playback without touching practice state.
    pub fn halt(&mut self, output: &mut dyn ToneOutput) -> bool {
        self.playback.stop(output)
    }

    pub fn poll(&mut self, now: f64, output: &mut dyn ToneOutput) -> Vec<PlaybackEvent> {
        self.playback.poll(now, output)
    }

    /// On the output's clock.
    pub fn next_deadline(&self) -> Option<f64> {
        self.playback.next_deadline()
    }
}
