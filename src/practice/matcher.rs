use std::collections::HashMap;

use super::Accuracy;
use super::cursor::{CursorState, StreamCursor};
use crate::events::{LiveInput, NoteSignal, PracticeEvent};
use crate::transcription::{NoteEvent, NoteId, Stream, Transcription};

#[derive(Debug, Clone, Copy)]
struct Entry {
    /// Position in the transcription's note list.
    note: usize,
    id: NoteId,
    pitch: u8,
}

/// Follows the performer through the upper and lower streams independently.
///
/// Each stream has one active note at a time. A played pitch is offered to the
/// upper stream first, then the lower one; the first stream whose active note
/// has that pitch consumes it. A pitch neither stream wants is a miss for
/// every active note and changes nothing.
#[derive(Debug, Clone)]
pub struct StreamMatcher {
    sequences: [Vec<Entry>; 2],
    cursors: [StreamCursor; 2],
    matched: Vec<bool>,
    positions: HashMap<NoteId, usize>,
    matched_count: usize,
    completed: bool,
}

impl StreamMatcher {
    /// `notes` must be sorted by start tick.
    pub fn new(notes: &[NoteEvent], split_point: u8) -> Self {
        let mut sequences: [Vec<Entry>; 2] = [Vec::new(), Vec::new()];
        for (note, event) in notes.iter().enumerate() {
            sequences[event.stream(split_point).index()].push(Entry {
                note,
                id: event.id,
                pitch: event.pitch,
            });
        }

        tracing::debug!(
            "Streams: upper={}, lower={}",
            sequences[0].len(),
            sequences[1].len()
        );

        Self {
            sequences,
            cursors: [StreamCursor::new(), StreamCursor::new()],
            matched: vec![false; notes.len()],
            positions: notes.iter().enumerate().map(|(i, n)| (n.id, i)).collect(),
            matched_count: 0,
            completed: false,
        }
    }

    pub fn from_transcription(transcription: &Transcription) -> Self {
        Self::new(transcription.notes(), transcription.split_point())
    }

    /// Activates the first unmatched note of each stream.
    pub fn start(&mut self) -> Vec<PracticeEvent> {
        let mut events = Vec::new();
        for stream in Stream::ALL {
            self.set_active(stream, &mut events);
        }
        if self.total() > 0 {
            self.check_complete(&mut events);
        }
        events
    }

    pub fn handle_input(&mut self, input: &LiveInput) -> Vec<PracticeEvent> {
        if !input.is_actionable() {
            return Vec::new();
        }
        self.play(input.pitch)
    }

    pub fn play(&mut self, pitch: u8) -> Vec<PracticeEvent> {
        let mut events = Vec::new();

        for stream in Stream::ALL {
            if self.try_consume(stream, pitch, &mut events) {
                return events;
            }
        }

        let expected: Vec<String> = Stream::ALL
            .iter()
            .filter_map(|&s| self.active_entry(s))
            .map(|e| e.pitch.to_string())
            .collect();
        tracing::debug!("Miss: played {}, expected [{}]", pitch, expected.join(", "));

        for stream in Stream::ALL {
            if let Some(id) = self.cursors[stream.index()].active() {
                events.push(PracticeEvent::Note {
                    id,
                    signal: NoteSignal::Missed,
                });
            }
        }
        events
    }

    /// Marks a note as already played without going through live input.
    /// Cursors skip it the next time they move. Returns false for unknown ids
    /// and for notes that were already matched.
    pub fn mark_matched(&mut self, id: NoteId) -> bool {
        match self.positions.get(&id) {
            Some(&note) => self.mark(note),
            None => false,
        }
    }

    /// `Expected` for every currently active note.
    pub fn expected_signals(&self) -> Vec<PracticeEvent> {
        self.active_notes()
            .into_iter()
            .map(|id| PracticeEvent::Note {
                id,
                signal: NoteSignal::Expected,
            })
            .collect()
    }

    pub fn active_notes(&self) -> Vec<NoteId> {
        self.cursors.iter().filter_map(StreamCursor::active).collect()
    }

    pub fn cursor(&self, stream: Stream) -> &StreamCursor {
        &self.cursors[stream.index()]
    }

    pub fn is_matched(&self, id: NoteId) -> bool {
        self.positions
            .get(&id)
            .is_some_and(|&note| self.matched[note])
    }

    pub fn matched_count(&self) -> usize {
        self.matched_count
    }

    pub fn total(&self) -> usize {
        self.matched.len()
    }

    pub fn accuracy(&self) -> Accuracy {
        Accuracy::new(self.matched_count, self.total())
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    fn active_entry(&self, stream: Stream) -> Option<Entry> {
        let cursor = &self.cursors[stream.index()];
        cursor.active()?;
        self.sequences[stream.index()].get(cursor.next_index()).copied()
    }

    fn try_consume(&mut self, stream: Stream, pitch: u8, events: &mut Vec<PracticeEvent>) -> bool {
        let Some(entry) = self.active_entry(stream) else {
            return false;
        };
        if entry.pitch != pitch {
            return false;
        }

        tracing::debug!("Correct ({}): {} pitch {}", stream, entry.id, pitch);
        self.mark(entry.note);
        events.push(PracticeEvent::Note {
            id: entry.id,
            signal: NoteSignal::Matched,
        });
        self.cursors[stream.index()].advance();

        for s in Stream::ALL {
            self.set_active(s, events);
        }
        self.check_complete(events);
        true
    }

    fn mark(&mut self, note: usize) -> bool {
        if self.matched[note] {
            return false;
        }
        self.matched[note] = true;
        self.matched_count += 1;
        true
    }

    fn set_active(&mut self, stream: Stream, events: &mut Vec<PracticeEvent>) {
        let sequence = &self.sequences[stream.index()];
        let cursor = &mut self.cursors[stream.index()];

        while let Some(entry) = sequence.get(cursor.next_index()) {
            if !self.matched[entry.note] {
                break;
            }
            cursor.advance();
        }

        let state = match sequence.get(cursor.next_index()) {
            Some(entry) => CursorState::Active(entry.id),
            None => CursorState::Exhausted,
        };
        if state != cursor.state() {
            cursor.set_state(state);
            if let CursorState::Active(id) = state {
                events.push(PracticeEvent::Note {
                    id,
                    signal: NoteSignal::Expected,
                });
            }
        }
    }

    fn check_complete(&mut self, events: &mut Vec<PracticeEvent>) {
        if self.completed {
            return;
        }
        let done = Stream::ALL.iter().all(|&s| {
            let cursor = &self.cursors[s.index()];
            cursor.state() == CursorState::Exhausted
                && cursor.next_index() == self.sequences[s.index()].len()
        });
        if done {
            self.completed = true;
            let accuracy = self.accuracy();
            tracing::info!("Piece complete, accuracy {}", accuracy);
            events.push(PracticeEvent::Completed(accuracy));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(event: u32, pitch: u8, start_tick: u64) -> NoteEvent {
        NoteEvent {
            id: NoteId { track: 0, event },
            pitch,
            start_tick,
            duration_ticks: 480,
            track: 0,
            channel: 0,
            velocity: 64,
        }
    }

    fn id(event: u32) -> NoteId {
        NoteId { track: 0, event }
    }

    fn expected(event: u32) -> PracticeEvent {
        PracticeEvent::Note {
            id: id(event),
            signal: NoteSignal::Expected,
        }
    }

    fn matched(event: u32) -> PracticeEvent {
        PracticeEvent::Note {
            id: id(event),
            signal: NoteSignal::Matched,
        }
    }

    fn missed(event: u32) -> PracticeEvent {
        PracticeEvent::Note {
            id: id(event),
            signal: NoteSignal::Missed,
        }
    }

    #[test]
    fn two_streams_complete_independently() {
        let notes = vec![note(0, 64, 0), note(1, 48, 0)];
        let mut matcher = StreamMatcher::new(&notes, 60);

        assert_eq!(matcher.start(), vec![expected(0), expected(1)]);
        assert_eq!(matcher.active_notes(), vec![id(0), id(1)]);

        assert_eq!(matcher.play(64), vec![matched(0)]);
        assert!(matcher.is_matched(id(0)));
        assert!(!matcher.is_matched(id(1)));
        assert_eq!(matcher.cursor(Stream::Upper).state(), CursorState::Exhausted);
        assert_eq!(matcher.cursor(Stream::Lower).active(), Some(id(1)));
        assert!(!matcher.is_complete());

        let events = matcher.play(48);
        assert_eq!(
            events,
            vec![
                matched(1),
                PracticeEvent::Completed(Accuracy::new(2, 2))
            ]
        );
        assert!(matcher.is_complete());
        assert_eq!(matcher.accuracy().percent(), Some(100));
    }

    #[test]
    fn wrong_pitch_changes_nothing() {
        let notes = vec![note(0, 64, 0), note(1, 48, 0)];
        let mut matcher = StreamMatcher::new(&notes, 60);
        matcher.start();

        let events = matcher.play(70);
        assert_eq!(events, vec![missed(0), missed(1)]);
        assert_eq!(matcher.cursor(Stream::Upper).next_index(), 0);
        assert_eq!(matcher.cursor(Stream::Lower).next_index(), 0);
        assert_eq!(matcher.matched_count(), 0);
        assert_eq!(matcher.active_notes(), vec![id(0), id(1)]);
    }

    #[test]
    fn miss_only_reports_streams_with_an_active_note() {
        let notes = vec![note(0, 64, 0), note(1, 67, 480)];
        let mut matcher = StreamMatcher::new(&notes, 60);
        matcher.start();
        assert_eq!(matcher.cursor(Stream::Lower).state(), CursorState::Exhausted);

        assert_eq!(matcher.play(40), vec![missed(0)]);
    }

    #[test]
    fn repeated_pitch_needs_one_press_per_note() {
        let notes = vec![note(0, 60, 0), note(1, 60, 0)];
        let mut matcher = StreamMatcher::new(&notes, 60);
        matcher.start();
        assert_eq!(matcher.play(60), vec![matched(0), expected(1)]);
        assert_eq!(matcher.cursor(Stream::Upper).next_index(), 1);
    }

    #[test]
    fn sequence_advances_in_tick_order() {
        let notes = vec![note(0, 60, 0), note(1, 62, 480), note(2, 64, 960)];
        let mut matcher = StreamMatcher::new(&notes, 60);
        matcher.start();

        assert_eq!(matcher.play(62), vec![missed(0)]);
        assert_eq!(matcher.play(60), vec![matched(0), expected(1)]);
        assert_eq!(matcher.play(62), vec![matched(1), expected(2)]);
        assert_eq!(matcher.accuracy().to_string(), "67% (2/3)");
    }

    #[test]
    fn premarked_notes_are_skipped() {
        let notes = vec![note(0, 60, 0), note(1, 62, 480), note(2, 64, 960)];
        let mut matcher = StreamMatcher::new(&notes, 60);
        assert!(matcher.mark_matched(id(0)));
        assert!(matcher.mark_matched(id(1)));
        assert!(!matcher.mark_matched(id(1)));
        assert!(!matcher.mark_matched(NoteId { track: 9, event: 9 }));

        assert_eq!(matcher.start(), vec![expected(2)]);
        assert_eq!(matcher.cursor(Stream::Upper).next_index(), 2);
        assert_eq!(matcher.matched_count(), 2);
    }

    #[test]
    fn completion_is_signalled_once() {
        let notes = vec![note(0, 60, 0)];
        let mut matcher = StreamMatcher::new(&notes, 60);
        matcher.start();
        let events = matcher.play(60);
        assert!(matches!(events.last(), Some(PracticeEvent::Completed(_))));

        assert!(matcher.play(60).is_empty());
        assert!(matcher.start().is_empty());
        assert!(matcher.is_complete());
    }

    #[test]
    fn released_keys_are_ignored() {
        let notes = vec![note(0, 60, 0)];
        let mut matcher = StreamMatcher::new(&notes, 60);
        matcher.start();
        let off = LiveInput {
            pitch: 60,
            velocity: 0,
            timestamp: 0,
        };
        assert!(matcher.handle_input(&off).is_empty());
        assert_eq!(matcher.matched_count(), 0);
    }

    #[test]
    fn nothing_happens_before_start() {
        let notes = vec![note(0, 60, 0)];
        let mut matcher = StreamMatcher::new(&notes, 60);
        assert_eq!(matcher.cursor(Stream::Upper).state(), CursorState::Idle);
        assert!(matcher.play(60).is_empty());
    }

    #[test]
    fn empty_source_is_not_applicable() {
        let mut matcher = StreamMatcher::new(&[], 60);
        assert!(matcher.start().is_empty());
        assert_eq!(matcher.accuracy(), Accuracy::NotApplicable);
        assert_eq!(matcher.accuracy().to_string(), "N/A");
        assert!(!matcher.is_complete());
    }

    #[test]
    fn expected_signals_reannounce_active_notes() {
        let notes = vec![note(0, 64, 0), note(1, 48, 0)];
        let mut matcher = StreamMatcher::new(&notes, 60);
        matcher.start();
        assert_eq!(matcher.expected_signals(), vec![expected(0), expected(1)]);
    }
}
