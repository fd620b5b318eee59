use crate::transcription::NoteId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Not started yet.
    Idle,
    /// Waiting for this note to be played.
    Active(NoteId),
    /// Every note of the stream has been matched.
    Exhausted,
}

/// Where one stream is in its ordered note sequence.
#[derive(Debug, Clone)]
pub struct StreamCursor {
    next_index: usize,
    state: CursorState,
}

impl StreamCursor {
    pub fn new() -> Self {
        Self {
            next_index: 0,
            state: CursorState::Idle,
        }
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn active(&self) -> Option<NoteId> {
        match self.state {
            CursorState::Active(id) => Some(id),
            _ => None,
        }
    }

    /// Moves forward only.
    pub(super) fn advance(&mut self) {
        self.next_index += 1;
    }

    pub(super) fn set_state(&mut self, state: CursorState) {
        self.state = state;
    }
}

impl Default for StreamCursor {
    fn default() -> Self {
        Self::new()
    }
}
