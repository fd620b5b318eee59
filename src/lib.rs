pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod input;
pub mod playback;
pub mod practice;
pub mod session;
pub mod transcription;

pub use config::Settings;
pub use engine::{Engine, EngineCommand, EngineHandle, EngineUpdate, spawn_engine};
pub use error::{Error, PlaybackError, Result};
pub use events::{LiveInput, NoteSignal, PracticeEvent};
pub use practice::{Accuracy, StreamMatcher};
pub use session::Session;
pub use transcription::{Transcription, transcribe_bytes, transcribe_file};
