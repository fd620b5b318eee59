use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream is not a Standard MIDI File midly can read.
    #[error("Invalid MIDI file: {0}")]
    Midi(#[from] midly::Error),

    #[error("Invalid settings: {0}")]
    Config(String),

    #[error("Audio output unavailable: {0}")]
    Audio(String),

    #[error("MIDI input unavailable: {0}")]
    Input(String),

    #[error("File watch failed: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("Nothing to play: the source has no notes")]
    EmptySource,

    #[error("Invalid timing: ppq={ppq}, tempo={tempo}")]
    InvalidTiming { ppq: u16, tempo: u32 },

    #[error("Tone output failed: {0}")]
    Output(String),
}

pub type Result<T> = std::result::Result<T, Error>;
