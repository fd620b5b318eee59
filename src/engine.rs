use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::Settings;
use crate::error::Result;
use crate::events::{LiveInput, NoteSignal, PracticeEvent};
use crate::playback::{PlaybackEvent, SilentOutput, StartOutcome, SynthOutput, ToneOutput};
use crate::practice::Accuracy;
use crate::session::Session;
use crate::transcription::{
    AssemblyReport, Measure, Metadata, NoteId, Transcription, transcribe_bytes, transcribe_file,
};

#[derive(Debug, Clone)]
pub enum EngineCommand {
    LoadSource(PathBuf),
    LoadBytes { name: String, bytes: Vec<u8> },
    Play,
    Stop,
    NoteInput(LiveInput),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineUpdate {
    SourceLoaded {
        name: String,
        metadata: Metadata,
        measures: Vec<Measure>,
        total_notes: usize,
        report: AssemblyReport,
    },
    /// The source parsed but holds no usable notes.
    EmptySource { name: String },
    Note { id: NoteId, signal: NoteSignal },
    Accuracy(Accuracy),
    Completed(Accuracy),
    PlaybackState { playing: bool },
    Error { message: String },
}

pub struct EngineHandle {
    pub command_tx: Sender<EngineCommand>,
    pub update_rx: Receiver<EngineUpdate>,
    thread: JoinHandle<()>,
}

impl EngineHandle {
    /// Asks the engine to stop and waits for it, so no tone outlives it.
    pub fn shutdown(self) {
        let _ = self.command_tx.send(EngineCommand::Shutdown);
        if self.thread.join().is_err() {
            tracing::error!("Engine thread panicked");
        }
    }
}

pub fn spawn_engine(settings: Settings) -> EngineHandle {
    let (command_tx, command_rx) = crossbeam::channel::unbounded();
    let (update_tx, update_rx) = crossbeam::channel::unbounded();

    let thread = std::thread::spawn(move || {
        // The cpal stream stays on the thread that opened it.
        let output: Box<dyn ToneOutput> = match SynthOutput::open(&settings.playback) {
            Ok(output) => Box::new(output),
            Err(e) => {
                tracing::warn!("{}, playback will be silent", e);
                Box::new(SilentOutput::new())
            }
        };
        Engine::new(settings, output, update_tx).run(command_rx);
    });

    EngineHandle {
        command_tx,
        update_rx,
        thread,
    }
}

/// Single-threaded owner of the current session. Everything that mutates
/// practice or playback state runs here.
pub struct Engine {
    settings: Settings,
    output: Box<dyn ToneOutput>,
    session: Option<Session>,
    update_tx: Sender<EngineUpdate>,
}

impl Engine {
    pub fn new(
        settings: Settings,
        output: Box<dyn ToneOutput>,
        update_tx: Sender<EngineUpdate>,
    ) -> Self {
        Self {
            settings,
            output,
            session: None,
            update_tx,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Handles commands until `Shutdown` or until every sender is gone,
    /// waking in between for due playback cues and output servicing.
    pub fn run(mut self, command_rx: Receiver<EngineCommand>) {
        loop {
            let command = match self.time_until_next_wake() {
                Some(wait) => match command_rx.recv_timeout(wait) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match command_rx.recv() {
                    Ok(command) => Some(command),
                    Err(crossbeam::channel::RecvError) => break,
                },
            };

            if let Some(command) = command
                && self.handle_command(command).is_break()
            {
                break;
            }
            self.fire_due_cues();
            self.output.service();
        }

        if let Some(session) = self.session.as_mut() {
            session.halt(self.output.as_mut());
        }
        tracing::info!("Engine stopped");
    }

    pub fn handle_command(&mut self, command: EngineCommand) -> ControlFlow<()> {
        match command {
            EngineCommand::LoadSource(path) => {
                let name = path.display().to_string();
                let result = transcribe_file(&path, &self.settings);
                self.load(name, result);
            }
            EngineCommand::LoadBytes { name, bytes } => {
                let result = transcribe_bytes(&bytes, &self.settings);
                self.load(name, result);
            }
            EngineCommand::Play => self.play(),
            EngineCommand::Stop => self.stop(),
            EngineCommand::NoteInput(input) => self.note_input(input),
            EngineCommand::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Time until the next playback cue, or `None` when nothing is scheduled.
    pub fn time_until_next_cue(&self) -> Option<Duration> {
        let deadline = self.session.as_ref()?.next_deadline()?;
        let wait = (deadline - self.output.now()).max(0.0);
        Some(Duration::from_secs_f64(wait))
    }

    /// The earlier of the next cue and the next time the output needs
    /// servicing.
    pub fn time_until_next_wake(&self) -> Option<Duration> {
        let cue = self.session.as_ref().and_then(Session::next_deadline);
        let deadline = match (cue, self.output.next_service()) {
            (Some(a), Some(b)) => a.min(b),
            (a, b) => a.or(b)?,
        };
        let wait = (deadline - self.output.now()).max(0.0);
        Some(Duration::from_secs_f64(wait))
    }

    pub fn fire_due_cues(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let now = self.output.now();
        for event in session.poll(now, self.output.as_mut()) {
            match event {
                PlaybackEvent::Playing(id) => {
                    let _ = self.update_tx.send(EngineUpdate::Note {
                        id,
                        signal: NoteSignal::Playing,
                    });
                }
                PlaybackEvent::Finished => {
                    let _ = self
                        .update_tx
                        .send(EngineUpdate::PlaybackState { playing: false });
                }
            }
        }
    }

    fn load(&mut self, name: String, result: Result<Transcription>) {
        if let Some(session) = self.session.as_mut()
            && session.halt(self.output.as_mut())
        {
            let _ = self
                .update_tx
                .send(EngineUpdate::PlaybackState { playing: false });
        }

        let transcription = match result {
            Ok(transcription) => transcription,
            Err(e) => {
                tracing::error!("Failed to load {}: {}", name, e);
                let _ = self.update_tx.send(EngineUpdate::Error {
                    message: format!("Failed to load {}: {}", name, e),
                });
                return;
            }
        };

        let mut session = Session::new(name.clone(), transcription, &self.settings);

        if session.transcription().is_empty() {
            tracing::warn!("{} has no playable notes", name);
            let _ = self.update_tx.send(EngineUpdate::EmptySource { name });
        } else {
            let t = session.transcription();
            tracing::info!(
                "Loaded {}: {} notes in {} measures",
                name,
                t.notes().len(),
                t.measures().len()
            );
            let _ = self.update_tx.send(EngineUpdate::SourceLoaded {
                name,
                metadata: t.metadata().clone(),
                measures: t.measures().to_vec(),
                total_notes: t.notes().len(),
                report: t.report().clone(),
            });

            let events = session.begin();
            self.send_practice(events);
            let _ = self
                .update_tx
                .send(EngineUpdate::Accuracy(session.matcher().accuracy()));
        }

        self.session = Some(session);
    }

    fn play(&mut self) {
        let Some(session) = self.session.as_mut() else {
            let _ = self.update_tx.send(EngineUpdate::Error {
                message: "No source loaded".into(),
            });
            return;
        };
        match session.play(self.output.as_mut()) {
            Ok(StartOutcome::Started { .. }) => {
                tracing::info!("Playing {}", session.name());
                let _ = self
                    .update_tx
                    .send(EngineUpdate::PlaybackState { playing: true });
            }
            Ok(StartOutcome::AlreadyPlaying) => {}
            Err(e) => {
                tracing::warn!("Playback of {} refused: {}", session.name(), e);
                let _ = self.update_tx.send(EngineUpdate::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    fn stop(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(expected) = session.stop(self.output.as_mut()) {
            let _ = self
                .update_tx
                .send(EngineUpdate::PlaybackState { playing: false });
            self.send_practice(expected);
        }
    }

    fn note_input(&mut self, input: LiveInput) {
        if !input.is_actionable() {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            tracing::debug!("Input {} with no source loaded", input.pitch);
            return;
        };
        let events = session.handle_input(&input);
        let accuracy = session.matcher().accuracy();
        self.send_practice(events);
        let _ = self.update_tx.send(EngineUpdate::Accuracy(accuracy));
    }

    fn send_practice(&self, events: Vec<PracticeEvent>) {
        for event in events {
            let update = match event {
                PracticeEvent::Note { id, signal } => EngineUpdate::Note { id, signal },
                PracticeEvent::Completed(accuracy) => EngineUpdate::Completed(accuracy),
            };
            let _ = self.update_tx.send(update);
        }
    }
}
