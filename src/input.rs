use crossbeam::channel::Sender;
use midir::{Ignore, MidiInput, MidiInputConnection};

use crate::engine::EngineCommand;
use crate::error::{Error, Result};
use crate::events::LiveInput;

/// Keeps the MIDI connection open; dropping it disconnects.
pub struct InputConnection {
    _conn: MidiInputConnection<()>,
    port_name: String,
}

impl InputConnection {
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// Names of every MIDI input port currently visible.
pub fn list_inputs() -> Result<Vec<String>> {
    let midi_in = MidiInput::new("keyscore").map_err(|e| Error::Input(e.to_string()))?;
    Ok(midi_in
        .ports()
        .iter()
        .map(|p| midi_in.port_name(p).unwrap_or_default())
        .collect())
}

/// Connects to the first port whose name contains `hint`, or the first port
/// at all. Note messages are forwarded to the engine as `NoteInput`.
pub fn connect_input(
    hint: Option<&str>,
    command_tx: Sender<EngineCommand>,
) -> Result<InputConnection> {
    let mut midi_in = MidiInput::new("keyscore").map_err(|e| Error::Input(e.to_string()))?;
    midi_in.ignore(Ignore::All);

    let ports = midi_in.ports();
    let port = hint
        .and_then(|hint| {
            ports
                .iter()
                .find(|p| midi_in.port_name(p).unwrap_or_default().contains(hint))
        })
        .or_else(|| ports.first())
        .ok_or_else(|| Error::Input("No MIDI input found".into()))?;

    let port_name = midi_in.port_name(port).unwrap_or_default();
    tracing::info!("MIDI input: {}", port_name);

    let conn = midi_in
        .connect(
            port,
            "keyscore-input",
            move |timestamp, msg, _| {
                if let Some(input) = LiveInput::from_bytes(timestamp, msg) {
                    let _ = command_tx.send(EngineCommand::NoteInput(input));
                }
            },
            (),
        )
        .map_err(|e| Error::Input(e.to_string()))?;

    Ok(InputConnection {
        _conn: conn,
        port_name,
    })
}
