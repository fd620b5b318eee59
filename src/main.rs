use clap::{Parser, Subcommand};
use crossbeam::channel::{Receiver, Sender};
use keyscore::engine::{EngineCommand, EngineUpdate, spawn_engine};
use keyscore::events::{LiveInput, NoteSignal};
use keyscore::input::{connect_input, list_inputs};
use keyscore::transcription::NoteId;
use keyscore::{Result, Settings, transcribe_file};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const PRACTICE_HELP: &str = "\
Practice commands (stdin):
  p          play the source
  s          stop playback
  n <pitch>  play a MIDI pitch as if from the keyboard
  q          quit";

/// Practice keyboard pieces from Standard MIDI Files
#[derive(Parser, Debug)]
#[command(name = "keyscore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Settings file (RON); defaults are used when missing
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the measure-grouped notation of a MIDI file as RON
    Transcribe {
        /// Input MIDI file
        source: PathBuf,
    },
    /// Practice a MIDI file against a keyboard or stdin
    #[command(after_help = PRACTICE_HELP)]
    Practice {
        /// Input MIDI file
        source: PathBuf,

        /// Reload the file whenever it changes
        #[arg(long)]
        watch: bool,
    },
    /// List MIDI input ports
    Inputs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match cli.config.as_deref().map(Settings::load).transpose() {
        Ok(settings) => settings.unwrap_or_default(),
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&settings.log_level);

    let result = match cli.command {
        Commands::Transcribe { source } => transcribe(&source, &settings),
        Commands::Practice { source, watch } => practice(source, watch, settings),
        Commands::Inputs => inputs(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn transcribe(source: &Path, settings: &Settings) -> Result<()> {
    let transcription = transcribe_file(source, settings)?;
    if transcription.is_empty() {
        tracing::warn!("{} contains no notes", source.display());
    }
    let ron_string =
        ron::ser::to_string_pretty(transcription.notation(), ron::ser::PrettyConfig::default())
            .map_err(|e| keyscore::Error::Config(e.to_string()))?;
    println!("{}", ron_string);
    Ok(())
}

fn inputs() -> Result<()> {
    let ports = list_inputs()?;
    if ports.is_empty() {
        println!("No MIDI inputs found");
    }
    for (i, name) in ports.iter().enumerate() {
        println!("  {}: {}", i, name);
    }
    Ok(())
}

fn practice(source: PathBuf, watch: bool, settings: Settings) -> Result<()> {
    let hint = settings.input_port_hint.clone();
    let engine = spawn_engine(settings);

    let _input = match connect_input(hint.as_deref(), engine.command_tx.clone()) {
        Ok(conn) => {
            println!("Listening on {}", conn.port_name());
            Some(conn)
        }
        Err(e) => {
            tracing::warn!("{}, use `n <pitch>` to play notes", e);
            None
        }
    };

    let _ = engine
        .command_tx
        .send(EngineCommand::LoadSource(source.clone()));

    let _watcher = if watch {
        Some(watch_source(&source, engine.command_tx.clone())?)
    } else {
        None
    };

    let update_rx = engine.update_rx.clone();
    let printer = std::thread::spawn(move || print_updates(update_rx));

    println!("{}", PRACTICE_HELP);
    read_commands(&engine.command_tx);

    engine.shutdown();
    if printer.join().is_err() {
        tracing::error!("Update printer panicked");
    }
    Ok(())
}

fn watch_source(source: &Path, command_tx: Sender<EngineCommand>) -> Result<RecommendedWatcher> {
    let source_owned = source.to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if event.kind.is_modify() {
                    tracing::info!("{} changed, reloading", source_owned.display());
                    let _ = command_tx.send(EngineCommand::LoadSource(source_owned.clone()));
                }
            }
            Err(e) => tracing::warn!("Watch error: {}", e),
        },
        Config::default(),
    )?;
    watcher.watch(source, RecursiveMode::NonRecursive)?;
    tracing::info!("Watching {}", source.display());
    Ok(watcher)
}

/// Blocks on stdin until `q` or end of input.
fn read_commands(command_tx: &Sender<EngineCommand>) {
    let mut line = String::new();
    loop {
        line.clear();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::error!("stdin: {}", e);
                break;
            }
        }

        let mut words = line.split_whitespace();
        let command = match (words.next(), words.next()) {
            (None, _) => continue,
            (Some("q" | "quit"), _) => break,
            (Some("p" | "play"), _) => EngineCommand::Play,
            (Some("s" | "stop"), _) => EngineCommand::Stop,
            (Some("n" | "note"), Some(pitch)) => match pitch.parse::<u8>() {
                Ok(pitch) if pitch < 128 => EngineCommand::NoteInput(LiveInput {
                    pitch,
                    velocity: 100,
                    timestamp: 0,
                }),
                _ => {
                    println!("Pitch must be 0-127, got {}", pitch);
                    continue;
                }
            },
            (Some(other), _) => {
                println!("Unknown command: {}", other);
                continue;
            }
        };

        if command_tx.send(command).is_err() {
            break;
        }
    }
}

fn print_updates(update_rx: Receiver<EngineUpdate>) {
    let mut spellings: HashMap<NoteId, String> = HashMap::new();
    let name = |spellings: &HashMap<NoteId, String>, id: NoteId| {
        spellings
            .get(&id)
            .map(|s| format!("{} ({})", s, id))
            .unwrap_or_else(|| id.to_string())
    };

    for update in update_rx {
        match update {
            EngineUpdate::SourceLoaded {
                name: source,
                metadata,
                measures,
                total_notes,
                report,
            } => {
                spellings = measures
                    .iter()
                    .flat_map(|m| m.upper.iter().chain(m.lower.iter()))
                    .map(|n| (n.id, n.spelling.clone()))
                    .collect();
                println!(
                    "Loaded {}: {}, key {}, {} BPM, {} notes in {} measures",
                    source,
                    metadata.time_signature,
                    metadata.key_signature,
                    60_000_000 / metadata.tempo.max(1),
                    total_notes,
                    measures.len()
                );
                if report.dropped() > 0 {
                    println!("  {} notes dropped while reading", report.dropped());
                }
            }
            EngineUpdate::EmptySource { name: source } => {
                println!("{} contains no notes; practice and playback are off", source);
            }
            EngineUpdate::Note { id, signal } => {
                let label = match signal {
                    NoteSignal::Expected => "next",
                    NoteSignal::Matched => "hit",
                    NoteSignal::Missed => "missed",
                    NoteSignal::Playing => "playing",
                };
                println!("{:>8} {}", label, name(&spellings, id));
            }
            EngineUpdate::Accuracy(accuracy) => println!("Accuracy: {}", accuracy),
            EngineUpdate::Completed(accuracy) => println!("Piece complete! Accuracy: {}", accuracy),
            EngineUpdate::PlaybackState { playing } => {
                println!("{}", if playing { "Playback started" } else { "Playback stopped" });
            }
            EngineUpdate::Error { message } => println!("Error: {}", message),
        }
    }
}
