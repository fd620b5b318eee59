mod common;

use common::{Ev, FakeOutput, smf_bytes, track};
use crossbeam::channel::{Receiver, unbounded};
use keyscore::engine::{Engine, EngineCommand, EngineUpdate};
use keyscore::events::{LiveInput, NoteSignal};
use keyscore::practice::Accuracy;
use keyscore::Settings;
use keyscore::transcription::NoteId;

fn engine() -> (Engine, Receiver<EngineUpdate>, FakeOutput) {
    let output = FakeOutput::default();
    let (tx, rx) = unbounded();
    let engine = Engine::new(Settings::default(), Box::new(output.clone()), tx);
    (engine, rx, output)
}

fn press(pitch: u8) -> EngineCommand {
    EngineCommand::NoteInput(LiveInput {
        pitch,
        velocity: 80,
        timestamp: 0,
    })
}

fn load(engine: &mut Engine, bytes: Vec<u8>) {
    let _ = engine.handle_command(EngineCommand::LoadBytes {
        name: "piece.mid".into(),
        bytes,
    });
}

fn signals(rx: &Receiver<EngineUpdate>) -> Vec<(NoteId, NoteSignal)> {
    rx.try_iter()
        .filter_map(|u| match u {
            EngineUpdate::Note { id, signal } => Some((id, signal)),
            _ => None,
        })
        .collect()
}

/// Upper 64 and lower 48 together at tick 0.
fn two_hands() -> Vec<u8> {
    smf_bytes(
        480,
        vec![track(&[
            (0, Ev::On(64)),
            (0, Ev::On(48)),
            (480, Ev::Off(64)),
            (480, Ev::Off(48)),
        ])],
    )
}

#[test]
fn two_hands_complete_at_full_accuracy() {
    let (mut engine, rx, _) = engine();
    load(&mut engine, two_hands());
    let upper = NoteId { track: 0, event: 0 };
    let lower = NoteId { track: 0, event: 1 };

    let start = signals(&rx);
    assert!(start.contains(&(upper, NoteSignal::Expected)));
    assert!(start.contains(&(lower, NoteSignal::Expected)));

    let _ = engine.handle_command(press(48));
    assert_eq!(signals(&rx), vec![(lower, NoteSignal::Matched)]);

    let _ = engine.handle_command(press(64));
    let updates: Vec<_> = rx.try_iter().collect();
    assert!(updates.contains(&EngineUpdate::Note {
        id: upper,
        signal: NoteSignal::Matched
    }));
    let full = Accuracy::Score {
        matched: 2,
        total: 2,
    };
    assert!(updates.contains(&EngineUpdate::Completed(full)));
    assert_eq!(full.to_string(), "100% (2/2)");
}

#[test]
fn unrelated_pitch_only_reports_misses() {
    let (mut engine, rx, _) = engine();
    load(&mut engine, two_hands());
    rx.try_iter().for_each(drop);

    let _ = engine.handle_command(press(70));
    let updates: Vec<_> = rx.try_iter().collect();
    let misses = updates
        .iter()
        .filter(|u| {
            matches!(
                u,
                EngineUpdate::Note {
                    signal: NoteSignal::Missed,
                    ..
                }
            )
        })
        .count();
    assert_eq!(misses, 2);
    assert_eq!(
        updates.last(),
        Some(&EngineUpdate::Accuracy(Accuracy::Score {
            matched: 0,
            total: 2
        }))
    );
    let session = engine.session().unwrap();
    assert_eq!(session.name(), "piece.mid");
    assert_eq!(session.matcher().matched_count(), 0);
}

#[test]
fn playback_highlights_then_cleans_up() {
    let (mut engine, rx, output) = engine();
    load(&mut engine, two_hands());
    rx.try_iter().for_each(drop);

    output.clock.set(1.0);
    let _ = engine.handle_command(EngineCommand::Play);
    assert_eq!(output.tones.borrow().len(), 2);
    assert_eq!(output.sounding.borrow().len(), 2);

    engine.fire_due_cues();
    let playing = signals(&rx)
        .into_iter()
        .filter(|(_, s)| *s == NoteSignal::Playing)
        .count();
    assert_eq!(playing, 2);

    // both notes end at 1.5s; the end cue is 200ms after that
    let wait = engine.time_until_next_cue().unwrap();
    assert!((wait.as_secs_f64() - 0.7).abs() < 1e-6);

    output.clock.set(1.75);
    engine.fire_due_cues();
    assert_eq!(
        rx.try_iter().last(),
        Some(EngineUpdate::PlaybackState { playing: false })
    );
    assert!(output.sounding.borrow().is_empty());
    assert_eq!(engine.time_until_next_cue(), None);
}

#[test]
fn stopping_twice_leaves_nothing_behind() {
    let (mut engine, rx, output) = engine();
    load(&mut engine, two_hands());
    let _ = engine.handle_command(EngineCommand::Play);
    let _ = engine.handle_command(EngineCommand::Stop);
    let _ = engine.handle_command(EngineCommand::Stop);
    rx.try_iter().for_each(drop);

    assert!(output.sounding.borrow().is_empty());
    let session = engine.session().unwrap();
    assert!(!session.is_playing());
    assert_eq!(session.playback().pending_cues(), 0);

    output.clock.set(60.0);
    engine.fire_due_cues();
    assert!(rx.try_recv().is_err());
}

#[test]
fn playback_does_not_touch_practice_progress() {
    let (mut engine, rx, output) = engine();
    load(&mut engine, two_hands());
    let _ = engine.handle_command(EngineCommand::Play);
    output.clock.set(5.0);
    engine.fire_due_cues();
    rx.try_iter().for_each(drop);

    let session = engine.session().unwrap();
    assert_eq!(session.matcher().matched_count(), 0);
    assert!(!session.matcher().is_complete());
}

#[test]
fn run_loop_exits_on_shutdown() {
    let (engine, rx, _) = engine();
    let (tx, command_rx) = unbounded();
    tx.send(EngineCommand::LoadBytes {
        name: "piece.mid".into(),
        bytes: two_hands(),
    })
    .unwrap();
    tx.send(press(64)).unwrap();
    tx.send(EngineCommand::Shutdown).unwrap();

    engine.run(command_rx);

    let updates: Vec<_> = rx.try_iter().collect();
    assert!(matches!(updates[0], EngineUpdate::SourceLoaded { .. }));
    assert!(updates.contains(&EngineUpdate::Accuracy(Accuracy::Score {
        matched: 1,
        total: 2
    })));
}
