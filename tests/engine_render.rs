//! End-to-end rendering through the public engine API.

use mp_engine::{Engine, EngineConfig, VoiceState};
use mp_ir::{InstrumentKind, NoteId, Resolution};

const RATE: u32 = 8_000;

fn engine() -> Engine {
    Engine::new(EngineConfig {
        sample_rate: RATE,
        reverb_seconds: 0.05,
        ..EngineConfig::default()
    })
    .unwrap()
}

/// Peak level over the next `seconds` of output.
fn peak(engine: &mut Engine, seconds: f64) -> f32 {
    (0..(seconds * RATE as f64) as usize)
        .map(|_| engine.render_stereo().peak())
        .fold(0.0, f32::max)
}

#[test]
fn first_step_sounds_after_start_offset() {
    let mut e = engine();
    e.set_sequencer_beat(0, 0, true, Resolution::Quarter).unwrap();
    e.resume();
    e.start_sequencer();
    assert_eq!(peak(&mut e, 0.049), 0.0);
    assert!(peak(&mut e, 0.05) > 0.01);
}

#[test]
fn identical_engines_render_identical_audio() {
    let program = |e: &mut Engine| {
        e.set_track_instrument(1, InstrumentKind::Piano).unwrap();
        for step in [0, 2, 5] {
            e.set_sequencer_beat(1, step, true, Resolution::Eighth).unwrap();
        }
        e.set_bpm(200.0);
        e.resume();
        e.start_sequencer();
    };
    let mut a = engine();
    let mut b = engine();
    program(&mut a);
    program(&mut b);
    let mut left = vec![Default::default(); 4_000];
    let mut right = vec![Default::default(); 4_000];
    a.render_block(&mut left);
    b.render_block(&mut right);
    assert_eq!(left, right);
    assert!(left.iter().any(|f: &mp_engine::Frame| f.left != 0));
}

#[test]
fn live_pad_play_over_a_running_pattern() {
    let mut e = engine();
    e.set_bpm(240.0);
    e.set_sequencer_beat(2, 1, true, Resolution::Quarter).unwrap();
    e.start_sequencer();

    let pad = NoteId::Pointer(11);
    e.play_note(120.0, 40.0, 400.0, 200.0, pad, Some(InstrumentKind::Pad), 4);
    peak(&mut e, 0.4);

    assert_eq!(e.voice_state(pad), Some(VoiceState::Active));
    assert!(e.voice_state(NoteId::Step { track: 2, step: 1 }).is_some());

    e.stop_note(pad);
    assert_eq!(e.voice_state(pad), Some(VoiceState::Releasing));
}

#[test]
fn panic_leaves_silence_and_the_pattern_keeps_going() {
    let mut e = engine();
    e.set_bpm(300.0);
    e.set_sequencer_beat(0, 4, true, Resolution::Quarter).unwrap();
    for n in 0..4u64 {
        e.play_note(n as f32 * 25.0, 0.0, 100.0, 100.0, NoteId::Pointer(n), None, 0);
    }
    e.start_sequencer();
    peak(&mut e, 0.1);
    e.stop_all_notes();
    assert_eq!(e.active_voice_count(), 0);
    assert!(e.is_sequencer_running());
    // Step 4 lands at 0.05 + 4 * 0.2 s, after the master has come back.
    peak(&mut e, 0.8);
    assert!(e.voice_state(NoteId::Step { track: 0, step: 4 }).is_some());
}

#[test]
fn voices_are_torn_down_and_graph_shrinks_back() {
    let mut e = engine();
    let idle = e.node_count();
    for track in 0..4 {
        e.set_track_decay(track, 0.0).unwrap();
    }
    for (n, kind) in InstrumentKind::ALL.iter().take(4).enumerate() {
        e.play_note(50.0, 0.0, 100.0, 100.0, NoteId::Pointer(n as u64), Some(*kind), n);
    }
    assert!(e.node_count() > idle);
    peak(&mut e, 0.1);
    for n in 0..4 {
        e.stop_note(NoteId::Pointer(n));
    }
    peak(&mut e, 0.3);
    assert_eq!(e.active_voice_count(), 0);
    assert_eq!(e.node_count(), idle);
}
