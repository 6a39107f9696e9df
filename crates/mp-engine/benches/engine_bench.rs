use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mp_engine::{Engine, EngineConfig, Frame};
use mp_ir::{InstrumentKind, NoteId, Resolution, TRACK_COUNT};

/// Every track busy at sixteenth resolution, each with its own instrument.
fn busy_engine() -> Engine {
    let mut engine = Engine::new(EngineConfig::default()).expect("engine");
    for track in 0..TRACK_COUNT {
        let kind = InstrumentKind::ALL[track % InstrumentKind::ALL.len()];
        engine.set_track_instrument(track, kind).expect("track");
        engine.set_track_delay(track, 30.0).expect("track");
        for step in (track % 4..64).step_by(3) {
            engine
                .set_sequencer_beat(track, step, true, Resolution::Sixteenth)
                .expect("step");
        }
    }
    engine.set_bpm(140.0);
    engine.start_sequencer();
    engine
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    group.bench_function("busy_pattern_1024_frames", |b| {
        let mut engine = busy_engine();
        let mut block = vec![Frame::silence(); 1024];
        b.iter(|| {
            engine.render_block(&mut block);
            black_box(&block);
        });
    });

    group.bench_function("pad_chord_1024_frames", |b| {
        let mut engine = Engine::new(EngineConfig::default()).expect("engine");
        for (i, x) in [0.0, 0.3, 0.55, 0.8].into_iter().enumerate() {
            engine.play_note(
                x,
                0.2,
                1.0,
                1.0,
                NoteId::Pointer(i as u64),
                Some(InstrumentKind::Pad),
                i,
            );
        }
        let mut block = vec![Frame::silence(); 1024];
        b.iter(|| {
            engine.render_block(&mut block);
            black_box(&block);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
