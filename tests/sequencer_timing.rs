//! Lookahead scheduler driven the way the engine drives it: a poll every
//! 25 ms of audio clock.

use mp_engine::{LookaheadScheduler, SchedulerConfig, StepKey};

fn run(bpm: f64, seconds: f64) -> Vec<(u32, f64, f64)> {
    let beat = 60.0 / bpm;
    let mut sched = LookaheadScheduler::new(SchedulerConfig::default());
    sched.start(0.0);
    let mut committed = Vec::new();
    let mut now = 0.0;
    while now < seconds {
        if sched.poll_due(now) {
            let poll = sched.poll(now, beat);
            assert_eq!(poll.skipped, 0);
            assert!(!poll.aborted);
            committed.extend(poll.events.iter().map(|e| (e.beat, e.time, now)));
        }
        now += 0.001;
    }
    committed
}

#[test]
fn beats_are_evenly_spaced_without_gaps() {
    let events = run(120.0, 4.0);
    assert!(events.len() >= 7);
    for (i, (beat, time, _)) in events.iter().enumerate() {
        assert_eq!(*beat, i as u32 % 16);
        let expected = 0.05 + 0.5 * i as f64;
        assert!((time - expected).abs() < 1e-9, "beat {} at {}", i, time);
    }
}

#[test]
fn beats_are_committed_inside_the_lookahead_window() {
    for (beat, time, polled_at) in run(180.0, 3.0) {
        assert!(time >= polled_at, "beat {} committed late", beat);
        assert!(time < polled_at + 0.1, "beat {} committed too early", beat);
    }
}

#[test]
fn pattern_wraps_after_sixteen_beats() {
    let events = run(300.0, 4.0);
    let beats: Vec<u32> = events.iter().map(|e| e.0).collect();
    assert_eq!(beats[0], 0);
    assert_eq!(beats[15], 15);
    assert_eq!(beats[16], 0);
}

#[test]
fn repeated_claims_are_suppressed() {
    let mut sched = LookaheadScheduler::new(SchedulerConfig::default());
    sched.start(0.0);
    let key = StepKey::new(3, 7, 1.25);
    assert!(sched.claim(key));
    assert!(!sched.claim(key));
    assert!(sched.claim(StepKey::new(3, 7, 1.75)));
    sched.stop();
    assert_eq!(sched.recent_len(), 0);
    assert!(sched.claim(key));
}
