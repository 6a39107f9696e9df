//! Lookahead scheduler.
//!
//! Polled every `poll_interval` seconds of audio time. Each poll commits
//! every beat whose start falls inside `now + schedule_ahead`, so notes are
//! placed on the audio clock ahead of time and poll jitter never shows up
//! as timing jitter. A beat that has already slipped into the past is
//! skipped (the counter still advances) rather than played late.

use arrayvec::ArrayVec;
use heapless::Deque;
use log::{debug, warn};

/// Upper bound on beats committed by one poll.
pub const MAX_EVENTS_PER_POLL: usize = 32;

/// Capacity of the recently-dispatched step set.
pub const DEDUP_CAPACITY: usize = 256;

/// Timing constants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerConfig {
    pub poll_interval: f64,
    pub schedule_ahead: f64,
    /// Delay between `start` and the first beat.
    pub start_offset: f64,
    /// Beats committed per poll at most, clamped to [`MAX_EVENTS_PER_POLL`].
    pub max_events_per_poll: usize,
    /// Beats before the counter wraps.
    pub pattern_beats: u32,
    /// Dispatched notes remembered for dedup, clamped to [`DEDUP_CAPACITY`].
    pub dedup_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: 0.025,
            schedule_ahead: 0.1,
            start_offset: 0.05,
            max_events_per_poll: MAX_EVENTS_PER_POLL,
            pattern_beats: mp_ir::PATTERN_BEATS,
            dedup_capacity: DEDUP_CAPACITY,
        }
    }
}

/// A beat committed by a poll.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeatEvent {
    /// Beat index within the pattern.
    pub beat: u32,
    /// Audio-clock start of the beat.
    pub time: f64,
    /// Beat length used to place sub-steps.
    pub duration: f64,
}

/// What one poll did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Poll {
    /// Beats to dispatch, in time order.
    pub events: ArrayVec<BeatEvent, MAX_EVENTS_PER_POLL>,
    /// Beats passed over because their time was already behind `now`.
    pub skipped: u32,
    /// The loop stopped because the beat time failed to advance.
    pub aborted: bool,
}

/// Identifies one dispatched sequencer note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepKey {
    pub track: u8,
    pub step: u16,
    /// Scheduled time in microseconds.
    pub time_us: i64,
}

impl StepKey {
    pub fn new(track: usize, step: u16, time: f64) -> Self {
        Self {
            track: track as u8,
            step,
            time_us: libm::round(time * 1_000_000.0) as i64,
        }
    }
}

/// Stopped/running scheduler state.
pub struct LookaheadScheduler {
    config: SchedulerConfig,
    running: bool,
    next_event_time: f64,
    beat: u32,
    last_poll: Option<f64>,
    recent: Deque<StepKey, DEDUP_CAPACITY>,
}

impl LookaheadScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            running: false,
            next_event_time: 0.0,
            beat: 0,
            last_poll: None,
            recent: Deque::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Begin at beat 0, `start_offset` after `now`.
    pub fn start(&mut self, now: f64) {
        self.running = true;
        self.beat = 0;
        self.next_event_time = now + self.config.start_offset;
        self.last_poll = None;
        self.recent.clear();
    }

    /// Stop polling. Already committed notes are left alone.
    pub fn stop(&mut self) {
        self.running = false;
        self.last_poll = None;
        self.recent.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Next beat to be committed.
    pub fn current_beat(&self) -> u32 {
        self.beat
    }

    pub fn next_event_time(&self) -> f64 {
        self.next_event_time
    }

    /// Whether a poll is due at `now`.
    pub fn poll_due(&self, now: f64) -> bool {
        if !self.running {
            return false;
        }
        match self.last_poll {
            None => true,
            Some(last) => now - last >= self.config.poll_interval,
        }
    }

    /// Commit every beat before `now + schedule_ahead`, at most
    /// `max_events_per_poll` of them.
    pub fn poll(&mut self, now: f64, beat_duration: f64) -> Poll {
        let mut poll = Poll::default();
        if !self.running {
            return poll;
        }
        self.last_poll = Some(now);
        let horizon = now + self.config.schedule_ahead;
        let cap = self.config.max_events_per_poll.min(MAX_EVENTS_PER_POLL);
        let wrap = self.config.pattern_beats.max(1);
        let mut iterations = 0;
        while self.next_event_time < horizon && iterations < cap {
            iterations += 1;
            let before = self.next_event_time;
            let next = before + beat_duration;
            if !(next > before) {
                warn!(
                    "scheduler time failed to advance at {:.6}s (beat length {}), poll aborted",
                    before, beat_duration
                );
                poll.aborted = true;
                break;
            }
            if before < now {
                debug!("beat {} at {:.4}s is behind the clock, skipped", self.beat, before);
                poll.skipped += 1;
            } else {
                poll.events.push(BeatEvent {
                    beat: self.beat,
                    time: before,
                    duration: beat_duration,
                });
            }
            self.next_event_time = next;
            self.beat = (self.beat + 1) % wrap;
        }
        poll
    }

    /// Record a dispatched note. Returns false if the same note was already
    /// dispatched recently. The oldest entry is dropped when full.
    pub fn claim(&mut self, key: StepKey) -> bool {
        if self.recent.iter().any(|k| *k == key) {
            debug!("duplicate step {:?} suppressed", key);
            return false;
        }
        let limit = self.config.dedup_capacity.clamp(1, DEDUP_CAPACITY);
        while self.recent.len() >= limit {
            self.recent.pop_front();
        }
        // Cannot fail: a slot was just freed if needed.
        let _ = self.recent.push_back(key);
        true
    }

    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }
}
