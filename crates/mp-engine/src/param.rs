//! Timestamped parameter automation.
//!
//! A [`Param`] holds a value that changes along a timeline of scheduled
//! events: jumps, linear and exponential ramps, and exponential approach
//! toward a target. All writes carry an audio-clock time, so control
//! changes and scheduled notes interleave without locking.
//!
//! Evaluation folds the event list into a *segment*: a start time, a start
//! value, and optionally a target the value is decaying toward. A ramp
//! event whose time has not yet arrived interpolates from the segment start
//! to the ramp's end point.

use alloc::vec::Vec;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Automation {
    Set(f32),
    Linear(f32),
    Exponential(f32),
    Target { target: f32, tau: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Scheduled {
    time: f64,
    kind: Automation,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Segment {
    time: f64,
    value: f32,
    target: Option<(f32, f64)>,
}

impl Segment {
    fn value_at(&self, t: f64) -> f32 {
        match self.target {
            Some((target, tau)) if tau > 0.0 => {
                let dt = (t - self.time).max(0.0);
                let k = libm::exp(-dt / tau) as f32;
                target + (self.value - target) * k
            }
            Some((target, _)) => target,
            None => self.value,
        }
    }

    fn apply(&mut self, event: &Scheduled) {
        *self = match event.kind {
            Automation::Set(v) | Automation::Linear(v) | Automation::Exponential(v) => Segment {
                time: event.time,
                value: v,
                target: None,
            },
            Automation::Target { target, tau } => Segment {
                time: event.time,
                value: self.value_at(event.time),
                target: Some((target, tau)),
            },
        };
    }
}

/// An automatable parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    segment: Segment,
    events: Vec<Scheduled>,
}

impl Param {
    pub fn new(value: f32) -> Self {
        Self {
            segment: Segment {
                time: 0.0,
                value,
                target: None,
            },
            events: Vec::new(),
        }
    }

    /// Jump to `value` at `time`.
    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(time, Automation::Set(value));
    }

    /// Ramp linearly from the previous event to `value`, arriving at `time`.
    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(time, Automation::Linear(value));
    }

    /// Ramp exponentially from the previous event to `value`, arriving at
    /// `time`. Endpoints of opposite sign or at zero hold the start value
    /// until `time`.
    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(time, Automation::Exponential(value));
    }

    /// Approach `target` from `start` on, with time constant `tau` seconds.
    pub fn set_target_at_time(&mut self, target: f32, start: f64, tau: f64) {
        self.insert(start, Automation::Target { target, tau });
    }

    /// Drop every event at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time < time);
    }

    /// Discard all automation and hold `value` from `time` on.
    pub fn force(&mut self, value: f32, time: f64) {
        self.events.clear();
        self.segment = Segment {
            time,
            value,
            target: None,
        };
    }

    /// Number of events still pending.
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    /// Value at audio-clock time `t`.
    pub fn value_at(&self, t: f64) -> f32 {
        let mut segment = self.segment;
        for event in &self.events {
            if event.time <= t {
                segment.apply(event);
                continue;
            }
            return match event.kind {
                Automation::Linear(end) => {
                    let span = event.time - segment.time;
                    let start = segment.value;
                    if span <= 0.0 {
                        return end;
                    }
                    let frac = ((t - segment.time) / span).clamp(0.0, 1.0) as f32;
                    start + (end - start) * frac
                }
                Automation::Exponential(end) => {
                    let span = event.time - segment.time;
                    let start = segment.value;
                    if span <= 0.0 {
                        return end;
                    }
                    if start == 0.0 || end == 0.0 || (start > 0.0) != (end > 0.0) {
                        return start;
                    }
                    let frac = ((t - segment.time) / span).clamp(0.0, 1.0) as f32;
                    start * libm::powf(end / start, frac)
                }
                _ => segment.value_at(t),
            };
        }
        segment.value_at(t)
    }

    /// Fold events at or before `t` into the segment, then evaluate.
    ///
    /// Rendering calls this once per frame with a non-decreasing `t`.
    pub fn tick(&mut self, t: f64) -> f32 {
        if self.events.is_empty() && self.segment.target.is_none() {
            return self.segment.value;
        }
        let due = self.events.iter().take_while(|e| e.time <= t).count();
        if due > 0 {
            for event in self.events.drain(..due) {
                self.segment.apply(&event);
            }
        }
        self.value_at(t)
    }

    fn insert(&mut self, time: f64, kind: Automation) {
        if !time.is_finite() {
            return;
        }
        let pos = self.events.partition_point(|e| e.time <= time);
        self.events.insert(pos, Scheduled { time, kind });
    }
}

impl Default for Param {
    fn default() -> Self {
        Self::new(0.0)
    }
}
