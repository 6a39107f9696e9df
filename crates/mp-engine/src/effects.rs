//! Per-track effects chain: lowpass -> delay -> reverb -> output gain.
//!
//! The chain renders as a single graph node so the delay feedback loop
//! never appears as a cycle in the node graph. Every control write is a
//! `set_target_at_time` against the audio clock, smoothed by the
//! configured time constant.

use alloc::vec;
use alloc::vec::Vec;

use crate::convolver::{Convolver, BLOCK};
use crate::filter::{Biquad, FilterKind};
use crate::frame::Stereo;
use crate::param::Param;

/// Fraction of the delayed signal fed back into the delay line.
pub const DELAY_FEEDBACK: f32 = 0.35;

/// Longest delay the line can hold, in seconds.
pub const MAX_DELAY_SECONDS: f32 = 1.0;

const FILTER_Q: f32 = 0.707;
const SILENCE: f32 = 1.0e-6;
const MIX_EPSILON: f32 = 1.0e-4;

/// Initial control values for a chain, already in audio units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChainSettings {
    pub cutoff_hz: f32,
    pub delay_mix: f32,
    pub delay_seconds: f32,
    pub reverb_mix: f32,
    pub gain: f32,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            cutoff_hz: 20_000.0,
            delay_mix: 0.0,
            delay_seconds: 0.3,
            reverb_mix: 0.2,
            gain: 0.8,
        }
    }
}

/// Stereo noise shaped by `(1 - i/len)^2`, each channel independent and
/// scaled to unit energy.
pub fn reverb_impulse(rng: &mut fastrand::Rng, len: usize) -> [Vec<f32>; 2] {
    let mut channel = || {
        let mut data: Vec<f32> = (0..len)
            .map(|i| {
                let env = 1.0 - i as f32 / len as f32;
                (rng.f32() * 2.0 - 1.0) * env * env
            })
            .collect();
        let energy: f32 = data.iter().map(|x| x * x).sum();
        if energy > 0.0 {
            let scale = 1.0 / libm::sqrtf(energy);
            data.iter_mut().for_each(|x| *x *= scale);
        }
        data
    };
    let left = channel();
    let right = channel();
    [left, right]
}

/// One track's effects chain.
#[derive(Clone, Debug)]
pub struct EffectsChain {
    sample_rate: f32,
    smoothing: f64,
    cutoff: Param,
    delay_time: Param,
    delay_mix: Param,
    reverb_mix: Param,
    gain: Param,
    filter: Biquad,
    delay_line: [Vec<f32>; 2],
    write: usize,
    impulse: [Vec<f32>; 2],
    reverb: Option<[Convolver; 2]>,
    reverb_running: bool,
    silent_frames: usize,
}

impl EffectsChain {
    pub fn new(
        sample_rate: f32,
        settings: ChainSettings,
        impulse: [Vec<f32>; 2],
        smoothing: f64,
    ) -> Self {
        let line_len = (MAX_DELAY_SECONDS * sample_rate) as usize + 2;
        Self {
            sample_rate,
            smoothing,
            cutoff: Param::new(settings.cutoff_hz),
            delay_time: Param::new(settings.delay_seconds),
            delay_mix: Param::new(settings.delay_mix),
            reverb_mix: Param::new(settings.reverb_mix),
            gain: Param::new(settings.gain),
            filter: Biquad::new(FilterKind::Lowpass),
            delay_line: [vec![0.0; line_len], vec![0.0; line_len]],
            write: 0,
            impulse,
            reverb: None,
            reverb_running: false,
            silent_frames: 0,
        }
    }

    pub fn set_cutoff(&mut self, hz: f32, now: f64) {
        self.cutoff.set_target_at_time(hz, now, self.smoothing);
    }

    pub fn set_delay_mix(&mut self, mix: f32, now: f64) {
        self.delay_mix.set_target_at_time(mix, now, self.smoothing);
    }

    pub fn set_delay_time(&mut self, seconds: f32, now: f64) {
        let seconds = seconds.clamp(0.0, MAX_DELAY_SECONDS);
        self.delay_time.set_target_at_time(seconds, now, self.smoothing);
    }

    pub fn set_reverb_mix(&mut self, mix: f32, now: f64) {
        self.reverb_mix.set_target_at_time(mix, now, self.smoothing);
    }

    pub fn set_gain(&mut self, gain: f32, now: f64) {
        self.gain.set_target_at_time(gain, now, self.smoothing);
    }

    /// Output gain automation, for callers that need to mute the chain.
    pub fn gain_param(&mut self) -> &mut Param {
        &mut self.gain
    }

    /// Whether the convolvers are currently doing work.
    pub fn reverb_running(&self) -> bool {
        self.reverb_running
    }

    pub fn process(&mut self, input: Stereo, t: f64) -> Stereo {
        let cutoff = self.cutoff.tick(t);
        let filtered = self.filter.process(input, cutoff, FILTER_Q, self.sample_rate);

        let delay_time = self.delay_time.tick(t);
        let delayed = self.read_delay(delay_time);
        let len = self.delay_line[0].len();
        self.delay_line[0][self.write] = filtered.left + delayed.left * DELAY_FEEDBACK;
        self.delay_line[1][self.write] = filtered.right + delayed.right * DELAY_FEEDBACK;
        self.write = (self.write + 1) % len;
        let dry = filtered + delayed * self.delay_mix.tick(t);

        let mix = self.reverb_mix.tick(t).clamp(0.0, 1.0);
        let out = self.reverb(dry, mix);
        out * self.gain.tick(t)
    }

    fn read_delay(&self, seconds: f32) -> Stereo {
        let len = self.delay_line[0].len();
        let samples = (seconds * self.sample_rate).clamp(1.0, (len - 2) as f32);
        let whole = samples as usize;
        let frac = samples - whole as f32;
        let a = (self.write + len - whole) % len;
        let b = (a + len - 1) % len;
        let tap = |line: &Vec<f32>| line[a] + (line[b] - line[a]) * frac;
        Stereo::new(tap(&self.delay_line[0]), tap(&self.delay_line[1]))
    }

    fn reverb(&mut self, dry: Stereo, mix: f32) -> Stereo {
        if dry.peak() < SILENCE {
            self.silent_frames = self.silent_frames.saturating_add(1);
        } else {
            self.silent_frames = 0;
        }
        let tail = self.impulse[0].len() + 2 * BLOCK;
        if mix <= MIX_EPSILON || self.silent_frames > tail {
            self.reverb_running = false;
            return dry * (1.0 - mix);
        }
        if !self.reverb_running {
            match self.reverb.as_mut() {
                Some(convolvers) => convolvers.iter_mut().for_each(Convolver::reset),
                None => {
                    self.reverb = Some([
                        Convolver::new(&self.impulse[0], BLOCK),
                        Convolver::new(&self.impulse[1], BLOCK),
                    ]);
                }
            }
            self.reverb_running = true;
        }
        let Some([left, right]) = self.reverb.as_mut() else {
            return dry;
        };
        let wet = Stereo::new(left.process(dry.left), right.process(dry.right));
        dry * (1.0 - mix) + wet * mix
    }
}
