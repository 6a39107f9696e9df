//! Node kinds rendered by the [`crate::Graph`].

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::f64::consts::TAU;

use mp_ir::SampleBuffer;

use crate::effects::EffectsChain;
use crate::filter::{Biquad, FilterKind};
use crate::frame::Stereo;
use crate::param::Param;

/// Oscillator wave shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Automatable parameters a node may expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamId {
    Frequency,
    /// Cents.
    Detune,
    Gain,
    Q,
    PlaybackRate,
}

pub(crate) const PARAM_COUNT: usize = 5;

impl ParamId {
    pub(crate) fn index(self) -> usize {
        match self {
            ParamId::Frequency => 0,
            ParamId::Detune => 1,
            ParamId::Gain => 2,
            ParamId::Q => 3,
            ParamId::PlaybackRate => 4,
        }
    }
}

/// Start/stop bookkeeping shared by every source node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Transport {
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub ended: bool,
}

impl Transport {
    /// Whether the source produces output at `t`. Flags `ended` once past stop.
    fn sounding(&mut self, t: f64) -> bool {
        if self.ended {
            return false;
        }
        match (self.start, self.stop) {
            (Some(_), Some(stop)) if t >= stop => {
                self.ended = true;
                false
            }
            (Some(start), _) => t >= start,
            (None, _) => false,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Oscillator {
    pub waveform: Waveform,
    pub frequency: Param,
    pub detune: Param,
    pub phase: f64,
    pub transport: Transport,
}

#[derive(Clone, Debug)]
pub(crate) struct Noise {
    pub rng: fastrand::Rng,
    pub transport: Transport,
}

#[derive(Clone, Debug)]
pub(crate) struct BufferSource {
    pub buffer: Arc<SampleBuffer>,
    pub playback_rate: Param,
    pub position: f64,
    pub transport: Transport,
}

#[derive(Clone, Debug)]
pub(crate) struct Filter {
    pub biquad: Biquad,
    pub frequency: Param,
    pub q: Param,
}

#[derive(Clone, Debug)]
pub(crate) enum NodeKind {
    Oscillator(Oscillator),
    Noise(Noise),
    Buffer(BufferSource),
    Filter(Filter),
    Gain(Param),
    /// `tanh(drive * x) / tanh(drive)`
    Shaper(f32),
    Effects(Box<EffectsChain>),
}

impl NodeKind {
    pub(crate) fn transport_mut(&mut self) -> Option<&mut Transport> {
        match self {
            NodeKind::Oscillator(o) => Some(&mut o.transport),
            NodeKind::Noise(n) => Some(&mut n.transport),
            NodeKind::Buffer(b) => Some(&mut b.transport),
            _ => None,
        }
    }

    pub(crate) fn transport(&self) -> Option<&Transport> {
        match self {
            NodeKind::Oscillator(o) => Some(&o.transport),
            NodeKind::Noise(n) => Some(&n.transport),
            NodeKind::Buffer(b) => Some(&b.transport),
            _ => None,
        }
    }

    pub(crate) fn param_mut(&mut self, id: ParamId) -> Option<&mut Param> {
        match (self, id) {
            (NodeKind::Oscillator(o), ParamId::Frequency) => Some(&mut o.frequency),
            (NodeKind::Oscillator(o), ParamId::Detune) => Some(&mut o.detune),
            (NodeKind::Buffer(b), ParamId::PlaybackRate) => Some(&mut b.playback_rate),
            (NodeKind::Filter(f), ParamId::Frequency) => Some(&mut f.frequency),
            (NodeKind::Filter(f), ParamId::Q) => Some(&mut f.q),
            (NodeKind::Gain(g), ParamId::Gain) => Some(g),
            (NodeKind::Effects(chain), ParamId::Gain) => Some(chain.gain_param()),
            _ => None,
        }
    }

    /// Render one frame. `mods` holds the summed modulator input per param.
    pub(crate) fn process(
        &mut self,
        input: Stereo,
        mods: &[f32; PARAM_COUNT],
        t: f64,
        sample_rate: f32,
    ) -> Stereo {
        match self {
            NodeKind::Oscillator(osc) => {
                if !osc.transport.sounding(t) {
                    return Stereo::SILENCE;
                }
                let base = osc.frequency.tick(t) + mods[ParamId::Frequency.index()];
                let cents = osc.detune.tick(t) + mods[ParamId::Detune.index()];
                let freq = base as f64 * libm::pow(2.0, cents as f64 / 1200.0);
                let inc = freq / sample_rate as f64;
                let value = waveform_sample(osc.waveform, osc.phase, inc);
                osc.phase = wrap(osc.phase + inc);
                Stereo::mono(value)
            }
            NodeKind::Noise(noise) => {
                if !noise.transport.sounding(t) {
                    return Stereo::SILENCE;
                }
                Stereo::mono(noise.rng.f32() * 2.0 - 1.0)
            }
            NodeKind::Buffer(src) => {
                if !src.transport.sounding(t) {
                    return Stereo::SILENCE;
                }
                let rate = src.playback_rate.tick(t) + mods[ParamId::PlaybackRate.index()];
                if src.position >= src.buffer.len() as f64 {
                    src.transport.ended = true;
                    return Stereo::SILENCE;
                }
                let (left, right) = src.buffer.frame_at(src.position);
                let ratio = src.buffer.sample_rate as f64 / sample_rate as f64;
                src.position += rate.max(0.0) as f64 * ratio;
                Stereo::new(left, right)
            }
            NodeKind::Filter(f) => {
                let freq = f.frequency.tick(t) + mods[ParamId::Frequency.index()];
                let q = f.q.tick(t) + mods[ParamId::Q.index()];
                f.biquad.process(input, freq, q, sample_rate)
            }
            NodeKind::Gain(gain) => input * (gain.tick(t) + mods[ParamId::Gain.index()]),
            NodeKind::Shaper(drive) => {
                let norm = libm::tanhf(*drive);
                if norm == 0.0 {
                    return input;
                }
                let shape = |x: f32| libm::tanhf(*drive * x) / norm;
                Stereo::new(shape(input.left), shape(input.right))
            }
            NodeKind::Effects(chain) => chain.process(input, t),
        }
    }
}

/// Band-limited (polyBLEP) saw and square; naive sine and triangle.
fn waveform_sample(waveform: Waveform, phase: f64, inc: f64) -> f32 {
    let value = match waveform {
        Waveform::Sine => libm::sin(TAU * phase),
        Waveform::Sawtooth => 2.0 * phase - 1.0 - poly_blep(phase, inc),
        Waveform::Square => {
            let naive = if phase < 0.5 { 1.0 } else { -1.0 };
            naive + poly_blep(phase, inc) - poly_blep(wrap(phase + 0.5), inc)
        }
        Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
    };
    value as f32
}

fn wrap(phase: f64) -> f64 {
    phase - libm::floor(phase)
}

fn poly_blep(phase: f64, inc: f64) -> f64 {
    let inc = inc.abs();
    if inc <= 0.0 || inc >= 1.0 {
        return 0.0;
    }
    if phase < inc {
        let x = phase / inc;
        x + x - x * x - 1.0
    } else if phase > 1.0 - inc {
        let x = (phase - 1.0) / inc;
        x * x + x + x + 1.0
    } else {
        0.0
    }
}

/// A node plus its wiring.
#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub kind: NodeKind,
    /// Audio inputs, summed.
    pub inputs: Vec<crate::graph::NodeKey>,
    /// Parameter modulators (left channel of the source is used).
    pub modulators: Vec<(ParamId, crate::graph::NodeKey)>,
    pub output: Stereo,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            inputs: Vec::new(),
            modulators: Vec::new(),
            output: Stereo::SILENCE,
        }
    }
}

pub(crate) fn oscillator(waveform: Waveform, frequency: f32) -> NodeKind {
    NodeKind::Oscillator(Oscillator {
        waveform,
        frequency: Param::new(frequency),
        detune: Param::new(0.0),
        phase: 0.0,
        transport: Transport::default(),
    })
}

pub(crate) fn filter(kind: FilterKind, frequency: f32, q: f32) -> NodeKind {
    NodeKind::Filter(Filter {
        biquad: Biquad::new(kind),
        frequency: Param::new(frequency),
        q: Param::new(q),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_is_silent_until_start_and_ends_at_stop() {
        let mut tr = Transport::default();
        assert!(!tr.sounding(0.0));
        tr.start = Some(1.0);
        assert!(!tr.sounding(0.5));
        assert!(tr.sounding(1.0));
        tr.stop = Some(2.0);
        assert!(tr.sounding(1.5));
        assert!(!tr.sounding(2.0));
        assert!(tr.ended);
        assert!(!tr.sounding(1.5));
    }

    #[test]
    fn waveforms_stay_in_range() {
        for wf in [Waveform::Sine, Waveform::Square, Waveform::Sawtooth, Waveform::Triangle] {
            for i in 0..1000 {
                let phase = i as f64 / 1000.0;
                let v = waveform_sample(wf, phase, 0.01);
                assert!(v.abs() <= 1.0001, "{wf:?} at {phase}: {v}");
            }
        }
    }

    #[test]
    fn oscillator_frequency_follows_detune() {
        let mut osc = oscillator(Waveform::Sawtooth, 100.0);
        if let NodeKind::Oscillator(o) = &mut osc {
            o.transport.start = Some(0.0);
            o.detune = Param::new(1200.0);
        }
        let mods = [0.0; PARAM_COUNT];
        osc.process(Stereo::SILENCE, &mods, 0.0, 8000.0);
        if let NodeKind::Oscillator(o) = &osc {
            assert!((o.phase - 200.0 / 8000.0).abs() < 1e-9);
        }
    }

    #[test]
    fn shaper_is_bounded() {
        let mut shaper = NodeKind::Shaper(4.0);
        let mods = [0.0; PARAM_COUNT];
        let out = shaper.process(Stereo::new(10.0, -10.0), &mods, 0.0, 8000.0);
        assert!(out.left <= 1.0 / libm::tanhf(4.0) + 1e-6);
        assert!(out.right < 0.0);
    }

    #[test]
    fn buffer_source_ends_when_exhausted() {
        let buffer = Arc::new(SampleBuffer::from_mono("s", alloc::vec![0.5; 4], 8000));
        let mut src = NodeKind::Buffer(BufferSource {
            buffer,
            playback_rate: Param::new(2.0),
            position: 0.0,
            transport: Transport { start: Some(0.0), ..Transport::default() },
        });
        let mods = [0.0; PARAM_COUNT];
        let frames: Vec<Stereo> = (0..4)
            .map(|n| src.process(Stereo::SILENCE, &mods, n as f64 / 8000.0, 8000.0))
            .collect();
        assert_eq!(frames[0].left, 0.5);
        assert_eq!(frames[1].left, 0.5);
        assert_eq!(frames[2], Stereo::SILENCE);
        assert!(src.transport().map(|t| t.ended).unwrap_or(false));
    }
}
