//! Instrument factory: one node topology per [`InstrumentKind`].
//!
//! Every topology ends in the voice's single envelope gain node, which the
//! factory connects to the requested output. All sources are started at
//! `when` before [`build`] returns. Envelopes and filter sweeps are
//! parameter ramps anchored at `when`.

use alloc::vec::Vec;

use mp_ir::InstrumentKind;

use crate::error::GraphError;
use crate::filter::FilterKind;
use crate::graph::{Graph, NodeKey};
use crate::node::{ParamId, Waveform};

/// Level the exponential ramps decay toward. Never zero.
pub const RELEASE_FLOOR: f32 = 0.0001;

/// What to build.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Patch {
    Instrument { kind: InstrumentKind, frequency: f32 },
    /// Metronome click; accented clicks are pitched higher.
    Click { accent: bool },
}

/// Timing and level for a voice being built.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceParams {
    /// Audio-clock start time.
    pub when: f64,
    /// Envelope peak.
    pub level: f32,
    /// Default attack; some instruments use a longer one.
    pub attack: f64,
    /// Seed for noise sources.
    pub seed: u64,
}

/// Nodes owned by one voice.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VoiceNodes {
    /// Started sources (oscillators, noise, buffers).
    pub sources: Vec<NodeKey>,
    /// Processing nodes (filters, gains, shapers), envelope excluded.
    pub nodes: Vec<NodeKey>,
    /// The voice gain node.
    pub envelope: NodeKey,
}

impl VoiceNodes {
    /// Every node, sources first, envelope last.
    pub fn all(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.sources
            .iter()
            .chain(self.nodes.iter())
            .copied()
            .chain(core::iter::once(self.envelope))
    }
}

/// Build `patch` into `graph` and route its envelope to `output`.
///
/// On failure every node created so far is removed again.
pub fn build(
    graph: &mut Graph,
    patch: Patch,
    params: VoiceParams,
    output: NodeKey,
) -> Result<VoiceNodes, GraphError> {
    let mut b = Builder::new(graph, params);
    match b.assemble(patch, output) {
        Ok(envelope) => Ok(b.finish(envelope)),
        Err(e) => {
            b.abort();
            Err(e)
        }
    }
}

/// Attack time for an instrument, `default` unless it swells in slowly.
pub fn attack_seconds(kind: InstrumentKind, default: f64) -> f64 {
    match kind {
        InstrumentKind::Pad => 0.4,
        InstrumentKind::Strings => 0.15,
        InstrumentKind::Choir => 0.1,
        InstrumentKind::Flute => 0.05,
        _ => default,
    }
}

struct Builder<'g> {
    graph: &'g mut Graph,
    p: VoiceParams,
    sources: Vec<NodeKey>,
    nodes: Vec<NodeKey>,
    seed: u64,
}

impl<'g> Builder<'g> {
    fn new(graph: &'g mut Graph, p: VoiceParams) -> Self {
        Self {
            graph,
            p,
            sources: Vec::new(),
            nodes: Vec::new(),
            seed: p.seed,
        }
    }

    fn assemble(&mut self, patch: Patch, output: NodeKey) -> Result<NodeKey, GraphError> {
        let envelope = self.gain(0.0);
        self.graph.connect(envelope, output)?;
        let when = self.p.when;
        match patch {
            Patch::Click { accent } => {
                let freq = if accent { 1500.0 } else { 1000.0 };
                let osc = self.osc(Waveform::Sine, freq)?;
                self.connect(osc, envelope)?;
                let env = self.graph.param_mut(envelope, ParamId::Gain)?;
                env.set_value_at_time(self.p.level, when);
                env.exponential_ramp_to_value_at_time(RELEASE_FLOOR, when + 0.05);
            }
            Patch::Instrument { kind, frequency } => {
                let f = frequency.max(1.0);
                match kind {
                    InstrumentKind::Synth => self.synth(f, envelope)?,
                    InstrumentKind::Piano => self.piano(f, envelope)?,
                    InstrumentKind::Strings => self.strings(f, envelope)?,
                    InstrumentKind::Bells => self.bells(f, envelope)?,
                    InstrumentKind::Bass => self.bass(f, envelope)?,
                    InstrumentKind::Lead => self.lead(f, envelope)?,
                    InstrumentKind::Pad => self.pad(f, envelope)?,
                    InstrumentKind::Pluck => self.pluck(f, envelope)?,
                    InstrumentKind::Organ => self.organ(f, envelope)?,
                    InstrumentKind::Flute => self.flute(f, envelope)?,
                    InstrumentKind::Brass => self.brass(f, envelope)?,
                    InstrumentKind::Choir => self.choir(f, envelope)?,
                }
                let attack = attack_seconds(kind, self.p.attack).max(0.001);
                let env = self.graph.param_mut(envelope, ParamId::Gain)?;
                env.set_value_at_time(0.0, when);
                env.linear_ramp_to_value_at_time(self.p.level, when + attack);
            }
        }
        Ok(envelope)
    }

    fn finish(self, envelope: NodeKey) -> VoiceNodes {
        let nodes = self.nodes.into_iter().filter(|k| *k != envelope).collect();
        VoiceNodes {
            sources: self.sources,
            nodes,
            envelope,
        }
    }

    fn abort(self) {
        for key in self.sources.into_iter().chain(self.nodes) {
            let _ = self.graph.remove(key);
        }
    }

    // Dual oscillator through a closing lowpass.
    fn synth(&mut self, f: f32, out: NodeKey) -> Result<(), GraphError> {
        let saw = self.osc(Waveform::Sawtooth, f)?;
        let square = self.osc_detuned(Waveform::Square, f, 7.0)?;
        let mix = self.gain(0.5);
        let lp = self.filter(FilterKind::Lowpass, f * 8.0, 2.0);
        self.connect(saw, mix)?;
        self.connect(square, mix)?;
        self.connect(mix, lp)?;
        self.connect(lp, out)?;
        self.sweep(lp, (f * 8.0).min(8000.0), (f * 2.0).max(200.0), 0.4)
    }

    // Slightly stretched partials, each decaying at its own rate, plus a
    // short band-passed noise burst for the hammer.
    fn piano(&mut self, f: f32, out: NodeKey) -> Result<(), GraphError> {
        const PARTIALS: [(f32, f32, f64); 6] = [
            (1.0, 1.0, 2.5),
            (2.001, 0.5, 1.8),
            (3.003, 0.3, 1.2),
            (4.008, 0.2, 0.9),
            (5.015, 0.12, 0.6),
            (6.025, 0.08, 0.4),
        ];
        let mix = self.gain(0.45);
        self.connect(mix, out)?;
        for (ratio, amp, decay) in PARTIALS {
            let osc = self.osc(Waveform::Sine, f * ratio)?;
            let g = self.decaying_gain(amp, decay)?;
            self.connect(osc, g)?;
            self.connect(g, mix)?;
        }
        let noise = self.noise()?;
        let bp = self.filter(FilterKind::Bandpass, (f * 4.0).min(6000.0), 1.5);
        let burst = self.decaying_gain(0.3, 0.03)?;
        self.connect(noise, bp)?;
        self.connect(bp, burst)?;
        self.connect(burst, out)
    }

    // Five detuned saws sharing one vibrato LFO.
    fn strings(&mut self, f: f32, out: NodeKey) -> Result<(), GraphError> {
        let vibrato = self.lfo(5.5, f * 0.004)?;
        let lp = self.filter(FilterKind::Lowpass, 3000.0, 0.7);
        let mix = self.gain(0.2);
        for cents in [-12.0, -6.0, 0.0, 6.0, 12.0] {
            let saw = self.osc_detuned(Waveform::Sawtooth, f, cents)?;
            self.modulate(vibrato, saw, ParamId::Frequency)?;
            self.connect(saw, mix)?;
        }
        self.connect(mix, lp)?;
        self.connect(lp, out)
    }

    // Two FM pairs with decaying modulation index.
    fn bells(&mut self, f: f32, out: NodeKey) -> Result<(), GraphError> {
        let pairs: [(f32, f32, f32, f64, f32, f64); 2] = [
            // carrier ratio, modulator ratio, index, index decay, level, level decay
            (1.0, 3.5, 2.0, 1.5, 0.6, 3.0),
            (2.76, 1.4, 1.5, 0.8, 0.3, 1.5),
        ];
        for (carrier_ratio, mod_ratio, index, index_decay, level, level_decay) in pairs {
            let carrier_f = f * carrier_ratio;
            let modulator = self.osc(Waveform::Sine, carrier_f * mod_ratio)?;
            let depth = self.decaying_gain(carrier_f * mod_ratio * index, index_decay)?;
            let carrier = self.osc(Waveform::Sine, carrier_f)?;
            let amp = self.decaying_gain(level, level_decay)?;
            self.connect(modulator, depth)?;
            self.modulate(depth, carrier, ParamId::Frequency)?;
            self.connect(carrier, amp)?;
            self.connect(amp, out)?;
        }
        Ok(())
    }

    // Sine plus a square an octave down.
    fn bass(&mut self, f: f32, out: NodeKey) -> Result<(), GraphError> {
        let sine = self.osc(Waveform::Sine, f)?;
        let sub = self.osc(Waveform::Square, f * 0.5)?;
        let sine_level = self.gain(0.7);
        let sub_level = self.gain(0.25);
        let lp = self.filter(FilterKind::Lowpass, 800.0, 1.0);
        self.connect(sine, sine_level)?;
        self.connect(sub, sub_level)?;
        self.connect(sine_level, lp)?;
        self.connect(sub_level, lp)?;
        self.connect(lp, out)
    }

    // Three oscillators driven into a soft clipper.
    fn lead(&mut self, f: f32, out: NodeKey) -> Result<(), GraphError> {
        let a = self.osc(Waveform::Sawtooth, f)?;
        let b = self.osc_detuned(Waveform::Sawtooth, f, -8.0)?;
        let c = self.osc(Waveform::Square, f * 0.5)?;
        let mix = self.gain(0.33);
        let shaper = self.shaper(3.0);
        let lp = self.filter(FilterKind::Lowpass, 5000.0, 1.0);
        let level = self.gain(0.5);
        for osc in [a, b, c] {
            self.connect(osc, mix)?;
        }
        self.connect(mix, shaper)?;
        self.connect(shaper, lp)?;
        self.connect(lp, level)?;
        self.connect(level, out)
    }

    // Six chorused saws through a lowpass and a highpass.
    fn pad(&mut self, f: f32, out: NodeKey) -> Result<(), GraphError> {
        let mix = self.gain(1.0 / 6.0);
        let lp = self.filter(FilterKind::Lowpass, 2500.0, 0.7);
        let hp = self.filter(FilterKind::Highpass, 120.0, 0.7);
        for cents in [-15.0, -9.0, -3.0, 3.0, 9.0, 15.0] {
            let saw = self.osc_detuned(Waveform::Sawtooth, f, cents)?;
            self.connect(saw, mix)?;
        }
        self.connect(mix, lp)?;
        self.connect(lp, hp)?;
        self.connect(hp, out)
    }

    // Bright decaying tone with the highpass falling away.
    fn pluck(&mut self, f: f32, out: NodeKey) -> Result<(), GraphError> {
        let saw = self.osc(Waveform::Sawtooth, f)?;
        let tri = self.osc(Waveform::Triangle, f)?;
        let body = self.decaying_gain(0.5, 1.0)?;
        let hp = self.filter(FilterKind::Highpass, 2000.0, 0.7);
        self.connect(saw, body)?;
        self.connect(tri, body)?;
        self.connect(body, hp)?;
        self.connect(hp, out)?;
        self.sweep(hp, 2000.0, 100.0, 0.3)
    }

    // Drawbar sines.
    fn organ(&mut self, f: f32, out: NodeKey) -> Result<(), GraphError> {
        const DRAWBARS: [(f32, f32); 9] = [
            (0.5, 0.5),
            (1.0, 1.0),
            (1.5, 0.6),
            (2.0, 0.5),
            (3.0, 0.35),
            (4.0, 0.3),
            (5.0, 0.2),
            (6.0, 0.15),
            (8.0, 0.1),
        ];
        let total: f32 = DRAWBARS.iter().map(|(_, amp)| amp).sum();
        for (ratio, amp) in DRAWBARS {
            let osc = self.osc(Waveform::Sine, f * ratio)?;
            let g = self.gain(amp / total);
            self.connect(osc, g)?;
            self.connect(g, out)?;
        }
        Ok(())
    }

    // Sine with an overtone, vibrato fading in after the onset, and breath.
    fn flute(&mut self, f: f32, out: NodeKey) -> Result<(), GraphError> {
        let when = self.p.when;
        let tone = self.osc(Waveform::Sine, f)?;
        let overtone = self.osc(Waveform::Triangle, f * 2.0)?;
        let overtone_level = self.gain(0.15);
        let lfo = self.osc(Waveform::Sine, 5.0)?;
        let depth = self.gain(0.0);
        {
            let d = self.graph.param_mut(depth, ParamId::Gain)?;
            d.set_value_at_time(0.0, when + 0.2);
            d.linear_ramp_to_value_at_time(f * 0.006, when + 0.5);
        }
        self.connect(lfo, depth)?;
        self.modulate(depth, tone, ParamId::Frequency)?;
        self.modulate(depth, overtone, ParamId::Frequency)?;
        self.connect(tone, out)?;
        self.connect(overtone, overtone_level)?;
        self.connect(overtone_level, out)?;

        let breath = self.noise()?;
        let bp = self.filter(FilterKind::Bandpass, (f * 2.0).min(8000.0), 2.0);
        let breath_level = self.gain(0.08);
        self.connect(breath, bp)?;
        self.connect(bp, breath_level)?;
        self.connect(breath_level, out)
    }

    // Two saws, a filter that opens then settles, and an overshooting blat.
    fn brass(&mut self, f: f32, out: NodeKey) -> Result<(), GraphError> {
        let when = self.p.when;
        let a = self.osc(Waveform::Sawtooth, f)?;
        let b = self.osc_detuned(Waveform::Sawtooth, f, 6.0)?;
        let lp = self.filter(FilterKind::Lowpass, f * 1.5, 1.5);
        let blat = self.gain(0.0);
        self.connect(a, lp)?;
        self.connect(b, lp)?;
        self.connect(lp, blat)?;
        self.connect(blat, out)?;
        {
            let cutoff = self.graph.param_mut(lp, ParamId::Frequency)?;
            cutoff.set_value_at_time(f * 1.5, when);
            cutoff.exponential_ramp_to_value_at_time(f * 6.0, when + 0.08);
            cutoff.exponential_ramp_to_value_at_time(f * 4.0, when + 0.3);
        }
        let g = self.graph.param_mut(blat, ParamId::Gain)?;
        g.set_value_at_time(0.0, when);
        g.linear_ramp_to_value_at_time(1.3, when + 0.05);
        g.linear_ramp_to_value_at_time(0.9, when + 0.15);
        Ok(())
    }

    // Three vibrato saws through parallel vowel formants.
    fn choir(&mut self, f: f32, out: NodeKey) -> Result<(), GraphError> {
        const FORMANTS: [(f32, f32); 3] = [(800.0, 1.0), (1150.0, 0.6), (2900.0, 0.25)];
        let vibrato = self.lfo(4.5, f * 0.005)?;
        let mix = self.gain(0.33);
        for cents in [-10.0, 0.0, 10.0] {
            let saw = self.osc_detuned(Waveform::Sawtooth, f, cents)?;
            self.modulate(vibrato, saw, ParamId::Frequency)?;
            self.connect(saw, mix)?;
        }
        for (centre, amp) in FORMANTS {
            let bp = self.filter(FilterKind::Bandpass, centre, 5.0);
            let g = self.gain(amp);
            self.connect(mix, bp)?;
            self.connect(bp, g)?;
            self.connect(g, out)?;
        }
        Ok(())
    }

    fn osc(&mut self, waveform: Waveform, frequency: f32) -> Result<NodeKey, GraphError> {
        let key = self.graph.add_oscillator(waveform, frequency);
        self.sources.push(key);
        self.graph.start(key, self.p.when)?;
        Ok(key)
    }

    fn osc_detuned(&mut self, waveform: Waveform, f: f32, cents: f32) -> Result<NodeKey, GraphError> {
        let key = self.osc(waveform, f)?;
        self.graph.param_mut(key, ParamId::Detune)?.set_value_at_time(cents, 0.0);
        Ok(key)
    }

    fn noise(&mut self) -> Result<NodeKey, GraphError> {
        self.seed = self.seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let key = self.graph.add_noise(self.seed);
        self.sources.push(key);
        self.graph.start(key, self.p.when)?;
        Ok(key)
    }

    /// Sine LFO scaled to `depth` Hz.
    fn lfo(&mut self, rate: f32, depth: f32) -> Result<NodeKey, GraphError> {
        let lfo = self.osc(Waveform::Sine, rate)?;
        let scale = self.gain(depth);
        self.connect(lfo, scale)?;
        Ok(scale)
    }

    fn filter(&mut self, kind: FilterKind, frequency: f32, q: f32) -> NodeKey {
        let key = self.graph.add_filter(kind, frequency, q);
        self.nodes.push(key);
        key
    }

    fn gain(&mut self, gain: f32) -> NodeKey {
        let key = self.graph.add_gain(gain);
        self.nodes.push(key);
        key
    }

    fn shaper(&mut self, drive: f32) -> NodeKey {
        let key = self.graph.add_shaper(drive);
        self.nodes.push(key);
        key
    }

    fn decaying_gain(&mut self, peak: f32, seconds: f64) -> Result<NodeKey, GraphError> {
        let when = self.p.when;
        let key = self.gain(peak);
        let g = self.graph.param_mut(key, ParamId::Gain)?;
        g.set_value_at_time(peak, when);
        g.exponential_ramp_to_value_at_time(RELEASE_FLOOR, when + seconds);
        Ok(key)
    }

    fn sweep(&mut self, filter: NodeKey, from: f32, to: f32, seconds: f64) -> Result<(), GraphError> {
        let when = self.p.when;
        let cutoff = self.graph.param_mut(filter, ParamId::Frequency)?;
        cutoff.set_value_at_time(from, when);
        cutoff.exponential_ramp_to_value_at_time(to, when + seconds);
        Ok(())
    }

    fn connect(&mut self, from: NodeKey, to: NodeKey) -> Result<(), GraphError> {
        self.graph.connect(from, to)
    }

    fn modulate(&mut self, from: NodeKey, to: NodeKey, param: ParamId) -> Result<(), GraphError> {
        self.graph.connect_param(from, to, param)
    }
}
