//! Voice registry: identifier to voice, with timed lifecycle transitions.
//!
//! ```text
//! absent --insert--> Active --note_off--> Releasing --teardown timer--> absent
//!                      |                                                  ^
//!                      +--------------- safety timer (release) ----------+
//! ```
//!
//! Deferred work (teardown after a release, the safety stop) is kept as
//! deadlines on the audio clock and fired from [`VoiceRegistry::advance`].
//! Timers hold generational [`VoiceKey`]s, so a timer outliving its voice
//! finds nothing and does nothing.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use log::{debug, trace};
use mp_ir::NoteId;
use slotmap::SlotMap;

use crate::event_queue::EventQueue;
use crate::graph::Graph;
use crate::voice::{Voice, VoiceState};

slotmap::new_key_type! {
    /// Handle to a registered voice.
    pub struct VoiceKey;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Timer {
    Teardown,
    SafetyStop,
}

/// Timing constants for a registry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegistryConfig {
    /// No voice stays active longer than this after its start time.
    pub safety_timeout: f64,
    /// Extra time after a release ramp before nodes are removed.
    pub teardown_guard: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            safety_timeout: 10.0,
            teardown_guard: 0.05,
        }
    }
}

/// At most one live voice per [`NoteId`].
pub struct VoiceRegistry {
    voices: SlotMap<VoiceKey, Voice>,
    by_id: BTreeMap<NoteId, VoiceKey>,
    timers: EventQueue<(VoiceKey, Timer)>,
    config: RegistryConfig,
}

impl VoiceRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            voices: SlotMap::with_key(),
            by_id: BTreeMap::new(),
            timers: EventQueue::new(),
            config,
        }
    }

    /// Register a voice whose nodes are already built and started.
    ///
    /// A voice already holding the identifier, active or releasing, is torn
    /// down first.
    pub fn insert(&mut self, graph: &mut Graph, voice: Voice, now: f64) -> VoiceKey {
        if let Some(old) = self.by_id.get(&voice.id).copied() {
            debug!("superseding voice for {:?}", voice.id);
            self.dispose(graph, old, now, true);
        }
        let id = voice.id;
        let deadline = voice.started_at + self.config.safety_timeout;
        let key = self.voices.insert(voice);
        self.by_id.insert(id, key);
        self.timers.push(deadline, (key, Timer::SafetyStop));
        trace!("voice {:?} registered ({} live)", id, self.voices.len());
        key
    }

    /// Start the release of the voice under `id`.
    ///
    /// Returns false (and does nothing) if there is no voice or it is
    /// already releasing. The identifier stays registered until teardown.
    pub fn note_off(&mut self, graph: &mut Graph, id: NoteId, now: f64, release: f64) -> bool {
        match self.by_id.get(&id).copied() {
            Some(key) => self.release(graph, key, now, release),
            None => false,
        }
    }

    /// Fire due timers and reap one-shot voices whose sources have ended.
    pub fn advance(&mut self, graph: &mut Graph, now: f64) {
        while let Some(due) = self.timers.pop_due(now) {
            let (key, timer) = due.item;
            match timer {
                Timer::Teardown => {
                    if self.voices.contains_key(key) {
                        self.dispose(graph, key, now, false);
                    }
                }
                Timer::SafetyStop => {
                    let release = match self.voices.get(key) {
                        Some(v) if v.state == VoiceState::Active => {
                            debug!("safety timeout stopping {:?}", v.id);
                            v.release
                        }
                        _ => continue,
                    };
                    self.release(graph, key, now, release);
                }
            }
        }

        let ended: Vec<VoiceKey> = self
            .voices
            .iter()
            .filter(|(_, v)| v.one_shot && v.sources_ended(graph))
            .map(|(key, _)| key)
            .collect();
        for key in ended {
            self.dispose(graph, key, now, false);
        }
    }

    /// Zero every envelope, then stop and remove every voice. Returns the
    /// number of voices removed.
    pub fn panic(&mut self, graph: &mut Graph, now: f64) -> usize {
        let count = self.voices.len();
        for (_, voice) in &self.voices {
            voice.silence(graph, now);
        }
        for (_, voice) in self.voices.drain() {
            voice.dispose(graph, now);
        }
        self.by_id.clear();
        self.timers.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn contains(&self, id: NoteId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn state(&self, id: NoteId) -> Option<VoiceState> {
        self.get(id).map(|v| v.state)
    }

    pub fn get(&self, id: NoteId) -> Option<&Voice> {
        self.by_id.get(&id).and_then(|key| self.voices.get(*key))
    }

    /// Number of timers still pending, stale ones included.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    fn release(&mut self, graph: &mut Graph, key: VoiceKey, now: f64, release: f64) -> bool {
        let Some(voice) = self.voices.get_mut(key) else {
            return false;
        };
        if voice.state == VoiceState::Releasing {
            return false;
        }
        if let Err(e) = voice.begin_release(graph, now, release) {
            trace!("release {:?}: {}", voice.id, e);
        }
        let deadline = now + release.max(0.0) + self.config.teardown_guard;
        self.timers.push(deadline, (key, Timer::Teardown));
        true
    }

    fn dispose(&mut self, graph: &mut Graph, key: VoiceKey, now: f64, force_zero: bool) {
        let Some(voice) = self.voices.remove(key) else {
            return;
        };
        if self.by_id.get(&voice.id) == Some(&key) {
            self.by_id.remove(&voice.id);
        }
        if force_zero {
            voice.silence(graph, now);
        }
        voice.dispose(graph, now);
        trace!("voice {:?} torn down ({} live)", voice.id, self.voices.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::{self, Patch, VoiceNodes, VoiceParams, RELEASE_FLOOR};
    use crate::node::ParamId;
    use crate::voice::VoiceKind;
    use alloc::sync::Arc;
    use mp_ir::{InstrumentKind, SampleBuffer};

    const SR: f32 = 8000.0;
    const RELEASE: f64 = 0.2;

    fn synth(graph: &mut Graph, id: NoteId, when: f64) -> Voice {
        let dest = graph.destination();
        let patch = Patch::Instrument {
            kind: InstrumentKind::Synth,
            frequency: 220.0,
        };
        let params = VoiceParams {
            when,
            level: 0.3,
            attack: 0.01,
            seed: 1,
        };
        let nodes = instruments::build(graph, patch, params, dest).unwrap();
        Voice::new(id, VoiceKind::Synth(InstrumentKind::Synth), Some(0), nodes, when, RELEASE)
    }

    fn setup() -> (Graph, VoiceRegistry) {
        (Graph::new(SR), VoiceRegistry::new(RegistryConfig::default()))
    }

    #[test]
    fn at_most_one_voice_per_identifier() {
        let (mut g, mut reg) = setup();
        let id = NoteId::Pointer(1);
        let first = synth(&mut g, id, 0.0);
        let first_env = first.nodes.envelope;
        reg.insert(&mut g, first, 0.0);
        let second = synth(&mut g, id, 0.1);
        reg.insert(&mut g, second, 0.1);
        assert_eq!(reg.len(), 1);
        assert!(!g.contains(first_env));
        assert_eq!(reg.state(id), Some(VoiceState::Active));
    }

    #[test]
    fn note_off_is_idempotent() {
        let (mut g, mut reg) = setup();
        let id = NoteId::Pointer(2);
        let v = synth(&mut g, id, 0.0);
        reg.insert(&mut g, v, 0.0);
        assert!(reg.note_off(&mut g, id, 0.5, RELEASE));
        assert!(!reg.note_off(&mut g, id, 0.5, RELEASE));
        assert!(!reg.note_off(&mut g, NoteId::Pointer(99), 0.5, RELEASE));
        // Safety stop plus exactly one teardown.
        assert_eq!(reg.pending_timers(), 2);
    }

    #[test]
    fn identifier_is_removed_only_at_teardown() {
        let (mut g, mut reg) = setup();
        let id = NoteId::Pointer(3);
        let v = synth(&mut g, id, 0.0);
        reg.insert(&mut g, v, 0.0);
        reg.note_off(&mut g, id, 1.0, RELEASE);
        reg.advance(&mut g, 1.0 + RELEASE);
        assert_eq!(reg.state(id), Some(VoiceState::Releasing));
        reg.advance(&mut g, 1.0 + RELEASE + 0.05);
        assert!(!reg.contains(id));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn release_ramps_envelope_to_floor() {
        let (mut g, mut reg) = setup();
        let id = NoteId::Pointer(4);
        let v = synth(&mut g, id, 0.0);
        let env = v.nodes.envelope;
        reg.insert(&mut g, v, 0.0);
        reg.note_off(&mut g, id, 1.0, RELEASE);
        let p = g.param_mut(env, ParamId::Gain).unwrap();
        assert!((p.value_at(1.0) - 0.3).abs() < 1e-4);
        assert!(p.value_at(1.1) < 0.3);
        assert!((p.value_at(1.0 + RELEASE) - RELEASE_FLOOR).abs() < 1e-6);
    }

    #[test]
    fn note_on_supersedes_a_releasing_voice() {
        let (mut g, mut reg) = setup();
        let id = NoteId::Step { track: 1, step: 0 };
        let v = synth(&mut g, id, 0.0);
        reg.insert(&mut g, v, 0.0);
        reg.note_off(&mut g, id, 0.5, RELEASE);
        let v = synth(&mut g, id, 0.55);
        reg.insert(&mut g, v, 0.55);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.state(id), Some(VoiceState::Active));
        // The old teardown timer fires against a dead key.
        reg.advance(&mut g, 0.5 + RELEASE + 0.05);
        assert_eq!(reg.state(id), Some(VoiceState::Active));
    }

    #[test]
    fn no_voice_stays_active_past_safety_timeout() {
        let (mut g, mut reg) = setup();
        let id = NoteId::Pointer(5);
        let v = synth(&mut g, id, 2.0);
        reg.insert(&mut g, v, 2.0);
        reg.advance(&mut g, 11.999);
        assert_eq!(reg.state(id), Some(VoiceState::Active));
        reg.advance(&mut g, 12.0);
        assert_eq!(reg.state(id), Some(VoiceState::Releasing));
        reg.advance(&mut g, 12.0 + RELEASE + 0.05);
        assert!(reg.is_empty());
    }

    #[test]
    fn panic_clears_everything_at_once() {
        let (mut g, mut reg) = setup();
        for i in 0..3 {
            let v = synth(&mut g, NoteId::Pointer(i), 0.0);
            reg.insert(&mut g, v, 0.0);
        }
        reg.note_off(&mut g, NoteId::Pointer(0), 0.1, RELEASE);
        assert_eq!(reg.panic(&mut g, 0.2), 3);
        assert!(reg.is_empty());
        assert_eq!(reg.pending_timers(), 0);
        assert_eq!(g.len(), 1);
        assert_eq!(g.render(0.2), crate::frame::Stereo::SILENCE);
    }

    #[test]
    fn one_shot_voice_is_reaped_when_its_buffer_ends() {
        let (mut g, mut reg) = setup();
        let buffer = Arc::new(SampleBuffer::from_mono("hit", alloc::vec![0.5; 80], 8000));
        let src = g.add_buffer_source(buffer, 1.0);
        let env = g.add_gain(1.0);
        g.connect(src, env).unwrap();
        g.connect(env, g.destination()).unwrap();
        g.start(src, 0.0).unwrap();
        let nodes = VoiceNodes {
            sources: alloc::vec![src],
            nodes: Vec::new(),
            envelope: env,
        };
        let id = NoteId::Pointer(6);
        let voice = Voice::new(id, VoiceKind::Sample, Some(0), nodes, 0.0, 0.1).one_shot();
        reg.insert(&mut g, voice, 0.0);
        for n in 0..100 {
            let t = n as f64 / SR as f64;
            g.render(t);
            reg.advance(&mut g, t);
        }
        assert!(!reg.contains(id));
        assert!(!g.contains(src));
    }
}
