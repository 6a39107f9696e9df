//! A sounding voice and its envelope transitions.

use mp_ir::{InstrumentKind, NoteId};

use crate::error::GraphError;
use crate::graph::Graph;
use crate::instruments::{VoiceNodes, RELEASE_FLOOR};
use crate::node::ParamId;

/// Lifecycle state of a registered voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceState {
    /// Attack/sustain; responds to note-off.
    Active,
    /// Release ramp running; teardown is pending.
    Releasing,
}

/// What produced the voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceKind {
    Synth(InstrumentKind),
    Sample,
    Click,
}

/// One sounding instance: owned nodes plus lifecycle bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct Voice {
    pub id: NoteId,
    pub kind: VoiceKind,
    /// Owning track, `None` when routed to the fallback chain.
    pub track: Option<usize>,
    pub nodes: VoiceNodes,
    pub state: VoiceState,
    /// Audio-clock time the sources start.
    pub started_at: f64,
    /// Release used when the safety timeout stops the voice.
    pub release: f64,
    /// Disposed as soon as every source has ended on its own.
    pub one_shot: bool,
}

impl Voice {
    pub fn new(
        id: NoteId,
        kind: VoiceKind,
        track: Option<usize>,
        nodes: VoiceNodes,
        started_at: f64,
        release: f64,
    ) -> Self {
        Self {
            id,
            kind,
            track,
            nodes,
            state: VoiceState::Active,
            started_at,
            release,
            one_shot: false,
        }
    }

    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    /// Replace pending envelope automation with an exponential fade from
    /// the current level to the floor over `seconds`.
    pub(crate) fn begin_release(
        &mut self,
        graph: &mut Graph,
        now: f64,
        seconds: f64,
    ) -> Result<(), GraphError> {
        self.state = VoiceState::Releasing;
        let env = graph.param_mut(self.nodes.envelope, ParamId::Gain)?;
        let current = env.value_at(now).max(RELEASE_FLOOR);
        env.cancel_scheduled_values(now);
        env.set_value_at_time(current, now);
        env.exponential_ramp_to_value_at_time(RELEASE_FLOOR, now + seconds.max(0.001));
        Ok(())
    }

    /// Drop the envelope to zero immediately.
    pub(crate) fn silence(&self, graph: &mut Graph, now: f64) {
        if let Ok(env) = graph.param_mut(self.nodes.envelope, ParamId::Gain) {
            env.force(0.0, now);
        }
    }

    /// Stop every source and remove every node. Nodes already gone are
    /// expected (teardown can race a panic) and ignored.
    pub(crate) fn dispose(&self, graph: &mut Graph, now: f64) {
        for src in &self.nodes.sources {
            if let Err(e) = graph.stop(*src, now) {
                log::trace!("stop {:?} during teardown: {}", self.id, e);
            }
        }
        for key in self.nodes.all() {
            if let Err(e) = graph.remove(key) {
                log::trace!("remove {:?} during teardown: {}", self.id, e);
            }
        }
    }

    /// Whether all sources have finished on their own.
    pub(crate) fn sources_ended(&self, graph: &Graph) -> bool {
        self.nodes
            .sources
            .iter()
            .all(|src| graph.is_ended(*src).unwrap_or(true))
    }
}
