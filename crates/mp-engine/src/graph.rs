//! Audio node graph.
//!
//! Nodes live in a slot map and are addressed by generational [`NodeKey`]s,
//! so a key held past its node's removal fails cleanly instead of aliasing a
//! newer node. Each node sums its audio inputs; modulator connections add a
//! source's output to one of the target's parameters. Rendering walks the
//! nodes in topological order, recomputed only when wiring changes.

use alloc::sync::Arc;
use alloc::vec::Vec;

use mp_ir::SampleBuffer;
use slotmap::{SecondaryMap, SlotMap};

use crate::effects::EffectsChain;
use crate::error::GraphError;
use crate::filter::FilterKind;
use crate::frame::Stereo;
use crate::node::{
    self, BufferSource, Node, NodeKind, Noise, ParamId, Transport, Waveform, PARAM_COUNT,
};
use crate::param::Param;

slotmap::new_key_type! {
    /// Handle to a node in a [`Graph`].
    pub struct NodeKey;
}

/// The node graph plus its render order.
pub struct Graph {
    nodes: SlotMap<NodeKey, Node>,
    order: Vec<NodeKey>,
    dirty: bool,
    sample_rate: f32,
    destination: NodeKey,
}

impl Graph {
    /// Create a graph with a destination gain node at unity.
    pub fn new(sample_rate: f32) -> Self {
        let mut nodes = SlotMap::with_key();
        let destination = nodes.insert(Node::new(NodeKind::Gain(Param::new(1.0))));
        Self {
            nodes,
            order: Vec::new(),
            dirty: true,
            sample_rate,
            destination,
        }
    }

    /// The output node. Its gain param is the master level.
    pub fn destination(&self) -> NodeKey {
        self.destination
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Number of live nodes, the destination included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn add_oscillator(&mut self, waveform: Waveform, frequency: f32) -> NodeKey {
        self.insert(node::oscillator(waveform, frequency))
    }

    pub fn add_noise(&mut self, seed: u64) -> NodeKey {
        self.insert(NodeKind::Noise(Noise {
            rng: fastrand::Rng::with_seed(seed),
            transport: Transport::default(),
        }))
    }

    pub fn add_buffer_source(&mut self, buffer: Arc<SampleBuffer>, playback_rate: f32) -> NodeKey {
        self.insert(NodeKind::Buffer(BufferSource {
            buffer,
            playback_rate: Param::new(playback_rate),
            position: 0.0,
            transport: Transport::default(),
        }))
    }

    pub fn add_filter(&mut self, kind: FilterKind, frequency: f32, q: f32) -> NodeKey {
        self.insert(node::filter(kind, frequency, q))
    }

    pub fn add_gain(&mut self, gain: f32) -> NodeKey {
        self.insert(NodeKind::Gain(Param::new(gain)))
    }

    /// Soft clipper, `tanh(drive * x)` normalised to unity at full scale.
    pub fn add_shaper(&mut self, drive: f32) -> NodeKey {
        self.insert(NodeKind::Shaper(drive))
    }

    pub fn add_effects(&mut self, chain: EffectsChain) -> NodeKey {
        self.insert(NodeKind::Effects(alloc::boxed::Box::new(chain)))
    }

    pub fn effects_mut(&mut self, key: NodeKey) -> Result<&mut EffectsChain, GraphError> {
        match &mut self.node_mut(key)?.kind {
            NodeKind::Effects(chain) => Ok(chain),
            _ => Err(GraphError::InvalidConnection),
        }
    }

    /// Route `from`'s output into `to`'s input. Repeating a connection is a no-op.
    pub fn connect(&mut self, from: NodeKey, to: NodeKey) -> Result<(), GraphError> {
        self.check_edge(from, to)?;
        let target = self.node_mut(to)?;
        if !target.inputs.contains(&from) {
            target.inputs.push(from);
            self.dirty = true;
        }
        Ok(())
    }

    /// Add `from`'s output to parameter `param` of `to`.
    pub fn connect_param(
        &mut self,
        from: NodeKey,
        to: NodeKey,
        param: ParamId,
    ) -> Result<(), GraphError> {
        self.check_edge(from, to)?;
        let target = self.node_mut(to)?;
        if target.kind.param_mut(param).is_none() {
            return Err(GraphError::InvalidConnection);
        }
        if !target.modulators.contains(&(param, from)) {
            target.modulators.push((param, from));
            self.dirty = true;
        }
        Ok(())
    }

    /// Remove every connection leaving `from`.
    pub fn disconnect(&mut self, from: NodeKey) -> Result<(), GraphError> {
        if !self.nodes.contains_key(from) {
            return Err(GraphError::UnknownNode);
        }
        self.detach(from);
        Ok(())
    }

    /// Delete a node and every connection touching it.
    ///
    /// The destination cannot be removed.
    pub fn remove(&mut self, key: NodeKey) -> Result<(), GraphError> {
        if key == self.destination {
            return Err(GraphError::InvalidConnection);
        }
        self.nodes.remove(key).ok_or(GraphError::UnknownNode)?;
        self.detach(key);
        Ok(())
    }

    /// Schedule a source to begin at `at`. A second start is ignored.
    pub fn start(&mut self, key: NodeKey, at: f64) -> Result<(), GraphError> {
        let transport = self
            .node_mut(key)?
            .kind
            .transport_mut()
            .ok_or(GraphError::NotASource)?;
        if transport.start.is_none() {
            transport.start = Some(at);
        }
        Ok(())
    }

    /// Schedule a source to end at `at`. An earlier pending stop wins.
    pub fn stop(&mut self, key: NodeKey, at: f64) -> Result<(), GraphError> {
        let transport = self
            .node_mut(key)?
            .kind
            .transport_mut()
            .ok_or(GraphError::NotASource)?;
        if transport.start.is_none() {
            return Err(GraphError::NotStarted);
        }
        transport.stop = Some(match transport.stop {
            Some(existing) if existing <= at => existing,
            _ => at,
        });
        Ok(())
    }

    /// Whether a source has finished (stopped, or its buffer ran out).
    pub fn is_ended(&self, key: NodeKey) -> Result<bool, GraphError> {
        let node = self.nodes.get(key).ok_or(GraphError::UnknownNode)?;
        let transport = node.kind.transport().ok_or(GraphError::NotASource)?;
        Ok(transport.ended)
    }

    pub fn param_mut(&mut self, key: NodeKey, param: ParamId) -> Result<&mut Param, GraphError> {
        self.node_mut(key)?
            .kind
            .param_mut(param)
            .ok_or(GraphError::InvalidConnection)
    }

    /// Output produced by `key` in the last rendered frame.
    pub fn output_of(&self, key: NodeKey) -> Result<Stereo, GraphError> {
        self.nodes
            .get(key)
            .map(|n| n.output)
            .ok_or(GraphError::UnknownNode)
    }

    /// Render one frame at audio-clock time `t`.
    pub fn render(&mut self, t: f64) -> Stereo {
        if self.dirty {
            self.order = topological_sort(&self.nodes);
            self.dirty = false;
        }
        for i in 0..self.order.len() {
            let key = self.order[i];
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            let mut input = Stereo::SILENCE;
            for &src in &node.inputs {
                if let Some(upstream) = self.nodes.get(src) {
                    input += upstream.output;
                }
            }
            let mut mods = [0.0f32; PARAM_COUNT];
            for &(param, src) in &node.modulators {
                if let Some(upstream) = self.nodes.get(src) {
                    mods[param.index()] += upstream.output.left;
                }
            }
            if let Some(node) = self.nodes.get_mut(key) {
                node.output = node.kind.process(input, &mods, t, self.sample_rate);
            }
        }
        self.nodes
            .get(self.destination)
            .map(|n| n.output)
            .unwrap_or(Stereo::SILENCE)
    }

    fn insert(&mut self, kind: NodeKind) -> NodeKey {
        self.dirty = true;
        self.nodes.insert(Node::new(kind))
    }

    fn node_mut(&mut self, key: NodeKey) -> Result<&mut Node, GraphError> {
        self.nodes.get_mut(key).ok_or(GraphError::UnknownNode)
    }

    fn check_edge(&self, from: NodeKey, to: NodeKey) -> Result<(), GraphError> {
        if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
            return Err(GraphError::UnknownNode);
        }
        if from == to || self.depends_on(from, to) {
            return Err(GraphError::InvalidConnection);
        }
        Ok(())
    }

    /// Whether `node` (transitively) reads from `upstream`.
    fn depends_on(&self, node: NodeKey, upstream: NodeKey) -> bool {
        let mut stack = alloc::vec![node];
        let mut seen: SecondaryMap<NodeKey, ()> = SecondaryMap::new();
        while let Some(key) = stack.pop() {
            if key == upstream {
                return true;
            }
            if seen.insert(key, ()).is_some() {
                continue;
            }
            if let Some(n) = self.nodes.get(key) {
                stack.extend(n.inputs.iter().copied());
                stack.extend(n.modulators.iter().map(|(_, src)| *src));
            }
        }
        false
    }

    fn detach(&mut self, key: NodeKey) {
        for (_, node) in self.nodes.iter_mut() {
            node.inputs.retain(|src| *src != key);
            node.modulators.retain(|(_, src)| *src != key);
        }
        self.dirty = true;
    }
}

/// Topological sort via Kahn's algorithm.
///
/// Every node appears after all of its inputs and modulators. Connections
/// are checked for cycles when made, so the result covers every node.
fn topological_sort(nodes: &SlotMap<NodeKey, Node>) -> Vec<NodeKey> {
    let mut in_degree: SecondaryMap<NodeKey, u32> = SecondaryMap::new();
    let mut consumers: SecondaryMap<NodeKey, Vec<NodeKey>> = SecondaryMap::new();
    for key in nodes.keys() {
        in_degree.insert(key, 0);
        consumers.insert(key, Vec::new());
    }
    for (key, node) in nodes {
        let sources = node
            .inputs
            .iter()
            .chain(node.modulators.iter().map(|(_, src)| src));
        for &src in sources {
            if let Some(list) = consumers.get_mut(src) {
                list.push(key);
                if let Some(d) = in_degree.get_mut(key) {
                    *d += 1;
                }
            }
        }
    }

    let mut queue: Vec<NodeKey> = nodes
        .keys()
        .filter(|k| in_degree.get(*k).copied() == Some(0))
        .collect();
    let mut result = Vec::with_capacity(nodes.len());
    while let Some(key) = queue.pop() {
        result.push(key);
        if let Some(list) = consumers.get(key) {
            for &next in list {
                if let Some(d) = in_degree.get_mut(next) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push(next);
                    }
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 8000.0;

    fn position(order: &[NodeKey], key: NodeKey) -> usize {
        order.iter().position(|k| *k == key).unwrap()
    }

    #[test]
    fn chain_renders_in_dependency_order() {
        let mut g = Graph::new(SR);
        let dest = g.destination();
        let gain = g.add_gain(0.5);
        let osc = g.add_oscillator(Waveform::Sine, 440.0);
        g.connect(gain, dest).unwrap();
        g.connect(osc, gain).unwrap();
        g.render(0.0);
        assert!(position(&g.order, osc) < position(&g.order, gain));
        assert!(position(&g.order, gain) < position(&g.order, dest));
    }

    #[test]
    fn unstarted_source_is_silent() {
        let mut g = Graph::new(SR);
        let osc = g.add_oscillator(Waveform::Square, 100.0);
        g.connect(osc, g.destination()).unwrap();
        for n in 0..100 {
            assert_eq!(g.render(n as f64 / SR as f64), Stereo::SILENCE);
        }
    }

    #[test]
    fn started_source_reaches_destination_through_gain() {
        let mut g = Graph::new(SR);
        let osc = g.add_oscillator(Waveform::Sawtooth, 200.0);
        let gain = g.add_gain(0.25);
        g.connect(osc, gain).unwrap();
        g.connect(gain, g.destination()).unwrap();
        g.start(osc, 0.0).unwrap();
        let peak = (0..200)
            .map(|n| g.render(n as f64 / SR as f64).peak())
            .fold(0.0, f32::max);
        assert!(peak > 0.2 && peak <= 0.26, "peak {peak}");
    }

    #[test]
    fn cycles_and_self_loops_are_rejected() {
        let mut g = Graph::new(SR);
        let a = g.add_gain(1.0);
        let b = g.add_gain(1.0);
        g.connect(a, b).unwrap();
        assert_eq!(g.connect(b, a), Err(GraphError::InvalidConnection));
        assert_eq!(g.connect(a, a), Err(GraphError::InvalidConnection));
        assert_eq!(g.connect_param(b, a, ParamId::Gain), Err(GraphError::InvalidConnection));
    }

    #[test]
    fn param_connections_need_a_matching_param() {
        let mut g = Graph::new(SR);
        let lfo = g.add_oscillator(Waveform::Sine, 5.0);
        let gain = g.add_gain(1.0);
        assert_eq!(
            g.connect_param(lfo, gain, ParamId::Frequency),
            Err(GraphError::InvalidConnection)
        );
        assert!(g.connect_param(lfo, gain, ParamId::Gain).is_ok());
    }

    #[test]
    fn modulator_offsets_target_frequency() {
        let mut g = Graph::new(SR);
        let dc = g.add_oscillator(Waveform::Triangle, 0.0001);
        let depth = g.add_gain(-100.0);
        let carrier = g.add_oscillator(Waveform::Sine, 100.0);
        g.connect(dc, depth).unwrap();
        g.connect_param(depth, carrier, ParamId::Frequency).unwrap();
        g.start(dc, 0.0).unwrap();
        g.start(carrier, 0.0).unwrap();
        g.render(0.0);
        match &g.nodes[carrier].kind {
            NodeKind::Oscillator(o) => assert!((o.phase - 200.0 / 8000.0).abs() < 1e-6),
            _ => unreachable!(),
        }
    }

    #[test]
    fn removed_keys_fail_cleanly() {
        let mut g = Graph::new(SR);
        let osc = g.add_oscillator(Waveform::Sine, 100.0);
        g.connect(osc, g.destination()).unwrap();
        g.remove(osc).unwrap();
        assert_eq!(g.remove(osc), Err(GraphError::UnknownNode));
        assert_eq!(g.start(osc, 0.0), Err(GraphError::UnknownNode));
        assert_eq!(g.disconnect(osc), Err(GraphError::UnknownNode));
        assert!(g.nodes[g.destination()].inputs.is_empty());
        // A new node may reuse the slot but not the key.
        let other = g.add_gain(1.0);
        assert_ne!(other, osc);
        assert!(!g.contains(osc));
    }

    #[test]
    fn destination_cannot_be_removed() {
        let mut g = Graph::new(SR);
        let dest = g.destination();
        assert_eq!(g.remove(dest), Err(GraphError::InvalidConnection));
    }

    #[test]
    fn transport_errors() {
        let mut g = Graph::new(SR);
        let gain = g.add_gain(1.0);
        let osc = g.add_oscillator(Waveform::Sine, 100.0);
        assert_eq!(g.start(gain, 0.0), Err(GraphError::NotASource));
        assert_eq!(g.stop(osc, 1.0), Err(GraphError::NotStarted));
        g.start(osc, 0.0).unwrap();
        g.stop(osc, 0.5).unwrap();
        g.stop(osc, 0.9).unwrap();
        g.render(0.6);
        assert_eq!(g.is_ended(osc), Ok(true));
    }

    #[test]
    fn disconnect_silences_downstream() {
        let mut g = Graph::new(SR);
        let osc = g.add_oscillator(Waveform::Sawtooth, 300.0);
        g.connect(osc, g.destination()).unwrap();
        g.start(osc, 0.0).unwrap();
        g.render(0.0);
        g.render(1.0 / SR as f64);
        g.disconnect(osc).unwrap();
        assert_eq!(g.render(2.0 / SR as f64), Stereo::SILENCE);
    }
}
