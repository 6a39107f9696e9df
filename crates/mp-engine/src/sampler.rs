//! Sample voice path: per-track decoded buffers, the sample-mode flag, and
//! one-shot buffer voices.

use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use mp_ir::{SampleBuffer, TRACK_COUNT};

use crate::error::{EngineError, GraphError};
use crate::graph::{Graph, NodeKey};
use crate::instruments::VoiceNodes;
use crate::node::ParamId;

/// Turns encoded audio bytes into a [`SampleBuffer`].
pub trait SampleDecoder {
    type Error: fmt::Display;

    fn decode(&self, bytes: &[u8], name: &str) -> Result<SampleBuffer, Self::Error>;
}

/// How a gesture on a track should sound.
#[derive(Clone, Debug, PartialEq)]
pub enum SampleRoute {
    /// Sample mode is off: play the track's instrument.
    Synth,
    /// Sample mode is on and a buffer is loaded.
    Sample(Arc<SampleBuffer>),
    /// Sample mode is on but nothing is decoded yet. The gesture is dropped.
    Missing,
}

/// Loaded samples and sample-mode flags for every track.
#[derive(Clone, Debug, Default)]
pub struct SampleBank {
    slots: [Option<Arc<SampleBuffer>>; TRACK_COUNT],
    modes: [bool; TRACK_COUNT],
}

impl SampleBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes` and store the result for `track`, replacing any
    /// previous sample. On failure the track keeps what it had.
    pub fn load<D: SampleDecoder>(
        &mut self,
        decoder: &D,
        track: usize,
        bytes: &[u8],
        name: &str,
    ) -> Result<Arc<SampleBuffer>, EngineError> {
        check_track(track)?;
        let buffer = decoder
            .decode(bytes, name)
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        if buffer.is_empty() || buffer.sample_rate == 0 {
            return Err(EngineError::Decode("no audio frames".to_string()));
        }
        let buffer = Arc::new(buffer);
        self.install(track, Arc::clone(&buffer))?;
        Ok(buffer)
    }

    /// Store an already decoded buffer for `track`.
    pub fn install(&mut self, track: usize, buffer: Arc<SampleBuffer>) -> Result<(), EngineError> {
        check_track(track)?;
        self.slots[track] = Some(buffer);
        Ok(())
    }

    pub fn clear(&mut self, track: usize) -> Result<(), EngineError> {
        check_track(track)?;
        self.slots[track] = None;
        Ok(())
    }

    pub fn get(&self, track: usize) -> Option<&Arc<SampleBuffer>> {
        self.slots.get(track).and_then(Option::as_ref)
    }

    /// Display name of the sample loaded on `track`.
    pub fn name(&self, track: usize) -> Option<&str> {
        self.get(track).map(|b| b.name.as_str())
    }

    pub fn set_mode(&mut self, track: usize, enabled: bool) -> Result<(), EngineError> {
        check_track(track)?;
        self.modes[track] = enabled;
        Ok(())
    }

    /// False for tracks out of range.
    pub fn mode(&self, track: usize) -> bool {
        self.modes.get(track).copied().unwrap_or(false)
    }

    /// Decide between sample and synth playback for a gesture on `track`.
    pub fn route(&self, track: usize) -> SampleRoute {
        if !self.mode(track) {
            return SampleRoute::Synth;
        }
        match self.get(track) {
            Some(buffer) => SampleRoute::Sample(Arc::clone(buffer)),
            None => SampleRoute::Missing,
        }
    }
}

fn check_track(track: usize) -> Result<(), EngineError> {
    if track < TRACK_COUNT {
        Ok(())
    } else {
        Err(EngineError::InvalidTrack(track))
    }
}

/// Build a buffer source feeding a gain envelope routed to `output`.
///
/// The envelope opens at `level` immediately; the sample's own waveform
/// carries the attack.
pub fn build_sample_voice(
    graph: &mut Graph,
    buffer: Arc<SampleBuffer>,
    playback_rate: f32,
    when: f64,
    level: f32,
    output: NodeKey,
) -> Result<VoiceNodes, GraphError> {
    let source = graph.add_buffer_source(buffer, playback_rate);
    let envelope = graph.add_gain(0.0);
    let wired = (|| {
        graph.connect(source, envelope)?;
        graph.connect(envelope, output)?;
        graph.param_mut(envelope, ParamId::Gain)?.set_value_at_time(level, when);
        graph.start(source, when)
    })();
    if let Err(e) = wired {
        let _ = graph.remove(source);
        let _ = graph.remove(envelope);
        return Err(e);
    }
    Ok(VoiceNodes {
        sources: alloc::vec![source],
        nodes: Vec::new(),
        envelope,
    })
}
