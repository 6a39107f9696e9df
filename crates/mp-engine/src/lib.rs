//! Audio scheduling and voice lifecycle core for the multipad.
//!
//! [`Engine`] is the entry point. The lower layers (automation params, the
//! node graph, the instrument factory, effects chains, voice registries and
//! the lookahead scheduler) are public so they can be driven and tested on
//! their own.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod convolver;
mod effects;
mod engine;
mod error;
mod event_queue;
mod fft;
mod filter;
mod frame;
mod graph;
pub mod instruments;
mod node;
mod param;
mod registry;
mod sampler;
pub mod scheduler;
mod voice;

pub use convolver::{Convolver, BLOCK};
pub use effects::{reverb_impulse, ChainSettings, EffectsChain, DELAY_FEEDBACK, MAX_DELAY_SECONDS};
pub use engine::{ContextState, Engine, EngineConfig, TrackControls, MAX_SAMPLE_RATE};
pub use error::{EngineError, GraphError};
pub use event_queue::{EventQueue, Scheduled};
pub use fft::{Complex, Fft};
pub use filter::{Biquad, FilterKind};
pub use frame::{Frame, Stereo};
pub use graph::{Graph, NodeKey};
pub use instruments::{Patch, VoiceNodes, VoiceParams, RELEASE_FLOOR};
pub use node::{ParamId, Waveform};
pub use param::Param;
pub use registry::{RegistryConfig, VoiceKey, VoiceRegistry};
pub use sampler::{build_sample_voice, SampleBank, SampleDecoder, SampleRoute};
pub use scheduler::{BeatEvent, LookaheadScheduler, Poll, SchedulerConfig, StepKey};
pub use voice::{Voice, VoiceKind, VoiceState};
