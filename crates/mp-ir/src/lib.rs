//! Core value types for the multipad audio core.
//!
//! Everything here is plain data plus pure functions: instrument catalog,
//! musical scales, the 0-100 control mappings, the sequencer grid, tempo
//! and time signature, note identifiers and recorded gestures. The engine
//! consumes these types; nothing in this crate touches audio.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod controls;
mod instrument;
mod note_id;
mod recording;
mod sample;
mod scale;
mod sequence;
mod tempo;

pub use instrument::InstrumentKind;
pub use note_id::NoteId;
pub use recording::{Gesture, RecordedEvent};
pub use sample::{SampleBuffer, SampleName};
pub use scale::{midi_to_frequency, NoteInfo, Scale, ScaleSettings};
pub use sequence::{
    Resolution, SequencerGrid, StepHit, TrackPattern, MAX_HITS_PER_BEAT, PATTERN_BEATS,
    STEP_CAPACITY,
};
pub use tempo::{Tempo, TimeSignature, MAX_BPM, MIN_BPM};

/// Number of instrument tracks on the pad.
pub const TRACK_COUNT: usize = 8;
