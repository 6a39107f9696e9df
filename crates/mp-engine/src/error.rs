//! Error types for the engine.

use alloc::string::String;
use core::fmt;

/// A node-graph operation failed.
///
/// Teardown paths match and discard these; they only surface from
/// construction or from explicit misuse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphError {
    /// The key does not (or no longer) refers to a node.
    UnknownNode,
    /// Start or stop on a node that is not a source.
    NotASource,
    /// Stop requested before the source was started.
    NotStarted,
    /// Self-connection, cycle, or a parameter the node does not have.
    InvalidConnection,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::UnknownNode => write!(f, "unknown node"),
            GraphError::NotASource => write!(f, "node is not a source"),
            GraphError::NotStarted => write!(f, "source has not been started"),
            GraphError::InvalidConnection => write!(f, "invalid connection"),
        }
    }
}

/// Errors surfaced by [`crate::Engine`] operations.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineError {
    /// The audio context could not be created at this sample rate.
    ContextUnavailable { sample_rate: u32 },
    /// Track index outside 0..8.
    InvalidTrack(usize),
    /// Step index outside the row.
    InvalidStep { track: usize, step: usize },
    /// Numerator/denominator pair the sequencer cannot use.
    InvalidTimeSignature { numerator: u8, denominator: u8 },
    /// The sample bytes could not be decoded.
    Decode(String),
    Graph(GraphError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ContextUnavailable { sample_rate } => {
                write!(f, "audio context unavailable at {} Hz", sample_rate)
            }
            EngineError::InvalidTrack(track) => write!(f, "invalid track index {}", track),
            EngineError::InvalidStep { track, step } => {
                write!(f, "invalid step {} on track {}", step, track)
            }
            EngineError::InvalidTimeSignature { numerator, denominator } => {
                write!(f, "unsupported time signature {}/{}", numerator, denominator)
            }
            EngineError::Decode(msg) => write!(f, "sample decode failed: {}", msg),
            EngineError::Graph(e) => write!(f, "audio graph error: {}", e),
        }
    }
}

impl From<GraphError> for EngineError {
    fn from(e: GraphError) -> Self {
        EngineError::Graph(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for GraphError {}

#[cfg(feature = "std")]
impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Graph(e) => Some(e),
            _ => None,
        }
    }
}
