//! Real-time audio output for the multipad.
//!
//! Rendered frames travel from the render thread to the device callback
//! through a lock-free SPSC ring buffer.

mod cpal_backend;
mod traits;

pub use cpal_backend::CpalOutput;
pub use traits::{AudioError, AudioOutput};
