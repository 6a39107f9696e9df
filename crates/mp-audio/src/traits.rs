//! Output sink abstraction shared by device backends.

use mp_engine::Frame;

/// Failure opening or driving the output device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AudioError {
    /// The device rejected its configuration query.
    DeviceInit(String),
    /// The device refused the requested stream format or rate.
    StreamCreate(String),
    /// Starting or pausing the stream failed.
    Playback(String),
    NoDevice,
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::DeviceInit(msg) => write!(f, "output device unusable: {}", msg),
            AudioError::StreamCreate(msg) => write!(f, "cannot open output stream: {}", msg),
            AudioError::Playback(msg) => write!(f, "output stream control failed: {}", msg),
            AudioError::NoDevice => write!(f, "no output device found"),
        }
    }
}

impl std::error::Error for AudioError {}

/// A sink for rendered frames.
pub trait AudioOutput {
    fn sample_rate(&self) -> u32;

    /// Queue frames without blocking. Returns how many were accepted; the
    /// rest are dropped.
    fn write(&mut self, frames: &[Frame]) -> usize;

    fn start(&mut self) -> Result<(), AudioError>;

    fn stop(&mut self) -> Result<(), AudioError>;
}
