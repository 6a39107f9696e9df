//! Audio file formats for the multipad.
//!
//! Decodes WAV bytes into [`mp_ir::SampleBuffer`]s (the engine's buffer
//! decode primitive, exposed as [`WavDecoder`]) and encodes rendered
//! frames as 16-bit stereo WAV.

use std::fmt;

mod wav_format;

pub use wav_format::{encode_wav, load_wav, write_wav, WavDecoder};

/// Error type for format parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// Missing or wrong RIFF/WAVE magic, or a required chunk is absent.
    InvalidHeader,
    /// Unexpected end of file
    UnexpectedEof,
    /// Sample encoding the decoder does not handle.
    UnsupportedEncoding { format: u16, bits: u16 },
    /// Zero channels.
    UnsupportedChannels(u16),
    /// I/O error
    Io(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::InvalidHeader => write!(f, "not a WAV file"),
            FormatError::UnexpectedEof => write!(f, "unexpected end of file"),
            FormatError::UnsupportedEncoding { format, bits } => {
                write!(f, "unsupported WAV encoding (format {}, {} bits)", format, bits)
            }
            FormatError::UnsupportedChannels(n) => write!(f, "unsupported channel count {}", n),
            FormatError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for FormatError {}

impl From<binrw::Error> for FormatError {
    fn from(e: binrw::Error) -> Self {
        if e.is_eof() {
            return FormatError::UnexpectedEof;
        }
        match e {
            binrw::Error::BadMagic { .. } => FormatError::InvalidHeader,
            binrw::Error::Io(io) => FormatError::Io(io.to_string()),
            other => FormatError::Io(other.to_string()),
        }
    }
}

impl From<std::io::Error> for FormatError {
    fn from(e: std::io::Error) -> Self {
        FormatError::Io(e.to_string())
    }
}
