//! WAV encoding and decoding.
//!
//! Reading accepts integer PCM (8, 16, 24, 32 bit) and IEEE float (32, 64
//! bit), plain or WAVE_FORMAT_EXTENSIBLE, with any number of channels; the
//! first two channels are kept. Writing produces 16-bit stereo PCM.

use std::io::{Cursor, Write};
use std::ops::Range;

use binrw::{binrw, BinReaderExt, BinWrite};
use log::debug;
use mp_engine::{Frame, SampleDecoder};
use mp_ir::SampleBuffer;

use crate::FormatError;

const FORMAT_PCM: u16 = 1;
const FORMAT_FLOAT: u16 = 3;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;
/// Offset of the sub-format code inside an extensible fmt chunk.
const EXTENSIBLE_SUBFORMAT: u64 = 24;

#[binrw]
#[brw(little, magic = b"RIFF")]
struct RiffHeader {
    size: u32,
    form: [u8; 4],
}

#[binrw]
#[brw(little)]
struct ChunkHeader {
    id: [u8; 4],
    size: u32,
}

#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug)]
struct FmtChunk {
    format: u16,
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
}

/// Decoder handed to the engine's sample loader.
#[derive(Clone, Copy, Debug, Default)]
pub struct WavDecoder;

impl SampleDecoder for WavDecoder {
    type Error = FormatError;

    fn decode(&self, bytes: &[u8], name: &str) -> Result<SampleBuffer, FormatError> {
        load_wav(bytes, name)
    }
}

// --- Reading ---

/// Decode a WAV file into a sample buffer at the file's own rate.
pub fn load_wav(data: &[u8], name: &str) -> Result<SampleBuffer, FormatError> {
    let (fmt, range) = parse_chunks(data)?;
    let raw = &data[range];
    let (left, right) = read_frames(raw, &fmt)?;
    debug!(
        "decoded {:?}: {} frames, {} ch, {} bit, {} Hz",
        name,
        left.len(),
        fmt.channels,
        fmt.bits_per_sample,
        fmt.sample_rate
    );
    Ok(match right {
        Some(right) => SampleBuffer::from_stereo(name, left, right, fmt.sample_rate),
        None => SampleBuffer::from_mono(name, left, fmt.sample_rate),
    })
}

/// Walk the RIFF chunks and return the format plus the byte range of the
/// sample data.
fn parse_chunks(data: &[u8]) -> Result<(FmtChunk, Range<usize>), FormatError> {
    if data.len() < 12 {
        return Err(FormatError::UnexpectedEof);
    }
    if &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(FormatError::InvalidHeader);
    }
    let mut cur = Cursor::new(data);
    let _riff: RiffHeader = cur.read_le()?;

    let mut fmt = None;
    let mut samples = None;
    loop {
        let header: ChunkHeader = match cur.read_le() {
            Ok(h) => h,
            Err(e) if e.is_eof() => break,
            Err(e) => return Err(e.into()),
        };
        let body = cur.position();
        let size = header.size as u64;
        match &header.id {
            b"fmt " => {
                if size < 16 {
                    return Err(FormatError::InvalidHeader);
                }
                let mut chunk: FmtChunk = cur.read_le()?;
                if chunk.format == FORMAT_EXTENSIBLE && size >= EXTENSIBLE_SUBFORMAT + 2 {
                    cur.set_position(body + EXTENSIBLE_SUBFORMAT);
                    chunk.format = cur.read_le()?;
                }
                fmt = Some(chunk);
            }
            // Streamed files may claim more data than they hold.
            b"data" => {
                let start = body as usize;
                let end = (body + size).min(data.len() as u64) as usize;
                samples = Some(start..end);
            }
            _ => {}
        }
        let next = body + size + (size & 1);
        if next >= data.len() as u64 {
            break;
        }
        cur.set_position(next);
    }

    let fmt = fmt.ok_or(FormatError::InvalidHeader)?;
    let samples = samples.ok_or(FormatError::InvalidHeader)?;
    if fmt.channels == 0 {
        return Err(FormatError::UnsupportedChannels(0));
    }
    if fmt.sample_rate == 0 {
        return Err(FormatError::InvalidHeader);
    }
    Ok((fmt, samples))
}

type Convert = fn(&[u8]) -> f32;

fn converter(format: u16, bits: u16) -> Option<Convert> {
    let convert: Convert = match (format, bits) {
        (FORMAT_PCM, 8) => |b| (b[0] as f32 - 128.0) / 128.0,
        (FORMAT_PCM, 16) => |b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32_768.0,
        (FORMAT_PCM, 24) => {
            |b| (i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8) as f32 / 8_388_608.0
        }
        (FORMAT_PCM, 32) => {
            |b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0
        }
        (FORMAT_FLOAT, 32) => |b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        (FORMAT_FLOAT, 64) => |b| {
            f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32
        },
        _ => return None,
    };
    Some(convert)
}

/// De-interleave into left and (for multichannel files) right. A trailing
/// partial frame is dropped.
fn read_frames(raw: &[u8], fmt: &FmtChunk) -> Result<(Vec<f32>, Option<Vec<f32>>), FormatError> {
    let unsupported = FormatError::UnsupportedEncoding {
        format: fmt.format,
        bits: fmt.bits_per_sample,
    };
    let convert = converter(fmt.format, fmt.bits_per_sample).ok_or(unsupported)?;
    let width = fmt.bits_per_sample as usize / 8;
    let channels = fmt.channels as usize;
    let frames = raw.chunks_exact(width * channels);

    let mut left = Vec::with_capacity(frames.len());
    if channels == 1 {
        left.extend(frames.map(convert));
        return Ok((left, None));
    }
    let mut right = Vec::with_capacity(frames.len());
    for frame in frames {
        left.push(convert(&frame[..width]));
        right.push(convert(&frame[width..2 * width]));
    }
    Ok((left, Some(right)))
}

// --- Writing ---

/// Encode frames as a 16-bit stereo WAV file.
pub fn encode_wav(frames: &[Frame], sample_rate: u32) -> Result<Vec<u8>, FormatError> {
    let channels: u16 = 2;
    let bits_per_sample: u16 = 16;
    let block_align = channels * (bits_per_sample / 8);
    let data_size = frames.len() as u32 * block_align as u32;

    let mut cur = Cursor::new(Vec::with_capacity(44 + data_size as usize));
    RiffHeader {
        size: 36 + data_size,
        form: *b"WAVE",
    }
    .write(&mut cur)?;
    ChunkHeader {
        id: *b"fmt ",
        size: 16,
    }
    .write(&mut cur)?;
    FmtChunk {
        format: FORMAT_PCM,
        channels,
        sample_rate,
        byte_rate: sample_rate * block_align as u32,
        block_align,
        bits_per_sample,
    }
    .write(&mut cur)?;
    ChunkHeader {
        id: *b"data",
        size: data_size,
    }
    .write(&mut cur)?;
    let mut out = cur.into_inner();
    for frame in frames {
        out.extend_from_slice(&frame.left.to_le_bytes());
        out.extend_from_slice(&frame.right.to_le_bytes());
    }
    Ok(out)
}

/// Encode frames and write them to `w`.
pub fn write_wav(w: &mut impl Write, frames: &[Frame], sample_rate: u32) -> Result<(), FormatError> {
    let bytes = encode_wav(frames, sample_rate)?;
    w.write_all(&bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal WAV file from raw parameters.
    fn make_wav(format: u16, channels: u16, rate: u32, bits: u16, pcm: &[u8]) -> Vec<u8> {
        let block_align = channels * (bits / 8);
        let mut buf = Vec::new();
        buf.extend(b"RIFF");
        buf.extend(&(36 + pcm.len() as u32).to_le_bytes());
        buf.extend(b"WAVE");
        buf.extend(b"fmt ");
        buf.extend(&16u32.to_le_bytes());
        buf.extend(&format.to_le_bytes());
        buf.extend(&channels.to_le_bytes());
        buf.extend(&rate.to_le_bytes());
        buf.extend(&(rate * block_align as u32).to_le_bytes());
        buf.extend(&block_align.to_le_bytes());
        buf.extend(&bits.to_le_bytes());
        buf.extend(b"data");
        buf.extend(&(pcm.len() as u32).to_le_bytes());
        buf.extend(pcm);
        buf
    }

    fn pcm16(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn load_8bit_mono() {
        let wav = make_wav(1, 1, 22_050, 8, &[128, 255, 0, 192]);
        let s = load_wav(&wav, "kick").unwrap();
        assert_eq!(s.sample_rate, 22_050);
        assert_eq!(s.name.as_str(), "kick");
        assert_eq!(s.left, vec![0.0, 127.0 / 128.0, -1.0, 0.5]);
        assert_eq!(s.left, s.right);
    }

    #[test]
    fn load_16bit_stereo_splits_channels() {
        let wav = make_wav(1, 2, 44_100, 16, &pcm16(&[16_384, -16_384, 0, 32_767]));
        let s = load_wav(&wav, "st").unwrap();
        assert_eq!(s.left, vec![0.5, 0.0]);
        assert_eq!(s.right[0], -0.5);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn load_24bit_keeps_sign() {
        // 0x400000 = +0.5, 0xC00000 = -0.5
        let pcm = [0x00, 0x00, 0x40, 0x00, 0x00, 0xC0];
        let s = load_wav(&make_wav(1, 1, 48_000, 24, &pcm), "x").unwrap();
        assert_eq!(s.left, vec![0.5, -0.5]);
    }

    #[test]
    fn load_float_samples() {
        let pcm: Vec<u8> = [0.25f32, -0.75].iter().flat_map(|v| v.to_le_bytes()).collect();
        let s = load_wav(&make_wav(3, 1, 8_000, 32, &pcm), "f").unwrap();
        assert_eq!(s.left, vec![0.25, -0.75]);
    }

    #[test]
    fn extensible_format_uses_subformat() {
        let mut wav = Vec::new();
        let pcm = pcm16(&[8_192, -8_192]);
        wav.extend(b"RIFF");
        wav.extend(&(60 + pcm.len() as u32).to_le_bytes());
        wav.extend(b"WAVE");
        wav.extend(b"fmt ");
        wav.extend(&40u32.to_le_bytes());
        wav.extend(&FORMAT_EXTENSIBLE.to_le_bytes());
        wav.extend(&1u16.to_le_bytes());
        wav.extend(&8_000u32.to_le_bytes());
        wav.extend(&16_000u32.to_le_bytes());
        wav.extend(&2u16.to_le_bytes());
        wav.extend(&16u16.to_le_bytes());
        wav.extend(&22u16.to_le_bytes()); // cbSize
        wav.extend(&16u16.to_le_bytes()); // valid bits
        wav.extend(&4u32.to_le_bytes()); // channel mask
        wav.extend(&FORMAT_PCM.to_le_bytes());
        wav.extend(&[0u8; 14]); // rest of the GUID
        wav.extend(b"data");
        wav.extend(&(pcm.len() as u32).to_le_bytes());
        wav.extend(&pcm);
        let s = load_wav(&wav, "ext").unwrap();
        assert_eq!(s.left, vec![0.25, -0.25]);
    }

    #[test]
    fn skips_unknown_odd_sized_chunks() {
        let mut wav = make_wav(1, 1, 8_000, 16, &pcm16(&[16_384]));
        // Insert a 3-byte LIST chunk (padded to 4) after the fmt chunk.
        let list = [b'L', b'I', b'S', b'T', 3, 0, 0, 0, 1, 2, 3, 0];
        let at = 12 + 8 + 16;
        wav.splice(at..at, list);
        let s = load_wav(&wav, "list").unwrap();
        assert_eq!(s.left, vec![0.5]);
    }

    #[test]
    fn truncated_data_chunk_keeps_whole_frames() {
        let mut wav = make_wav(1, 2, 8_000, 16, &pcm16(&[1, 2, 3, 4]));
        wav.truncate(wav.len() - 3);
        let s = load_wav(&wav, "cut").unwrap();
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(load_wav(b"not a wav file at all", "bad").unwrap_err(), FormatError::InvalidHeader);
        assert_eq!(load_wav(&[b'R', b'I'], "short").unwrap_err(), FormatError::UnexpectedEof);
        let adpcm = make_wav(2, 1, 8_000, 4, &[0, 0]);
        assert_eq!(
            load_wav(&adpcm, "adpcm").unwrap_err(),
            FormatError::UnsupportedEncoding { format: 2, bits: 4 }
        );
        let no_channels = make_wav(1, 0, 8_000, 16, &[0, 0]);
        assert_eq!(load_wav(&no_channels, "z").unwrap_err(), FormatError::UnsupportedChannels(0));
    }

    #[test]
    fn missing_data_chunk_is_an_error() {
        let mut wav = make_wav(1, 1, 8_000, 16, &[]);
        wav.truncate(36);
        assert_eq!(load_wav(&wav, "nodata").unwrap_err(), FormatError::InvalidHeader);
    }

    #[test]
    fn encoded_frames_decode_back() {
        let frames = [
            Frame { left: 16_384, right: -16_384 },
            Frame { left: 0, right: 8_192 },
        ];
        let bytes = encode_wav(&frames, 22_050).unwrap();
        assert_eq!(bytes.len(), 44 + 8);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[36..40], b"data");
        let s = load_wav(&bytes, "rt").unwrap();
        assert_eq!(s.sample_rate, 22_050);
        assert_eq!(s.left, vec![0.5, 0.0]);
        assert_eq!(s.right, vec![-0.5, 0.25]);
    }

    #[test]
    fn decoder_feeds_the_sample_bank() {
        let wav = make_wav(1, 1, 8_000, 16, &pcm16(&[1_000; 32]));
        let mut bank = mp_engine::SampleBank::new();
        bank.load(&WavDecoder, 4, &wav, "tone").unwrap();
        assert_eq!(bank.name(4), Some("tone"));
        assert!(bank.load(&WavDecoder, 4, b"junk", "junk").is_err());
        assert_eq!(bank.name(4), Some("tone"));
    }
}
