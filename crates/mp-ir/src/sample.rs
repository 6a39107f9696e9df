//! Decoded sample data.

use alloc::vec::Vec;
use arrayvec::ArrayString;

/// Display name of a loaded sample (truncated to fit).
pub type SampleName = ArrayString<32>;

/// A decoded sample, always stored as two f32 channels.
///
/// Mono sources are duplicated into both channels at load time so the
/// playback path never branches on channel count.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleBuffer {
    pub name: SampleName,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    /// Native rate of the data in Hz.
    pub sample_rate: u32,
}

impl SampleBuffer {
    /// Build from one channel, duplicating it to both sides.
    pub fn from_mono(name: &str, data: Vec<f32>, sample_rate: u32) -> Self {
        let right = data.clone();
        Self {
            name: truncated_name(name),
            left: data,
            right,
            sample_rate,
        }
    }

    /// Build from two channels. The longer channel is truncated to the shorter.
    pub fn from_stereo(name: &str, mut left: Vec<f32>, mut right: Vec<f32>, sample_rate: u32) -> Self {
        let len = left.len().min(right.len());
        left.truncate(len);
        right.truncate(len);
        Self {
            name: truncated_name(name),
            left,
            right,
            sample_rate,
        }
    }

    /// Length in frames.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Playback length at rate 1.0.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Linearly interpolated frame at a fractional position.
    ///
    /// Positions outside the data read as silence.
    pub fn frame_at(&self, position: f64) -> (f32, f32) {
        if !(position >= 0.0) {
            return (0.0, 0.0);
        }
        let index = position as usize;
        if index >= self.len() {
            return (0.0, 0.0);
        }
        let frac = (position - index as f64) as f32;
        let next = index + 1;
        let (l0, r0) = (self.left[index], self.right[index]);
        let (l1, r1) = if next < self.len() {
            (self.left[next], self.right[next])
        } else {
            (0.0, 0.0)
        };
        (l0 + (l1 - l0) * frac, r0 + (r1 - r0) * frac)
    }
}

fn truncated_name(name: &str) -> SampleName {
    let mut out = SampleName::new();
    for ch in name.chars() {
        if out.try_push(ch).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn mono_is_duplicated() {
        let s = SampleBuffer::from_mono("kick", vec![0.5, -0.5], 44_100);
        assert_eq!(s.left, s.right);
        assert_eq!(s.len(), 2);
        assert_eq!(s.name.as_str(), "kick");
    }

    #[test]
    fn stereo_channels_are_equalised() {
        let s = SampleBuffer::from_stereo("x", vec![1.0, 1.0, 1.0], vec![0.0, 0.0], 8_000);
        assert_eq!(s.left.len(), 2);
        assert_eq!(s.right.len(), 2);
    }

    #[test]
    fn long_names_are_truncated() {
        let long = "a_really_long_sample_name_that_keeps_going.wav";
        let s = SampleBuffer::from_mono(long, vec![], 8_000);
        assert_eq!(s.name.len(), 32);
        assert!(long.starts_with(s.name.as_str()));
    }

    #[test]
    fn interpolation_and_bounds() {
        let s = SampleBuffer::from_mono("ramp", vec![0.0, 1.0], 8_000);
        assert_eq!(s.frame_at(0.5), (0.5, 0.5));
        assert_eq!(s.frame_at(-1.0), (0.0, 0.0));
        assert_eq!(s.frame_at(2.0), (0.0, 0.0));
        assert_eq!(s.frame_at(f64::NAN), (0.0, 0.0));
    }

    #[test]
    fn duration_follows_rate() {
        let s = SampleBuffer::from_mono("one_second", vec![0.0; 8_000], 8_000);
        assert!((s.duration_seconds() - 1.0).abs() < 1e-12);
        assert_eq!(SampleBuffer::default().duration_seconds(), 0.0);
    }
}
