//! Audio frame types.

use core::ops::{Add, AddAssign, Mul};

/// A stereo audio frame (16-bit integer), the engine's output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Convert a float frame, clipping to full scale.
    pub fn from_stereo(s: Stereo) -> Self {
        Self {
            left: to_i16(s.left),
            right: to_i16(s.right),
        }
    }
}

fn to_i16(v: f32) -> i16 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// A stereo sample pair flowing through the node graph.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Stereo {
    pub left: f32,
    pub right: f32,
}

impl Stereo {
    pub const SILENCE: Stereo = Stereo { left: 0.0, right: 0.0 };

    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    pub const fn mono(value: f32) -> Self {
        Self { left: value, right: value }
    }

    pub fn peak(self) -> f32 {
        self.left.abs().max(self.right.abs())
    }
}

impl Add for Stereo {
    type Output = Stereo;
    fn add(self, rhs: Stereo) -> Stereo {
        Stereo::new(self.left + rhs.left, self.right + rhs.right)
    }
}

impl AddAssign for Stereo {
    fn add_assign(&mut self, rhs: Stereo) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl Mul<f32> for Stereo {
    type Output = Stereo;
    fn mul(self, rhs: f32) -> Stereo {
        Stereo::new(self.left * rhs, self.right * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_clips() {
        let f = Frame::from_stereo(Stereo::new(2.0, -2.0));
        assert_eq!(f, Frame { left: 32767, right: -32767 });
        assert_eq!(Frame::from_stereo(Stereo::mono(f32::NAN)), Frame::silence());
    }

    #[test]
    fn stereo_arithmetic() {
        let mut a = Stereo::new(0.25, -0.5);
        a += Stereo::mono(0.25);
        assert_eq!(a, Stereo::new(0.5, -0.25));
        assert_eq!(a * 2.0, Stereo::new(1.0, -0.5));
        assert_eq!(a.peak(), 0.5);
    }
}
