//! Radix-2 complex FFT for the reverb convolver.

use alloc::vec::Vec;
use core::ops::{Add, Mul, Sub};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Complex {
    pub re: f32,
    pub im: f32,
}

impl Complex {
    pub const ZERO: Complex = Complex { re: 0.0, im: 0.0 };

    pub const fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    fn conj(self) -> Self {
        Self::new(self.re, -self.im)
    }

    /// `self += a * b`
    #[inline]
    pub fn mul_add(&mut self, a: Complex, b: Complex) {
        self.re += a.re * b.re - a.im * b.im;
        self.im += a.re * b.im + a.im * b.re;
    }
}

impl Add for Complex {
    type Output = Complex;
    fn add(self, rhs: Complex) -> Complex {
        Complex::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex {
    type Output = Complex;
    fn sub(self, rhs: Complex) -> Complex {
        Complex::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex {
    type Output = Complex;
    fn mul(self, rhs: Complex) -> Complex {
        Complex::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

/// Precomputed plan for one transform size.
#[derive(Clone, Debug)]
pub struct Fft {
    size: usize,
    twiddles: Vec<Complex>,
    bit_reverse: Vec<u32>,
}

impl Fft {
    /// `size` is rounded up to a power of two, at least 2.
    pub fn new(size: usize) -> Self {
        let size = size.max(2).next_power_of_two();
        let bits = size.trailing_zeros();
        let twiddles = (0..size / 2)
            .map(|k| {
                let angle = -2.0 * core::f64::consts::PI * k as f64 / size as f64;
                Complex::new(libm::cos(angle) as f32, libm::sin(angle) as f32)
            })
            .collect();
        let bit_reverse = (0..size as u32)
            .map(|i| i.reverse_bits() >> (32 - bits))
            .collect();
        Self {
            size,
            twiddles,
            bit_reverse,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn forward(&self, buf: &mut [Complex]) {
        self.transform(buf, false);
    }

    /// Inverse transform, scaled by `1 / size`.
    pub fn inverse(&self, buf: &mut [Complex]) {
        self.transform(buf, true);
        let scale = 1.0 / self.size as f32;
        for c in buf.iter_mut() {
            c.re *= scale;
            c.im *= scale;
        }
    }

    fn transform(&self, buf: &mut [Complex], inverse: bool) {
        let n = self.size;
        debug_assert_eq!(buf.len(), n);
        for i in 0..n {
            let j = self.bit_reverse[i] as usize;
            if j > i {
                buf.swap(i, j);
            }
        }
        let mut len = 2;
        while len <= n {
            let half = len / 2;
            let stride = n / len;
            for start in (0..n).step_by(len) {
                for k in 0..half {
                    let mut w = self.twiddles[k * stride];
                    if inverse {
                        w = w.conj();
                    }
                    let a = buf[start + k];
                    let b = buf[start + k + half] * w;
                    buf[start + k] = a + b;
                    buf[start + k + half] = a - b;
                }
            }
            len <<= 1;
        }
    }
}
