//! Biquad filter (RBJ cookbook coefficients), stereo, transposed direct form II.

use core::f32::consts::PI;

use crate::frame::Stereo;

/// Filter response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Lowpass,
    Highpass,
    /// Constant 0 dB peak gain.
    Bandpass,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct ChannelState {
    z1: f32,
    z2: f32,
}

impl ChannelState {
    #[inline]
    fn run(&mut self, c: &Coefficients, x: f32) -> f32 {
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y
    }
}

/// Stereo biquad. Coefficients are recomputed only when frequency or Q move.
#[derive(Clone, Debug, PartialEq)]
pub struct Biquad {
    kind: FilterKind,
    coeffs: Coefficients,
    last: (f32, f32),
    left: ChannelState,
    right: ChannelState,
}

impl Biquad {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            coeffs: Coefficients::default(),
            last: (f32::NAN, f32::NAN),
            left: ChannelState::default(),
            right: ChannelState::default(),
        }
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Filter one frame at the given cutoff/centre frequency and Q.
    pub fn process(&mut self, input: Stereo, frequency: f32, q: f32, sample_rate: f32) -> Stereo {
        if frequency != self.last.0 || q != self.last.1 {
            self.coeffs = design(self.kind, frequency, q, sample_rate);
            self.last = (frequency, q);
        }
        Stereo::new(
            self.left.run(&self.coeffs, input.left),
            self.right.run(&self.coeffs, input.right),
        )
    }

    pub fn reset(&mut self) {
        self.left = ChannelState::default();
        self.right = ChannelState::default();
    }
}

fn design(kind: FilterKind, frequency: f32, q: f32, sample_rate: f32) -> Coefficients {
    let nyquist_guard = sample_rate * 0.45;
    let f = if frequency.is_finite() {
        frequency.clamp(10.0, nyquist_guard)
    } else {
        nyquist_guard
    };
    let q = if q.is_finite() { q.max(0.05) } else { 0.707 };
    let w0 = 2.0 * PI * f / sample_rate;
    let (sin_w0, cos_w0) = (libm::sinf(w0), libm::cosf(w0));
    let alpha = sin_w0 / (2.0 * q);
    let (b0, b1, b2) = match kind {
        FilterKind::Lowpass => ((1.0 - cos_w0) / 2.0, 1.0 - cos_w0, (1.0 - cos_w0) / 2.0),
        FilterKind::Highpass => ((1.0 + cos_w0) / 2.0, -(1.0 + cos_w0), (1.0 + cos_w0) / 2.0),
        FilterKind::Bandpass => (alpha, 0.0, -alpha),
    };
    let a0 = 1.0 + alpha;
    Coefficients {
        b0: b0 / a0,
        b1: b1 / a0,
        b2: b2 / a0,
        a1: -2.0 * cos_w0 / a0,
        a2: (1.0 - alpha) / a0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 8000.0;

    /// Steady-state peak of a sine through the filter.
    fn response(kind: FilterKind, cutoff: f32, tone: f32) -> f32 {
        let mut f = Biquad::new(kind);
        let mut peak = 0.0f32;
        for n in 0..4000 {
            let x = libm::sinf(2.0 * PI * tone * n as f32 / SR);
            let y = f.process(Stereo::mono(x), cutoff, 0.707, SR);
            if n > 2000 {
                peak = peak.max(y.left.abs());
            }
        }
        peak
    }

    #[test]
    fn lowpass_passes_low_and_cuts_high() {
        assert!(response(FilterKind::Lowpass, 500.0, 50.0) > 0.9);
        assert!(response(FilterKind::Lowpass, 500.0, 3000.0) < 0.1);
    }

    #[test]
    fn highpass_cuts_low() {
        assert!(response(FilterKind::Highpass, 1000.0, 50.0) < 0.05);
        assert!(response(FilterKind::Highpass, 1000.0, 3000.0) > 0.8);
    }

    #[test]
    fn bandpass_peaks_at_centre() {
        let centre = response(FilterKind::Bandpass, 1000.0, 1000.0);
        assert!(centre > 0.9);
        assert!(response(FilterKind::Bandpass, 1000.0, 60.0) < centre * 0.2);
    }

    #[test]
    fn absurd_cutoff_stays_stable() {
        let mut f = Biquad::new(FilterKind::Lowpass);
        for _ in 0..1000 {
            let y = f.process(Stereo::mono(1.0), 1.0e9, f32::NAN, SR);
            assert!(y.left.is_finite());
        }
    }
}
