//! Tempo and time signature.

/// Lowest accepted tempo.
pub const MIN_BPM: f64 = 20.0;
/// Highest accepted tempo.
pub const MAX_BPM: f64 = 300.0;

/// Tempo in beats per minute, always within [`MIN_BPM`]..=[`MAX_BPM`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Clamp into range. Non-finite input keeps the default tempo.
    pub fn new(bpm: f64) -> Self {
        if !bpm.is_finite() {
            return Self::default();
        }
        Self {
            bpm: bpm.clamp(MIN_BPM, MAX_BPM),
        }
    }

    pub fn bpm(self) -> f64 {
        self.bpm
    }

    /// Seconds per quarter note, the sequencer's tick whatever the
    /// time signature.
    pub fn quarter_seconds(self) -> f64 {
        60.0 / self.bpm
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self { bpm: 120.0 }
    }
}

/// Time signature. Invalid input is rejected by [`TimeSignature::new`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSignature {
    /// Beats per bar.
    pub numerator: u8,
    /// Note value of the bar (2, 4, 8 or 16). Only bar grouping and the
    /// metronome accent depend on it.
    pub denominator: u8,
}

impl TimeSignature {
    /// Accepts 1-16 beats per bar over a beat unit of 2, 4, 8 or 16.
    pub fn new(numerator: u8, denominator: u8) -> Option<Self> {
        let unit_ok = matches!(denominator, 2 | 4 | 8 | 16);
        if !(1..=16).contains(&numerator) || !unit_ok {
            return None;
        }
        Some(Self {
            numerator,
            denominator,
        })
    }

    /// True when `beat` opens a bar (metronome accent).
    pub fn is_downbeat(self, beat: u32) -> bool {
        beat % self.numerator as u32 == 0
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}
