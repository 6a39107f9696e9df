//! Instrument catalog.

/// A synthesized instrument the factory knows how to build.
///
/// Parsing a name never fails: anything unrecognised becomes [`InstrumentKind::Synth`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstrumentKind {
    /// Dual oscillator with a lowpass sweep.
    #[default]
    Synth,
    /// Additive partials plus a hammer noise burst.
    Piano,
    /// Five detuned saws sharing one vibrato.
    Strings,
    /// Two FM operator pairs.
    Bells,
    /// Sine plus square sub-oscillator.
    Bass,
    /// Three oscillators into a waveshaper.
    Lead,
    /// Six chorused saws through two filters.
    Pad,
    /// Decaying tone through a falling highpass.
    Pluck,
    /// Drawbar-style additive sines.
    Organ,
    /// Sine with delayed vibrato and breath noise.
    Flute,
    /// Two saws with an overshooting amplitude blat.
    Brass,
    /// Three voices through vowel formant filters.
    Choir,
}

impl InstrumentKind {
    /// Every instrument in catalog order.
    pub const ALL: [InstrumentKind; 12] = [
        InstrumentKind::Synth,
        InstrumentKind::Piano,
        InstrumentKind::Strings,
        InstrumentKind::Bells,
        InstrumentKind::Bass,
        InstrumentKind::Lead,
        InstrumentKind::Pad,
        InstrumentKind::Pluck,
        InstrumentKind::Organ,
        InstrumentKind::Flute,
        InstrumentKind::Brass,
        InstrumentKind::Choir,
    ];

    /// Resolve a UI name (case-insensitive). Unknown names fall back to `Synth`.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
            .unwrap_or_default()
    }

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            InstrumentKind::Synth => "synth",
            InstrumentKind::Piano => "piano",
            InstrumentKind::Strings => "strings",
            InstrumentKind::Bells => "bells",
            InstrumentKind::Bass => "bass",
            InstrumentKind::Lead => "lead",
            InstrumentKind::Pad => "pad",
            InstrumentKind::Pluck => "pluck",
            InstrumentKind::Organ => "organ",
            InstrumentKind::Flute => "flute",
            InstrumentKind::Brass => "brass",
            InstrumentKind::Choir => "choir",
        }
    }
}

impl core::fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_catalog() {
        for kind in InstrumentKind::ALL {
            assert_eq!(InstrumentKind::from_name(kind.name()), kind);
        }
    }

    #[test]
    fn name_lookup_ignores_case_and_whitespace() {
        assert_eq!(InstrumentKind::from_name(" Bells "), InstrumentKind::Bells);
        assert_eq!(InstrumentKind::from_name("CHOIR"), InstrumentKind::Choir);
    }

    #[test]
    fn unknown_name_falls_back_to_synth() {
        assert_eq!(InstrumentKind::from_name("theremin"), InstrumentKind::Synth);
        assert_eq!(InstrumentKind::from_name(""), InstrumentKind::Synth);
    }
}
