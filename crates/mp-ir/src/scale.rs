//! Gesture position to scale-quantized pitch.

/// A musical scale, as semitone offsets from the key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scale {
    #[default]
    Major,
    Minor,
    Pentatonic,
    Blues,
    Dorian,
    Chromatic,
}

impl Scale {
    /// Semitone offsets of one octave of the scale.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Pentatonic => &[0, 2, 4, 7, 9],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        }
    }

    /// Parse a UI name (case-insensitive). Unknown names give `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        const NAMES: [(&str, Scale); 6] = [
            ("major", Scale::Major),
            ("minor", Scale::Minor),
            ("pentatonic", Scale::Pentatonic),
            ("blues", Scale::Blues),
            ("dorian", Scale::Dorian),
            ("chromatic", Scale::Chromatic),
        ];
        let name = name.trim();
        NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, scale)| *scale)
    }
}

/// Pitch picked for a gesture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteInfo {
    pub midi: u8,
    pub frequency: f32,
}

/// Musical settings that map a horizontal pad position to a note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaleSettings {
    pub scale: Scale,
    /// Pitch class of the key, 0 = C.
    pub key: u8,
    /// Octave of the lowest note, 4 = middle C octave.
    pub octave: u8,
    /// Octaves spanned by the pad width.
    pub range_octaves: u8,
}

impl Default for ScaleSettings {
    fn default() -> Self {
        Self { scale: Scale::Major, key: 0, octave: 4, range_octaves: 2 }
    }
}

impl ScaleSettings {
    /// MIDI note of the key in the configured octave.
    pub fn root_midi(&self) -> u8 {
        let octave = self.octave.min(8) as u16;
        ((octave + 1) * 12 + (self.key % 12) as u16).min(127) as u8
    }

    /// Number of distinct notes across the pad (both ends inclusive).
    pub fn note_count(&self) -> usize {
        self.scale.intervals().len() * self.range_octaves.max(1) as usize + 1
    }

    /// Note under a horizontal position, `x_fraction` in 0.0..=1.0.
    pub fn note_at(&self, x_fraction: f32) -> NoteInfo {
        let count = self.note_count();
        let x = if x_fraction.is_finite() { x_fraction.clamp(0.0, 1.0) } else { 0.0 };
        let index = ((x * count as f32) as usize).min(count - 1);
        let intervals = self.scale.intervals();
        let octave = index / intervals.len();
        let degree = index % intervals.len();
        let midi = self.root_midi() as usize + octave * 12 + intervals[degree] as usize;
        let midi = midi.min(127) as u8;
        NoteInfo { midi, frequency: midi_to_frequency(midi as f32) }
    }

    /// Root note shifted by a number of semitones.
    pub fn root_with_offset(&self, semitones: i8) -> NoteInfo {
        let midi = (self.root_midi() as i16 + semitones as i16).clamp(0, 127) as u8;
        NoteInfo { midi, frequency: midi_to_frequency(midi as f32) }
    }
}

/// Equal-tempered frequency, A4 (MIDI 69) = 440 Hz.
pub fn midi_to_frequency(midi: f32) -> f32 {
    440.0 * libm::powf(2.0, (midi - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_edge_of_c_major_octave_four_is_middle_c() {
        let note = ScaleSettings::default().note_at(0.0);
        assert_eq!(note.midi, 60);
        assert!((note.frequency - 261.63).abs() < 0.01);
    }

    #[test]
    fn same_position_always_gives_same_note() {
        let settings = ScaleSettings { scale: Scale::Minor, key: 9, octave: 3, range_octaves: 2 };
        let a = settings.note_at(0.37);
        let b = settings.note_at(0.37);
        assert_eq!(a, b);
    }

    #[test]
    fn right_edge_reaches_top_of_range() {
        let note = ScaleSettings::default().note_at(1.0);
        assert_eq!(note.midi, 60 + 24);
    }

    #[test]
    fn positions_are_quantized_to_scale_degrees() {
        let settings = ScaleSettings::default();
        let count = settings.note_count() as f32;
        // Second slot is D, third is E.
        assert_eq!(settings.note_at(1.5 / count).midi, 62);
        assert_eq!(settings.note_at(2.5 / count).midi, 64);
    }

    #[test]
    fn out_of_range_positions_are_clamped() {
        let settings = ScaleSettings::default();
        assert_eq!(settings.note_at(-3.0).midi, 60);
        assert_eq!(settings.note_at(7.0).midi, 84);
        assert_eq!(settings.note_at(f32::NAN).midi, 60);
    }

    #[test]
    fn key_shifts_root() {
        let settings = ScaleSettings { key: 7, ..ScaleSettings::default() };
        assert_eq!(settings.note_at(0.0).midi, 67);
        assert_eq!(settings.root_with_offset(-7).midi, 60);
    }

    #[test]
    fn a4_is_440() {
        assert!((midi_to_frequency(69.0) - 440.0).abs() < 1e-3);
        assert!((midi_to_frequency(81.0) - 880.0).abs() < 1e-2);
    }

    #[test]
    fn scale_names_parse() {
        assert_eq!(Scale::from_name("Pentatonic"), Some(Scale::Pentatonic));
        assert_eq!(Scale::from_name("lydian"), None);
    }
}
