//! Step sequencer grid.
//!
//! Each track row stores [`STEP_CAPACITY`] steps, enough for
//! [`PATTERN_BEATS`] beats at the finest resolution. The row's
//! [`Resolution`] decides how many of those steps are sampled per beat:
//! step `beat * subdivisions + sub` sounds at
//! `beat_start + sub * beat_duration / subdivisions`.

use arrayvec::ArrayVec;

use crate::TRACK_COUNT;

/// Steps stored per track row.
pub const STEP_CAPACITY: usize = 64;

/// Beats in one pattern cycle.
pub const PATTERN_BEATS: u32 = 16;

/// Most sub-steps a single beat can fan out into across all tracks.
pub const MAX_HITS_PER_BEAT: usize = TRACK_COUNT * 4;

/// How finely a row subdivides each beat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Resolution {
    #[default]
    Quarter,
    Eighth,
    Sixteenth,
}

impl Resolution {
    /// Sub-steps sampled inside one beat.
    pub fn subdivisions(self) -> u32 {
        match self {
            Resolution::Quarter => 1,
            Resolution::Eighth => 2,
            Resolution::Sixteenth => 4,
        }
    }

    /// Number of steps addressable at this resolution within one pattern.
    pub fn live_steps(self) -> usize {
        (PATTERN_BEATS * self.subdivisions()) as usize
    }

    /// Unknown names fall back to quarter resolution.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        if name.eq_ignore_ascii_case("eighth") || name == "8" || name == "8n" {
            Resolution::Eighth
        } else if name.eq_ignore_ascii_case("sixteenth") || name == "16" || name == "16n" {
            Resolution::Sixteenth
        } else {
            Resolution::Quarter
        }
    }
}

/// One due step produced by the fan-out of a beat.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepHit {
    pub track: usize,
    /// Index into the row's step array.
    pub step: u16,
    /// Audio-clock time the step should sound at.
    pub time: f64,
    /// Semitone offset from the scale root.
    pub pitch_offset: i8,
    /// Gate length: one sub-step.
    pub gate: f64,
}

/// One track's row.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackPattern {
    steps: [bool; STEP_CAPACITY],
    pitch: [i8; STEP_CAPACITY],
    pub resolution: Resolution,
}

impl Default for TrackPattern {
    fn default() -> Self {
        Self {
            steps: [false; STEP_CAPACITY],
            pitch: [0; STEP_CAPACITY],
            resolution: Resolution::Quarter,
        }
    }
}

impl TrackPattern {
    /// Returns false if `step` is outside the row.
    pub fn set_step(&mut self, step: usize, active: bool) -> bool {
        match self.steps.get_mut(step) {
            Some(slot) => {
                *slot = active;
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, step: usize) -> bool {
        self.steps.get(step).copied().unwrap_or(false)
    }

    /// Returns false if `step` is outside the row.
    pub fn set_pitch(&mut self, step: usize, semitones: i8) -> bool {
        match self.pitch.get_mut(step) {
            Some(slot) => {
                *slot = semitones;
                true
            }
            None => false,
        }
    }

    pub fn pitch(&self, step: usize) -> i8 {
        self.pitch.get(step).copied().unwrap_or(0)
    }

    /// Deactivate every step and reset pitch offsets. Resolution is kept.
    pub fn clear(&mut self) {
        self.steps = [false; STEP_CAPACITY];
        self.pitch = [0; STEP_CAPACITY];
    }

    pub fn active_count(&self) -> usize {
        self.steps.iter().filter(|s| **s).count()
    }

    /// Push this row's due steps for `beat` into `out`.
    pub fn hits_for_beat<const N: usize>(
        &self,
        track: usize,
        beat: u32,
        beat_start: f64,
        beat_duration: f64,
        out: &mut ArrayVec<StepHit, N>,
    ) {
        let subs = self.resolution.subdivisions();
        let gate = beat_duration / subs as f64;
        for sub in 0..subs {
            let index = (beat % PATTERN_BEATS) * subs + sub;
            let index = index as usize;
            if index >= STEP_CAPACITY || !self.steps[index] {
                continue;
            }
            let hit = StepHit {
                track,
                step: index as u16,
                time: beat_start + sub as f64 * gate,
                pitch_offset: self.pitch[index],
                gate,
            };
            if out.try_push(hit).is_err() {
                return;
            }
        }
    }
}

/// All track rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SequencerGrid {
    tracks: [TrackPattern; TRACK_COUNT],
}

impl SequencerGrid {
    pub fn track(&self, track: usize) -> Option<&TrackPattern> {
        self.tracks.get(track)
    }

    pub fn track_mut(&mut self, track: usize) -> Option<&mut TrackPattern> {
        self.tracks.get_mut(track)
    }

    pub fn clear(&mut self) {
        for row in &mut self.tracks {
            row.clear();
        }
    }

    /// Every track's due steps for `beat`, ordered by time then track.
    pub fn hits_for_beat(
        &self,
        beat: u32,
        beat_start: f64,
        beat_duration: f64,
    ) -> ArrayVec<StepHit, MAX_HITS_PER_BEAT> {
        let mut out = ArrayVec::new();
        for (track, row) in self.tracks.iter().enumerate() {
            row.hits_for_beat(track, beat, beat_start, beat_duration, &mut out);
        }
        out.sort_unstable_by(|a, b| {
            a.time
                .total_cmp(&b.time)
                .then(a.track.cmp(&b.track))
                .then(a.step.cmp(&b.step))
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_covers_finest_resolution() {
        assert_eq!(Resolution::Sixteenth.live_steps(), STEP_CAPACITY);
        assert_eq!(Resolution::Quarter.live_steps(), 16);
    }

    #[test]
    fn out_of_range_steps_are_rejected() {
        let mut row = TrackPattern::default();
        assert!(!row.set_step(STEP_CAPACITY, true));
        assert!(!row.set_pitch(200, 3));
        assert!(!row.is_active(500));
    }

    #[test]
    fn sixteenth_fanout_hits_first_substep_of_each_beat() {
        let mut grid = SequencerGrid::default();
        let row = grid.track_mut(0).unwrap();
        row.resolution = Resolution::Sixteenth;
        for step in [0, 4, 8, 12] {
            row.set_step(step, true);
        }
        let dur = 0.5;
        for beat in 0..PATTERN_BEATS {
            let start = beat as f64 * dur;
            let hits = grid.hits_for_beat(beat, start, dur);
            if beat < 4 {
                assert_eq!(hits.len(), 1, "beat {beat}");
                assert_eq!(hits[0].step as u32, beat * 4);
                assert_eq!(hits[0].time, start);
            } else {
                assert!(hits.is_empty(), "beat {beat}");
            }
        }
    }

    #[test]
    fn eighth_second_substep_is_offset_half_a_beat() {
        let mut grid = SequencerGrid::default();
        let row = grid.track_mut(2).unwrap();
        row.resolution = Resolution::Eighth;
        row.set_step(3, true);
        let hits = grid.hits_for_beat(1, 10.0, 0.5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].step, 3);
        assert!((hits[0].time - 10.25).abs() < 1e-12);
        assert!((hits[0].gate - 0.25).abs() < 1e-12);
    }

    #[test]
    fn hits_are_ordered_by_time_then_track() {
        let mut grid = SequencerGrid::default();
        {
            let row = grid.track_mut(0).unwrap();
            row.resolution = Resolution::Sixteenth;
            row.set_step(1, true);
        }
        grid.track_mut(5).unwrap().set_step(0, true);
        grid.track_mut(3).unwrap().set_step(0, true);
        let hits = grid.hits_for_beat(0, 0.0, 1.0);
        let order: Vec<(usize, u16)> = hits.iter().map(|h| (h.track, h.step)).collect();
        assert_eq!(order, vec![(3, 0), (5, 0), (0, 1)]);
    }

    #[test]
    fn clear_keeps_resolution() {
        let mut row = TrackPattern {
            resolution: Resolution::Eighth,
            ..Default::default()
        };
        row.set_step(2, true);
        row.set_pitch(2, 7);
        row.clear();
        assert_eq!(row.active_count(), 0);
        assert_eq!(row.pitch(2), 0);
        assert_eq!(row.resolution, Resolution::Eighth);
    }

    #[test]
    fn resolution_names_parse() {
        assert_eq!(Resolution::from_name("Sixteenth"), Resolution::Sixteenth);
        assert_eq!(Resolution::from_name("8n"), Resolution::Eighth);
        assert_eq!(Resolution::from_name("whatever"), Resolution::Quarter);
    }
}
