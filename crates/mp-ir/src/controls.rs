//! Mappings from UI control values (0-100) and gesture fractions (0-1)
//! to audio parameter ranges.
//!
//! Every UI knob goes through one of these; nothing else in the workspace
//! converts control values inline.

/// Lowest filter cutoff reachable from the control range.
pub const FILTER_MIN_HZ: f32 = 200.0;
/// Highest filter cutoff reachable from the control range.
pub const FILTER_MAX_HZ: f32 = 20_000.0;
/// Shortest release time.
pub const DECAY_MIN_SECONDS: f32 = 0.01;
/// Longest release time.
pub const DECAY_MAX_SECONDS: f32 = 2.0;
/// Shortest delay line time.
pub const DELAY_MIN_SECONDS: f32 = 0.05;
/// Longest delay line time.
pub const DELAY_MAX_SECONDS: f32 = 1.0;
/// Slowest sample playback rate from a gesture.
pub const RATE_MIN: f32 = 0.5;
/// Fastest sample playback rate from a gesture.
pub const RATE_MAX: f32 = 2.0;
/// Velocity at the bottom edge of the pad.
pub const VELOCITY_FLOOR: f32 = 0.3;

/// Normalize a 0-100 control value to 0.0..=1.0. NaN reads as 0.
pub fn unit(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    (value / 100.0).clamp(0.0, 1.0)
}

/// Clamp a gesture fraction to 0.0..=1.0. NaN reads as 0.
pub fn fraction(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Filter cutoff, logarithmic so equal knob travel is equal musical interval.
pub fn filter_cutoff_hz(value: f32) -> f32 {
    FILTER_MIN_HZ * libm::powf(FILTER_MAX_HZ / FILTER_MIN_HZ, unit(value))
}

/// Release time used when a voice is stopped.
pub fn decay_seconds(value: f32) -> f32 {
    DECAY_MIN_SECONDS + unit(value) * (DECAY_MAX_SECONDS - DECAY_MIN_SECONDS)
}

/// Wet level of the delay or reverb send.
pub fn wet_mix(value: f32) -> f32 {
    unit(value)
}

/// Track output gain.
pub fn volume_gain(value: f32) -> f32 {
    unit(value)
}

/// Delay line time.
pub fn delay_seconds(value: f32) -> f32 {
    DELAY_MIN_SECONDS + unit(value) * (DELAY_MAX_SECONDS - DELAY_MIN_SECONDS)
}

/// Sample playback rate from the horizontal gesture position (exponential,
/// so the pad centre plays at original speed).
pub fn playback_rate(x_fraction: f32) -> f32 {
    RATE_MIN * libm::powf(RATE_MAX / RATE_MIN, fraction(x_fraction))
}

/// Note velocity from the vertical gesture position, 0.0 = top of the pad.
pub fn velocity(y_fraction: f32) -> f32 {
    1.0 - fraction(y_fraction) * (1.0 - VELOCITY_FLOOR)
}

/// Playback rate that transposes a sample by `semitones`.
pub fn semitone_ratio(semitones: f32) -> f32 {
    libm::powf(2.0, semitones / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() <= b.abs() * 1e-4 + 1e-6
    }

    #[test]
    fn filter_spans_range_logarithmically() {
        assert!(close(filter_cutoff_hz(0.0), 200.0));
        assert!(close(filter_cutoff_hz(100.0), 20_000.0));
        assert!(close(filter_cutoff_hz(50.0), 2_000.0));
    }

    #[test]
    fn decay_spans_range_linearly() {
        assert!(close(decay_seconds(0.0), 0.01));
        assert!(close(decay_seconds(100.0), 2.0));
        assert!(close(decay_seconds(50.0), 1.005));
    }

    #[test]
    fn out_of_range_controls_clamp() {
        assert!(close(filter_cutoff_hz(-20.0), 200.0));
        assert!(close(filter_cutoff_hz(250.0), 20_000.0));
        assert_eq!(wet_mix(f32::NAN), 0.0);
        assert_eq!(volume_gain(140.0), 1.0);
    }

    #[test]
    fn wet_mix_and_volume_are_linear() {
        assert!(close(wet_mix(25.0), 0.25));
        assert!(close(volume_gain(80.0), 0.8));
    }

    #[test]
    fn delay_time_spans_range() {
        assert!(close(delay_seconds(0.0), 0.05));
        assert!(close(delay_seconds(100.0), 1.0));
    }

    #[test]
    fn playback_rate_is_unity_at_centre() {
        assert!(close(playback_rate(0.0), 0.5));
        assert!(close(playback_rate(0.5), 1.0));
        assert!(close(playback_rate(1.0), 2.0));
    }

    #[test]
    fn velocity_is_loudest_at_top() {
        assert!(close(velocity(0.0), 1.0));
        assert!(close(velocity(1.0), VELOCITY_FLOOR));
        assert!(velocity(0.25) > velocity(0.75));
    }

    #[test]
    fn octave_is_ratio_two() {
        assert!(close(semitone_ratio(12.0), 2.0));
        assert!(close(semitone_ratio(-12.0), 0.5));
        assert!(close(semitone_ratio(0.0), 1.0));
    }
}
