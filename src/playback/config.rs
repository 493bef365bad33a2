/// Knobs shared by the note, clip, and parameter players.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackConfig {
    /// Beats between curve samples while a note sounds.
    pub step_beats: f64,
    /// Fraction of a note's nominal duration that actually sounds,
    /// leaving audible separation before the next note.
    pub note_gap: f64,
    /// Semitone span that pitch-curve values are authored against.
    pub source_bend_range: f64,
    /// Semitone span of the device's unit bend range.
    pub device_bend_range: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            step_beats: 0.05,
            note_gap: 0.95,
            source_bend_range: 48.0,
            device_bend_range: 48.0,
        }
    }
}

pub(crate) const FALLBACK_STEP_BEATS: f64 = 0.05;

/// A curve stream must make forward progress; a zero or negative step
/// would spin on a single scheduling instant forever.
pub(crate) fn effective_step(step_beats: f64) -> f64 {
    if step_beats.is_finite() && step_beats > 0.0 {
        step_beats
    } else {
        FALLBACK_STEP_BEATS
    }
}

/// Rescale a bend value authored against `source_range` semitones into
/// the device's normalized unit range, clamped to [-1, 1]. The same
/// absolute semitone offset comes out of both ends. Degenerate ranges
/// map to no bend at all.
pub fn map_bend(value: f64, source_range: f64, device_range: f64) -> f64 {
    if source_range <= 0.0 || device_range <= 0.0 {
        return 0.0;
    }
    (value * (source_range / device_range)).clamp(-1.0, 1.0)
}
