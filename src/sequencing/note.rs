use crate::curve::CurvePoint;

/// A single note in a clip, with optional per-note expression curves.
///
/// Notes are produced by an external editor or parser and consumed
/// read-only by playback; nothing here is mutated while sounding.
/// Curve positions are beats from the note's own start.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// MIDI note number.
    pub pitch: u8,
    /// Start position in beats from the clip start.
    pub position: f64,
    /// Nominal length in beats.
    pub duration: f64,
    /// Attack velocity (0-127).
    pub velocity: u8,
    /// Release velocity (0-127).
    pub off_velocity: u8,
    /// Disabled notes are skipped by clip playback.
    pub enabled: bool,
    pub pitch_curve: Option<Vec<CurvePoint>>,
    pub pressure_curve: Option<Vec<CurvePoint>>,
    pub timbre_curve: Option<Vec<CurvePoint>>,
}

impl Note {
    pub fn new(pitch: u8, position: f64, duration: f64, velocity: u8) -> Self {
        Self {
            pitch,
            position,
            duration,
            velocity,
            off_velocity: 64,
            enabled: true,
            pitch_curve: None,
            pressure_curve: None,
            timbre_curve: None,
        }
    }

    pub fn with_off_velocity(mut self, off_velocity: u8) -> Self {
        self.off_velocity = off_velocity;
        self
    }

    pub fn with_pitch_curve(mut self, points: Vec<CurvePoint>) -> Self {
        self.pitch_curve = Some(points);
        self
    }

    pub fn with_pressure_curve(mut self, points: Vec<CurvePoint>) -> Self {
        self.pressure_curve = Some(points);
        self
    }

    pub fn with_timbre_curve(mut self, points: Vec<CurvePoint>) -> Self {
        self.timbre_curve = Some(points);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Position where the note's nominal duration ends.
    pub fn end(&self) -> f64 {
        self.position + self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let note = Note::new(60, 1.0, 0.5, 100);
        assert!(note.enabled);
        assert_eq!(note.off_velocity, 64);
        assert!(note.pitch_curve.is_none());
        assert_eq!(note.end(), 1.5);
    }

    #[test]
    fn builder_chaining() {
        let note = Note::new(64, 0.0, 2.0, 90)
            .with_off_velocity(30)
            .with_pressure_curve(vec![CurvePoint::new(0.0, 64.0)])
            .disabled();
        assert!(!note.enabled);
        assert_eq!(note.off_velocity, 30);
        assert!(note.pressure_curve.is_some());
    }
}
