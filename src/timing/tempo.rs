//! Tempo map: seconds ↔ beats conversion.
//!
//! Piecewise-constant BPM. Every tempo change appends a segment, so
//! conversions stay exact for times both before and after a change.

#[derive(Debug, Clone, Copy)]
struct TempoSegment {
    start_time: f64,
    start_beat: f64,
    bpm: f64,
}

#[derive(Debug, Clone)]
pub struct TempoMap {
    /// Sorted by `start_time` (equivalently by `start_beat`), never empty.
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    pub fn new(bpm: f64) -> Self {
        assert!(bpm > 0.0, "bpm must be positive");
        Self {
            segments: vec![TempoSegment {
                start_time: 0.0,
                start_beat: 0.0,
                bpm,
            }],
        }
    }

    fn segment_at_time(&self, time: f64) -> &TempoSegment {
        let idx = self.segments.partition_point(|s| s.start_time <= time);
        &self.segments[idx.saturating_sub(1)]
    }

    pub fn bpm_at_time(&self, time: f64) -> f64 {
        self.segment_at_time(time).bpm
    }

    pub fn beats_at_time(&self, time: f64) -> f64 {
        let segment = self.segment_at_time(time);
        segment.start_beat + (time - segment.start_time) * segment.bpm / 60.0
    }

    pub fn time_at_beats(&self, beats: f64) -> f64 {
        let idx = self.segments.partition_point(|s| s.start_beat <= beats);
        let segment = &self.segments[idx.saturating_sub(1)];
        segment.start_time + (beats - segment.start_beat) * 60.0 / segment.bpm
    }

    /// Change the tempo from `time` onward. Earlier history is preserved;
    /// any previously scheduled changes at or after `time` are replaced.
    pub fn set_bpm_at_time(&mut self, bpm: f64, time: f64) {
        assert!(bpm > 0.0, "bpm must be positive");
        let start_beat = self.beats_at_time(time);
        self.segments.retain(|s| s.start_time < time);
        self.segments.push(TempoSegment {
            start_time: time,
            start_beat,
            bpm,
        });
    }
}
