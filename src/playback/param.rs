//! Curve streaming for animated properties.
//!
//! Generic keyframe tracks share the exact sampler that note expression
//! uses, so a property animated in a visual editor and a pressure curve
//! on a note evaluate identically at the same positions.

use crate::curve::{self, CurvePoint};
use crate::playback::config::{effective_step, PlaybackConfig};
use crate::timing::{TaskHandle, TimeContext};

/// Stream `points` into `sink` for `duration_beats`, sampling every
/// `config.step_beats`. On natural completion the sink receives the
/// curve's value at the end position, so properties land exactly on
/// their final keyframe; a canceled stream stops where it was.
pub fn play_param<F>(
    ctx: &TimeContext,
    points: Vec<CurvePoint>,
    duration_beats: f64,
    config: &PlaybackConfig,
    sink: F,
) -> TaskHandle<()>
where
    F: Fn(f64) + 'static,
{
    let step = effective_step(config.step_beats);
    ctx.branch(move |c| async move {
        loop {
            let pos = c.prog_beats();
            if pos >= duration_beats {
                break;
            }
            sink(curve::evaluate(pos, &points));
            if c.wait(step).await.is_err() {
                return;
            }
        }
        sink(curve::evaluate(duration_beats, &points));
    })
}
