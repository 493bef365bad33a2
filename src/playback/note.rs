//! Single-note playback.
//!
//! `play_note` starts a note on the device, then branches one curve
//! stream per expression channel plus a release branch that ends the
//! note after `duration * note_gap` beats. The note-off is guaranteed:
//! whether the note runs out naturally or the handle (or any ancestor
//! scope) is canceled mid-flight, the device hears exactly one
//! `note_off` per accepted `note_on`.

use std::cell::Cell;
use std::rc::Rc;

use crate::curve::{self, CurvePoint};
use crate::device::{Device, Expression, ExpressiveNote};
use crate::playback::config::{effective_step, map_bend, PlaybackConfig};
use crate::sequencing::Note;
use crate::timing::{TaskHandle, TimeContext};

#[derive(Debug, Clone, Copy)]
enum CurveChannel {
    Bend,
    Pressure,
    Timbre,
}

/// Handle to one playing note.
pub struct NoteHandle {
    branches: Vec<TaskHandle<()>>,
    off_sent: Option<Rc<Cell<bool>>>,
    force_off: Option<Rc<dyn Fn()>>,
}

impl NoteHandle {
    fn rejected() -> Self {
        Self {
            branches: Vec::new(),
            off_sent: None,
            force_off: None,
        }
    }

    /// Whether the device accepted the note. A rejected note's
    /// `cancel()` is a no-op.
    pub fn started(&self) -> bool {
        self.off_sent.is_some()
    }

    /// Stop the note now: cancel the release and curve branches, and if
    /// no note-off has been emitted yet, emit it here — the device never
    /// keeps a dangling sounding note. Idempotent.
    pub fn cancel(&self) {
        for branch in &self.branches {
            branch.cancel();
        }
        if let (Some(off_sent), Some(force_off)) = (&self.off_sent, &self.force_off) {
            if !off_sent.replace(true) {
                force_off();
            }
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.branches.iter().any(|b| b.is_canceled())
    }
}

/// Play `note` inside `ctx`, streaming its expression curves to the
/// device. Returns immediately; the branches run as children of `ctx`.
pub fn play_note<D: Device>(
    ctx: &TimeContext,
    note: &Note,
    device: &D,
    config: &PlaybackConfig,
) -> NoteHandle {
    let Some(sounding) = device.note_on(note.pitch, note.velocity, initial_expression(note, config))
    else {
        log::warn!("device rejected note-on for pitch {}", note.pitch);
        return NoteHandle::rejected();
    };
    let sounding = Rc::new(sounding);

    let gate_beats = (note.duration * config.note_gap).max(0.0);
    let off_sent = Rc::new(Cell::new(false));
    let mut branches = Vec::new();

    let channels = [
        (CurveChannel::Bend, note.pitch_curve.clone()),
        (CurveChannel::Pressure, note.pressure_curve.clone()),
        (CurveChannel::Timbre, note.timbre_curve.clone()),
    ];
    for (channel, curve) in channels {
        let Some(points) = curve.filter(|points| !points.is_empty()) else {
            continue;
        };
        let sounding = sounding.clone();
        let config = *config;
        branches.push(ctx.branch(move |c| async move {
            stream_channel(c, points, channel, sounding, config, gate_beats).await;
        }));
    }

    // Release branch. The note-off is emitted whether the wait elapses
    // or the scope is canceled out from under it; `off_sent` keeps the
    // emission single no matter who gets there first.
    {
        let sounding = sounding.clone();
        let off_sent = off_sent.clone();
        let off_velocity = note.off_velocity;
        branches.push(ctx.branch(move |c| async move {
            let _ = c.wait(gate_beats).await;
            if !off_sent.replace(true) {
                sounding.note_off(off_velocity);
            }
        }));
    }

    let force_off = {
        let off_velocity = note.off_velocity;
        Rc::new(move || sounding.note_off(off_velocity)) as Rc<dyn Fn()>
    };

    NoteHandle {
        branches,
        off_sent: Some(off_sent),
        force_off: Some(force_off),
    }
}

fn initial_expression(note: &Note, config: &PlaybackConfig) -> Expression {
    fn sample(curve: &Option<Vec<CurvePoint>>) -> Option<f64> {
        curve
            .as_deref()
            .filter(|points| !points.is_empty())
            .map(|points| curve::evaluate(0.0, points))
    }

    Expression {
        bend: sample(&note.pitch_curve)
            .map(|v| map_bend(v, config.source_bend_range, config.device_bend_range)),
        pressure: sample(&note.pressure_curve).map(|v| v.clamp(0.0, 127.0)),
        timbre: sample(&note.timbre_curve).map(|v| v.clamp(0.0, 127.0)),
    }
}

async fn stream_channel<N: ExpressiveNote>(
    ctx: TimeContext,
    points: Vec<CurvePoint>,
    channel: CurveChannel,
    note: Rc<N>,
    config: PlaybackConfig,
    gate_beats: f64,
) {
    let step = effective_step(config.step_beats);
    loop {
        let pos = ctx.prog_beats();
        if pos >= gate_beats {
            break;
        }
        let value = curve::evaluate(pos, &points);
        match channel {
            CurveChannel::Bend => note.pitch_bend(map_bend(
                value,
                config.source_bend_range,
                config.device_bend_range,
            )),
            CurveChannel::Pressure => note.pressure(value.clamp(0.0, 127.0)),
            CurveChannel::Timbre => note.timbre(value.clamp(0.0, 127.0)),
        }
        if ctx.wait(step).await.is_err() {
            break;
        }
    }
}
