//! End-to-end playback tests against the offline transport.
//!
//! A recording device captures every call the driver makes, so the
//! tests can assert on exact call sequences: note-off guarantees,
//! trigger ordering, and deterministic replay.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cueflow::curve::{self, CurvePoint};
use cueflow::device::{Device, DeviceEvent, Expression, ExpressiveNote};
use cueflow::playback::{play_clip, play_note, play_param, PlayClipOptions, PlaybackConfig};
use cueflow::sequencing::{Clip, Note};
use cueflow::timing::Transport;

struct RecordingDevice {
    calls: Rc<RefCell<Vec<DeviceEvent>>>,
    next_id: Cell<u32>,
    voices: Cell<u32>,
}

impl RecordingDevice {
    fn new(voices: u32) -> Rc<Self> {
        Rc::new(Self {
            calls: Rc::new(RefCell::new(Vec::new())),
            next_id: Cell::new(0),
            voices: Cell::new(voices),
        })
    }

    fn calls(&self) -> Vec<DeviceEvent> {
        self.calls.borrow().clone()
    }

    fn count(&self, pred: impl Fn(&DeviceEvent) -> bool) -> usize {
        self.calls.borrow().iter().filter(|e| pred(e)).count()
    }

    fn note_ons(&self) -> Vec<u8> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::NoteOn { pitch, .. } => Some(*pitch),
                _ => None,
            })
            .collect()
    }
}

struct RecordingNote {
    id: u32,
    calls: Rc<RefCell<Vec<DeviceEvent>>>,
}

impl Device for RecordingDevice {
    type Note = RecordingNote;

    fn note_on(&self, pitch: u8, velocity: u8, initial: Expression) -> Option<RecordingNote> {
        if self.voices.get() == 0 {
            return None;
        }
        self.voices.set(self.voices.get() - 1);

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.calls.borrow_mut().push(DeviceEvent::NoteOn {
            id,
            pitch,
            velocity,
        });

        let note = RecordingNote {
            id,
            calls: self.calls.clone(),
        };
        if let Some(bend) = initial.bend {
            note.pitch_bend(bend);
        }
        if let Some(pressure) = initial.pressure {
            note.pressure(pressure);
        }
        if let Some(timbre) = initial.timbre {
            note.timbre(timbre);
        }
        Some(note)
    }
}

impl ExpressiveNote for RecordingNote {
    fn pitch_bend(&self, bend: f64) {
        self.calls
            .borrow_mut()
            .push(DeviceEvent::PitchBend { id: self.id, bend });
    }

    fn pressure(&self, value: f64) {
        self.calls
            .borrow_mut()
            .push(DeviceEvent::Pressure { id: self.id, value });
    }

    fn timbre(&self, value: f64) {
        self.calls
            .borrow_mut()
            .push(DeviceEvent::Timbre { id: self.id, value });
    }

    fn note_off(&self, velocity: u8) {
        self.calls.borrow_mut().push(DeviceEvent::NoteOff {
            id: self.id,
            velocity,
        });
    }
}

fn is_note_on(event: &DeviceEvent) -> bool {
    matches!(event, DeviceEvent::NoteOn { .. })
}

fn is_note_off(event: &DeviceEvent) -> bool {
    matches!(event, DeviceEvent::NoteOff { .. })
}

fn is_pressure(event: &DeviceEvent) -> bool {
    matches!(event, DeviceEvent::Pressure { .. })
}

#[test]
fn natural_completion_sends_exactly_one_note_off() {
    let transport = Transport::new(120.0);
    let device = RecordingDevice::new(8);
    let config = PlaybackConfig::default();

    let note = Note::new(60, 0.0, 1.0, 100).with_off_velocity(40);
    let handle = play_note(transport.context(), &note, device.as_ref(), &config);
    assert!(handle.started());

    transport.run_until_idle(60.0);

    assert_eq!(device.count(is_note_on), 1);
    assert_eq!(device.count(is_note_off), 1);
    assert!(device
        .calls()
        .contains(&DeviceEvent::NoteOff { id: 0, velocity: 40 }));
}

#[test]
fn canceled_note_sends_exactly_one_note_off_and_stops_streaming() {
    // 60 bpm: one beat per second, so beat positions read as seconds.
    let transport = Transport::new(60.0);
    let device = RecordingDevice::new(8);
    let config = PlaybackConfig::default();

    let note = Note::new(60, 0.0, 2.0, 100)
        .with_pressure_curve(vec![CurvePoint::new(0.0, 20.0), CurvePoint::new(2.0, 120.0)]);
    let handle = play_note(transport.context(), &note, device.as_ref(), &config);

    transport.advance_beats(0.5);
    assert!(device.count(is_pressure) > 0);
    assert_eq!(device.count(is_note_off), 0);

    handle.cancel();
    handle.cancel(); // double cancel must change nothing further
    let after_cancel = device.calls();

    transport.advance_beats(3.0);

    assert_eq!(device.calls(), after_cancel, "no device calls after the cancellation tick");
    assert_eq!(device.count(is_note_on), 1);
    assert_eq!(device.count(is_note_off), 1);
}

#[test]
fn rejected_note_is_inert() {
    let transport = Transport::new(120.0);
    let device = RecordingDevice::new(0);
    let config = PlaybackConfig::default();

    let note = Note::new(60, 0.0, 1.0, 100);
    let handle = play_note(transport.context(), &note, device.as_ref(), &config);

    assert!(!handle.started());
    handle.cancel();
    transport.run_until_idle(10.0);
    assert!(device.calls().is_empty());
}

#[test]
fn clip_triggers_notes_in_time_order() {
    let transport = Transport::new(120.0);
    let device = RecordingDevice::new(8);
    let config = PlaybackConfig::default();

    let clip = Clip::new("scrambled", 4.0).with_notes(vec![
        Note::new(62, 2.0, 0.5, 100),
        Note::new(60, 0.0, 0.5, 100),
        Note::new(61, 1.0, 0.5, 100),
    ]);

    let _handle = play_clip(
        &clip,
        transport.context(),
        &device,
        &config,
        PlayClipOptions::default(),
    );
    transport.run_until_idle(60.0);

    assert_eq!(device.note_ons(), vec![60, 61, 62]);
    assert_eq!(device.count(is_note_off), 3);
}

#[test]
fn clip_cancel_tears_down_every_sounding_note() {
    let transport = Transport::new(60.0);
    let device = RecordingDevice::new(8);
    let config = PlaybackConfig::default();

    let clip = Clip::new("overlap", 8.0).with_notes(vec![
        Note::new(60, 0.0, 3.0, 100),
        Note::new(64, 0.5, 3.0, 100),
        Note::new(67, 1.0, 3.0, 100),
    ]);

    let handle = play_clip(
        &clip,
        transport.context(),
        &device,
        &config,
        PlayClipOptions::default(),
    );

    transport.advance_beats(1.25);
    assert_eq!(device.count(is_note_on), 3);

    handle.cancel();
    assert!(handle.is_canceled());
    let after_cancel = device.calls();
    assert_eq!(device.count(is_note_off), 3);

    transport.advance_beats(10.0);
    assert_eq!(device.calls(), after_cancel);
    assert!(transport.is_idle());
}

#[test]
fn voice_exhaustion_degrades_gracefully() {
    let transport = Transport::new(120.0);
    let device = RecordingDevice::new(1);
    let config = PlaybackConfig::default();

    let clip = Clip::new("too-many", 4.0).with_notes(vec![
        Note::new(60, 0.0, 2.0, 100),
        Note::new(64, 0.5, 2.0, 100), // no voice left for this one
    ]);

    let _handle = play_clip(
        &clip,
        transport.context(),
        &device,
        &config,
        PlayClipOptions::default(),
    );
    transport.run_until_idle(60.0);

    assert_eq!(device.count(is_note_on), 1);
    assert_eq!(device.count(is_note_off), 1);
}

#[test]
fn note_start_hook_vetoes_and_substitutes() {
    let transport = Transport::new(120.0);
    let device = RecordingDevice::new(8);
    let config = PlaybackConfig::default();

    let clip = Clip::new("hooked", 4.0).with_notes(vec![
        Note::new(60, 0.0, 0.5, 100),
        Note::new(61, 1.0, 0.5, 100),
        Note::new(62, 2.0, 0.5, 100),
    ]);

    let options = PlayClipOptions {
        wait_for_completion: true,
        on_note_start: Some(Rc::new(|note: &Note| {
            if note.pitch == 61 {
                None // veto
            } else {
                let mut octave_up = note.clone();
                octave_up.pitch += 12;
                Some(octave_up)
            }
        })),
    };

    let _handle = play_clip(&clip, transport.context(), &device, &config, options);
    transport.run_until_idle(60.0);

    assert_eq!(device.note_ons(), vec![72, 74]);
}

#[test]
fn clip_handle_completes_with_the_clip_window() {
    // 120 bpm: 4 beats = 2 seconds.
    let transport = Transport::new(120.0);
    let device = RecordingDevice::new(8);
    let config = PlaybackConfig::default();

    let clip = Clip::new("window", 4.0).with_notes(vec![Note::new(60, 0.0, 1.0, 100)]);

    let _handle = play_clip(
        &clip,
        transport.context(),
        &device,
        &config,
        PlayClipOptions::default(),
    );
    transport.run_until_idle(60.0);
    assert!((transport.now() - 2.0).abs() < 1e-9);

    let transport = Transport::new(120.0);
    let device = RecordingDevice::new(8);
    let _handle = play_clip(
        &clip,
        transport.context(),
        &device,
        &config,
        PlayClipOptions {
            wait_for_completion: false,
            on_note_start: None,
        },
    );
    transport.run_until_idle(60.0);
    assert!(transport.now() < 1.0);
}

#[test]
fn offline_replay_is_deterministic() {
    fn run_once() -> Vec<DeviceEvent> {
        let transport = Transport::new(97.0); // awkward tempo on purpose
        let device = RecordingDevice::new(8);
        let config = PlaybackConfig {
            source_bend_range: 2.0,
            ..PlaybackConfig::default()
        };

        let clip = Clip::new("replay", 6.0).with_notes(vec![
            Note::new(60, 0.0, 2.0, 100).with_pitch_curve(vec![
                CurvePoint::new(0.0, 0.0),
                CurvePoint::with_handles(2.0, 1.0, 0.42, 0.0, 0.58, 1.0),
            ]),
            Note::new(67, 1.5, 2.5, 90)
                .with_pressure_curve(vec![CurvePoint::new(0.0, 0.0), CurvePoint::new(2.5, 127.0)]),
        ]);

        let _handle = play_clip(
            &clip,
            transport.context(),
            &device,
            &config,
            PlayClipOptions::default(),
        );
        for _ in 0..50 {
            transport.advance_by(0.1);
        }
        device.calls()
    }

    let first = run_once();
    let second = run_once();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn pitch_curve_streams_mapped_bend_values() {
    let transport = Transport::new(60.0);
    let device = RecordingDevice::new(8);
    let config = PlaybackConfig {
        step_beats: 0.25,
        note_gap: 1.0,
        source_bend_range: 2.0,
        device_bend_range: 48.0,
    };

    // Full-scale curve value 1.0 over a ±2 semitone source range is
    // 2/48 of the device's unit bend.
    let note = Note::new(60, 0.0, 1.0, 100)
        .with_pitch_curve(vec![CurvePoint::new(0.0, 0.0), CurvePoint::new(1.0, 1.0)]);
    let _handle = play_note(transport.context(), &note, device.as_ref(), &config);
    transport.run_until_idle(60.0);

    let bends: Vec<f64> = device
        .calls()
        .iter()
        .filter_map(|e| match e {
            DeviceEvent::PitchBend { bend, .. } => Some(*bend),
            _ => None,
        })
        .collect();

    assert!(!bends.is_empty());
    let full_scale = 2.0 / 48.0;
    for bend in &bends {
        assert!(
            (0.0..=full_scale + 1e-12).contains(bend),
            "bend {bend} out of range"
        );
    }
    // Monotonically rising curve, monotonically rising bends.
    for pair in bends.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
}

#[test]
fn param_streams_share_the_curve_solver() {
    let transport = Transport::new(120.0);
    let config = PlaybackConfig {
        step_beats: 0.25,
        ..PlaybackConfig::default()
    };

    let points = vec![
        CurvePoint::new(0.0, 0.0),
        CurvePoint::with_handles(1.0, 10.0, 0.42, 0.0, 0.58, 1.0),
    ];
    let samples = Rc::new(RefCell::new(Vec::new()));

    let sink = samples.clone();
    let curve_points = points.clone();
    let _handle = play_param(
        transport.context(),
        curve_points,
        1.0,
        &config,
        move |value| sink.borrow_mut().push(value),
    );
    transport.run_until_idle(60.0);

    let expected: Vec<f64> = [0.0, 0.25, 0.5, 0.75, 1.0]
        .iter()
        .map(|&pos| curve::evaluate(pos, &points))
        .collect();
    assert_eq!(*samples.borrow(), expected);
}

#[test]
fn branch_wait_handle_allows_external_cancellation() {
    let transport = Transport::new(120.0);
    let outcome = Rc::new(RefCell::new(None));
    let parked = Rc::new(RefCell::new(None));

    let slot = outcome.clone();
    let stash = parked.clone();
    transport.spawn(move |ctx| async move {
        let waiter = ctx.branch_wait(|child| async move {
            let _ = child.wait_sec(100.0).await;
        });
        *stash.borrow_mut() = Some(waiter.handle());
        *slot.borrow_mut() = Some(waiter.await);
    });

    transport.advance_by(1.0);
    parked
        .borrow()
        .as_ref()
        .expect("handle stashed")
        .cancel();
    transport.advance_by(1.0);

    assert!(matches!(*outcome.borrow(), Some(Err(_))));
    assert!(transport.is_idle());
}
