//! Render a clip through the offline transport and print every device
//! call with its timestamp. No wall clock involved: running this twice
//! prints byte-identical output.
//!
//! Run with: cargo run --example offline_render

use std::cell::Cell;
use std::rc::Rc;

use cueflow::curve::CurvePoint;
use cueflow::device::{Device, Expression, ExpressiveNote};
use cueflow::playback::{play_clip, PlayClipOptions, PlaybackConfig};
use cueflow::sequencing::{Clip, ClipRegistry, Note};
use cueflow::timing::Transport;

/// Prints calls instead of making sound.
struct ConsoleDevice {
    transport: Rc<Transport>,
    next_id: Cell<u32>,
}

struct ConsoleNote {
    id: u32,
    transport: Rc<Transport>,
}

impl ConsoleNote {
    fn log(&self, message: String) {
        println!("{:7.3}s  note {:2}  {message}", self.transport.now(), self.id);
    }
}

impl Device for ConsoleDevice {
    type Note = ConsoleNote;

    fn note_on(&self, pitch: u8, velocity: u8, initial: Expression) -> Option<ConsoleNote> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let note = ConsoleNote {
            id,
            transport: self.transport.clone(),
        };
        note.log(format!("on   pitch {pitch} vel {velocity} {initial:?}"));
        Some(note)
    }
}

impl ExpressiveNote for ConsoleNote {
    fn pitch_bend(&self, bend: f64) {
        self.log(format!("bend {bend:+.4}"));
    }

    fn pressure(&self, value: f64) {
        self.log(format!("pres {value:.1}"));
    }

    fn timbre(&self, value: f64) {
        self.log(format!("timb {value:.1}"));
    }

    fn note_off(&self, velocity: u8) {
        self.log(format!("off  vel {velocity}"));
    }
}

fn main() {
    let transport = Rc::new(Transport::new(110.0));

    let mut registry = ClipRegistry::new();
    registry.insert(
        Clip::new("phrase", 8.0).with_notes(vec![
            Note::new(60, 0.0, 2.0, 100).with_pitch_curve(vec![
                CurvePoint::new(0.0, 0.0),
                CurvePoint::with_handles(2.0, 0.5, 0.42, 0.0, 0.58, 1.0),
            ]),
            Note::new(64, 2.0, 1.0, 90),
            Note::new(67, 3.0, 1.0, 90)
                .with_pressure_curve(vec![CurvePoint::new(0.0, 0.0), CurvePoint::new(1.0, 110.0)]),
            Note::new(72, 4.0, 4.0, 110),
        ]),
    );

    let device = Rc::new(ConsoleDevice {
        transport: transport.clone(),
        next_id: Cell::new(0),
    });

    let config = PlaybackConfig {
        step_beats: 0.25,
        ..PlaybackConfig::default()
    };
    let clip = registry.get("phrase").expect("clip registered");
    let _handle = play_clip(
        clip,
        transport.context(),
        &device,
        &config,
        PlayClipOptions::default(),
    );

    transport.run_until_idle(60.0);
    println!("done at {:.3}s ({:.1} beats)", transport.now(), transport.beats());
}
