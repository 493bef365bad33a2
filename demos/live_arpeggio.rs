//! Play a short arpeggio against the wall clock, printing device calls
//! as they happen. The same scheduling code as the offline demo — only
//! the driver changes.
//!
//! Run with: cargo run --example live_arpeggio

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use cueflow::device::{Device, Expression, ExpressiveNote};
use cueflow::playback::{play_note, PlaybackConfig};
use cueflow::sequencing::Note;
use cueflow::timing::{SystemClock, Transport};

struct ConsoleDevice {
    started: Instant,
    next_id: Cell<u32>,
}

struct ConsoleNote {
    id: u32,
    started: Instant,
}

impl Device for ConsoleDevice {
    type Note = ConsoleNote;

    fn note_on(&self, pitch: u8, velocity: u8, _initial: Expression) -> Option<ConsoleNote> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        println!(
            "{:7.3}s  note {id}  on   pitch {pitch} vel {velocity}",
            self.started.elapsed().as_secs_f64()
        );
        Some(ConsoleNote {
            id,
            started: self.started,
        })
    }
}

impl ExpressiveNote for ConsoleNote {
    fn pitch_bend(&self, _bend: f64) {}

    fn pressure(&self, _value: f64) {}

    fn timbre(&self, _value: f64) {}

    fn note_off(&self, velocity: u8) {
        println!(
            "{:7.3}s  note {}  off  vel {velocity}",
            self.started.elapsed().as_secs_f64(),
            self.id
        );
    }
}

fn main() {
    let transport = Transport::new(140.0);
    let device = Rc::new(ConsoleDevice {
        started: Instant::now(),
        next_id: Cell::new(0),
    });

    let config = PlaybackConfig::default();
    transport.spawn(move |ctx| async move {
        for &pitch in &[60u8, 64, 67, 72, 67, 64, 60] {
            let note = Note::new(pitch, 0.0, 0.9, 100);
            let _handle = play_note(&ctx, &note, device.as_ref(), &config);
            if ctx.wait(1.0).await.is_err() {
                return;
            }
        }
    });

    transport.run_live(&SystemClock::new(), 60.0);
    println!("done");
}
