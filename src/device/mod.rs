/*
Device Boundary
===============

The playback driver talks to instruments through these two traits and
nothing else. A device hands out one note object per accepted note-on;
the note object receives per-note expression (MPE-style independent
pitch bend, pressure, and timbre) and exactly one note-off.

`note_on` returning `None` means the device refused the note — a full
voice pool, usually. The driver treats that as a non-fatal degraded
case, not an error.

Value ranges at this boundary:
- pitch bend: normalized -1..1 over the device's own bend range
- pressure, timbre: 0..127
*/

#[cfg(feature = "rtrb")]
pub mod queue;

#[cfg(feature = "rtrb")]
pub use queue::{QueueDevice, QueueNote};

/// Initial expression state delivered with a note-on, sampled from the
/// note's curves at offset zero. Channels without a curve stay `None`
/// and the device keeps its defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Expression {
    pub bend: Option<f64>,
    pub pressure: Option<f64>,
    pub timbre: Option<f64>,
}

impl Expression {
    pub fn is_empty(&self) -> bool {
        self.bend.is_none() && self.pressure.is_none() && self.timbre.is_none()
    }
}

/// One sounding note on a device.
pub trait ExpressiveNote {
    fn pitch_bend(&self, bend: f64);
    fn pressure(&self, value: f64);
    fn timbre(&self, value: f64);
    fn note_off(&self, velocity: u8);
}

/// An instrument capable of per-note expression.
pub trait Device {
    type Note: ExpressiveNote + 'static;

    /// Start a note. `None` means the device rejected it (e.g. voice
    /// pool exhaustion); callers must not retry in a tight loop.
    fn note_on(&self, pitch: u8, velocity: u8, initial: Expression) -> Option<Self::Note>;
}

/// A device call in record form, for queues, logs, and tests.
/// `id` ties the calls of one sounding note together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceEvent {
    NoteOn { id: u32, pitch: u8, velocity: u8 },
    PitchBend { id: u32, bend: f64 },
    Pressure { id: u32, value: f64 },
    Timbre { id: u32, value: f64 },
    NoteOff { id: u32, velocity: u8 },
}
