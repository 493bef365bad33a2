//! Ring-buffer device sink.
//!
//! `QueueDevice` turns every device call into a [`DeviceEvent`] pushed
//! onto an rtrb ring buffer. The control side stays on the scheduler
//! thread; the consumer half is `Send` and typically drained from an
//! audio callback, which pairs each event stream up by note id.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rtrb::{Consumer, Producer, RingBuffer};

use super::{Device, DeviceEvent, Expression, ExpressiveNote};

type SharedProducer = Rc<RefCell<Producer<DeviceEvent>>>;

pub struct QueueDevice {
    tx: SharedProducer,
    next_id: Cell<u32>,
}

impl QueueDevice {
    /// Create a device writing into a ring buffer of `capacity` events.
    /// Returns the consumer half for the reading thread.
    pub fn new(capacity: usize) -> (Self, Consumer<DeviceEvent>) {
        let (tx, rx) = RingBuffer::new(capacity);
        (
            Self {
                tx: Rc::new(RefCell::new(tx)),
                next_id: Cell::new(0),
            },
            rx,
        )
    }
}

impl Device for QueueDevice {
    type Note = QueueNote;

    fn note_on(&self, pitch: u8, velocity: u8, initial: Expression) -> Option<Self::Note> {
        let id = self.next_id.get();

        // A full queue at note-on time means the note never existed as
        // far as the consumer is concerned, so reject it outright.
        if self
            .tx
            .borrow_mut()
            .push(DeviceEvent::NoteOn {
                id,
                pitch,
                velocity,
            })
            .is_err()
        {
            log::warn!("event queue full, rejecting note-on for pitch {pitch}");
            return None;
        }
        self.next_id.set(id.wrapping_add(1));

        let note = QueueNote {
            id,
            tx: self.tx.clone(),
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

pub struct QueueNote {
    id: u32,
    tx: SharedProducer,
}

impl QueueNote {
    fn push(&self, event: DeviceEvent) {
        // Expression updates are droppable; the next one supersedes them.
        if self.tx.borrow_mut().push(event).is_err() {
            log::warn!("event queue full, dropping {event:?}");
        }
    }
}

impl ExpressiveNote for QueueNote {
    fn pitch_bend(&self, bend: f64) {
        self.push(DeviceEvent::PitchBend { id: self.id, bend });
    }

    fn pressure(&self, value: f64) {
        self.push(DeviceEvent::Pressure { id: self.id, value });
    }

    fn timbre(&self, value: f64) {
        self.push(DeviceEvent::Timbre { id: self.id, value });
    }

    fn note_off(&self, velocity: u8) {
        self.push(DeviceEvent::NoteOff {
            id: self.id,
            velocity,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_call_order() {
        let (device, mut rx) = QueueDevice::new(16);
        let note = device
            .note_on(
                60,
                100,
                Expression {
                    bend: Some(0.25),
                    pressure: None,
                    timbre: None,
                },
            )
            .expect("queue has room");
        note.pressure(64.0);
        note.note_off(50);

        let mut events = Vec::new();
        while let Ok(event) = rx.pop() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                DeviceEvent::NoteOn {
                    id: 0,
                    pitch: 60,
                    velocity: 100
                },
                DeviceEvent::PitchBend { id: 0, bend: 0.25 },
                DeviceEvent::Pressure { id: 0, value: 64.0 },
                DeviceEvent::NoteOff {
                    id: 0,
                    velocity: 50
                },
            ]
        );
    }

    #[test]
    fn full_queue_rejects_note_on() {
        let (device, rx) = QueueDevice::new(1);
        let first = device.note_on(60, 100, Expression::default());
        assert!(first.is_some());
        let second = device.note_on(61, 100, Expression::default());
        assert!(second.is_none());
        drop(rx);
    }

    #[test]
    fn ids_distinguish_concurrent_notes() {
        let (device, mut rx) = QueueDevice::new(16);
        let a = device.note_on(60, 100, Expression::default()).unwrap();
        let b = device.note_on(64, 100, Expression::default()).unwrap();
        b.note_off(0);
        a.note_off(0);

        let mut offs = Vec::new();
        while let Ok(event) = rx.pop() {
            if let DeviceEvent::NoteOff { id, .. } = event {
                offs.push(id);
            }
        }
        assert_eq!(offs, vec![1, 0]);
    }
}
