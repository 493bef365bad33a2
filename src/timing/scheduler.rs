//! The wait registry.
//!
//! Suspended scopes park here as `WaitCell`s: timed waits with an
//! absolute due time, beat waits whose due time is re-derived from the
//! tempo map when it changes, and frame waits that resolve on the next
//! transport tick. The scheduler itself never runs tasks — the
//! transport fires due cells and then lets the executor drain.

use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::Rc;
use std::task::Waker;

use crate::timing::cancel::CancelNotify;
use crate::timing::tempo::TempoMap;
use crate::TIME_EPSILON;

/// Shared state of one suspended wait.
///
/// Settles exactly once, to either done (time arrived) or canceled.
pub(crate) struct WaitCell {
    done: Cell<bool>,
    canceled: Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

impl WaitCell {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            done: Cell::new(false),
            canceled: Cell::new(false),
            waker: RefCell::new(None),
        })
    }

    pub fn set_waker(&self, waker: &Waker) {
        *self.waker.borrow_mut() = Some(waker.clone());
    }

    pub fn is_done(&self) -> bool {
        self.done.get()
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.get()
    }

    /// Mark the wait as elapsed and wake its task. No-op once settled.
    pub fn fire(&self) {
        if self.canceled.get() || self.done.replace(true) {
            return;
        }
        self.wake();
    }

    fn wake(&self) {
        if let Some(waker) = self.waker.borrow_mut().take() {
            waker.wake();
        }
    }
}

impl CancelNotify for WaitCell {
    fn on_cancel(&self) {
        if self.done.get() || self.canceled.replace(true) {
            return;
        }
        self.wake();
    }

    fn is_settled(&self) -> bool {
        self.done.get() || self.canceled.get()
    }
}

struct WaitEntry {
    seq: u64,
    due: f64,
    /// Present for beat-domain waits; lets the due time follow tempo changes.
    target_beat: Option<f64>,
    cell: Rc<WaitCell>,
}

pub(crate) struct TimeScheduler {
    /// Current transport time in seconds.
    now: f64,
    /// Furthest logical time any scope has reached; base for new waits.
    horizon: f64,
    next_seq: u64,
    entries: Vec<WaitEntry>,
    frame_waiters: Vec<Rc<WaitCell>>,
}

impl TimeScheduler {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            horizon: 0.0,
            next_seq: 0,
            entries: Vec::new(),
            frame_waiters: Vec::new(),
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    pub fn bump_horizon(&mut self, t: f64) {
        if t > self.horizon {
            self.horizon = t;
        }
    }

    /// Move the clock forward without firing anything. Never moves back.
    /// The horizon follows: work scheduled later bases off the present,
    /// not off a logical time the schedule has already left behind.
    pub fn set_now(&mut self, t: f64) {
        if t > self.now {
            self.now = t;
        }
        if t > self.horizon {
            self.horizon = t;
        }
    }

    fn alloc_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn add_timed(&mut self, due: f64, cell: Rc<WaitCell>) {
        let seq = self.alloc_seq();
        self.entries.push(WaitEntry {
            seq,
            due: due.max(0.0),
            target_beat: None,
            cell,
        });
    }

    pub fn add_beat(&mut self, target_beat: f64, due: f64, cell: Rc<WaitCell>) {
        let seq = self.alloc_seq();
        self.entries.push(WaitEntry {
            seq,
            due: due.max(0.0),
            target_beat: Some(target_beat),
            cell,
        });
    }

    pub fn add_frame(&mut self, cell: Rc<WaitCell>) {
        self.frame_waiters.push(cell);
    }

    /// Earliest due time among live entries, if any.
    pub fn next_due(&self) -> Option<f64> {
        self.entries
            .iter()
            .filter(|e| !e.cell.is_settled())
            .map(|e| e.due)
            .fold(None, |min, due| match min {
                Some(m) if m <= due => Some(m),
                _ => Some(due),
            })
    }

    /// Fire every live entry at the earliest due instant, provided that
    /// instant is within `limit`. Entries sharing the instant fire in
    /// registration order. Returns the instant fired, or `None`.
    pub fn fire_next(&mut self, limit: f64) -> Option<f64> {
        let due = self.next_due()?;
        if due > limit + TIME_EPSILON {
            return None;
        }

        let mut batch: Vec<WaitEntry> = Vec::new();
        let mut remaining = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.cell.is_settled() {
                continue; // drop canceled entries
            }
            if (entry.due - due).abs() <= TIME_EPSILON {
                batch.push(entry);
            } else {
                remaining.push(entry);
            }
        }
        self.entries = remaining;

        batch.sort_by_key(|e| e.seq);
        self.set_now(due.max(0.0));
        for entry in batch {
            entry.cell.fire();
        }
        Some(due)
    }

    /// Wake every frame waiter registered so far. Waiters registered
    /// while waking land on the next tick.
    pub fn tick_frame(&mut self) {
        let waiters = mem::take(&mut self.frame_waiters);
        for cell in waiters {
            cell.fire();
        }
    }

    /// Re-derive beat-wait due times after a tempo change.
    pub fn retune(&mut self, tempo: &TempoMap) {
        for entry in &mut self.entries {
            if let Some(beat) = entry.target_beat {
                entry.due = tempo.time_at_beats(beat).max(0.0);
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| !e.cell.is_settled())
            || self.frame_waiters.iter().any(|c| !c.is_settled())
    }

    /// Drop entries whose waits have already settled.
    pub fn purge(&mut self) {
        self.entries.retain(|e| !e.cell.is_settled());
        self.frame_waiters.retain(|c| !c.is_settled());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_then_registration_order() {
        let mut sched = TimeScheduler::new();
        let a = WaitCell::new();
        let b = WaitCell::new();
        let c = WaitCell::new();
        sched.add_timed(2.0, a.clone());
        sched.add_timed(1.0, b.clone());
        sched.add_timed(1.0, c.clone());

        assert_eq!(sched.fire_next(10.0), Some(1.0));
        assert!(b.is_done() && c.is_done());
        assert!(!a.is_done());
        assert_eq!(sched.fire_next(10.0), Some(2.0));
        assert!(a.is_done());
        assert_eq!(sched.fire_next(10.0), None);
    }

    #[test]
    fn respects_the_limit() {
        let mut sched = TimeScheduler::new();
        let cell = WaitCell::new();
        sched.add_timed(5.0, cell.clone());
        assert_eq!(sched.fire_next(4.0), None);
        assert!(!cell.is_done());
        assert!(sched.has_pending());
    }

    #[test]
    fn canceled_entries_never_fire() {
        let mut sched = TimeScheduler::new();
        let cell = WaitCell::new();
        sched.add_timed(1.0, cell.clone());
        cell.on_cancel();
        assert_eq!(sched.fire_next(10.0), None);
        assert!(!cell.is_done());
        assert!(!sched.has_pending());
    }

    #[test]
    fn retune_moves_beat_waits() {
        let mut tempo = TempoMap::new(120.0);
        let mut sched = TimeScheduler::new();
        let cell = WaitCell::new();
        // 4 beats at 120 bpm come due at 2 s.
        sched.add_beat(4.0, tempo.time_at_beats(4.0), cell.clone());
        assert_eq!(sched.next_due(), Some(2.0));

        tempo.set_bpm_at_time(60.0, 0.0);
        sched.retune(&tempo);
        assert_eq!(sched.next_due(), Some(4.0));
    }

    #[test]
    fn frame_tick_wakes_current_waiters_only() {
        let mut sched = TimeScheduler::new();
        let cell = WaitCell::new();
        sched.add_frame(cell.clone());
        sched.tick_frame();
        assert!(cell.is_done());
        assert!(!sched.has_pending());
    }
}
