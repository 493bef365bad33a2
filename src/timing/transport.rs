//! The transport: owns the executor, scheduler, and tempo map, and
//! drives them from either a deterministic offline clock or a live one.
//!
//! Offline driving (`advance_to` / `advance_by` / `advance_beats`) moves
//! time only when asked, firing due waits in order and running tasks in
//! between — the same program stepped the same way replays identically.
//! Live driving (`run_live`) polls a [`Clock`] and sleeps between
//! deadlines. Frame waiters tick once per advance/loop iteration.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use crate::timing::clock::Clock;
use crate::timing::context::TimeContext;
use crate::timing::executor::Executor;
use crate::timing::handle::TaskHandle;
use crate::timing::scheduler::TimeScheduler;
use crate::timing::tempo::TempoMap;

pub struct Transport {
    executor: Rc<Executor>,
    scheduler: Rc<RefCell<TimeScheduler>>,
    tempo: Rc<RefCell<TempoMap>>,
    root: TimeContext,
}

impl Transport {
    pub fn new(bpm: f64) -> Self {
        let executor = Rc::new(Executor::new());
        let scheduler = Rc::new(RefCell::new(TimeScheduler::new()));
        let tempo = Rc::new(RefCell::new(TempoMap::new(bpm)));
        let root = TimeContext::new_root(scheduler.clone(), executor.clone(), tempo.clone());
        Self {
            executor,
            scheduler,
            tempo,
            root,
        }
    }

    /// The root scope. Branch from it, or hand it to playback drivers.
    pub fn context(&self) -> &TimeContext {
        &self.root
    }

    /// Spawn a task as a child of the root scope.
    pub fn spawn<T, F, Fut>(&self, body: F) -> TaskHandle<T>
    where
        T: 'static,
        F: FnOnce(TimeContext) -> Fut,
        Fut: Future<Output = T> + 'static,
    {
        self.root.branch(body)
    }

    /// Current transport time in seconds.
    pub fn now(&self) -> f64 {
        self.scheduler.borrow().now()
    }

    /// Current transport position in beats.
    pub fn beats(&self) -> f64 {
        self.tempo.borrow().beats_at_time(self.now())
    }

    pub fn bpm(&self) -> f64 {
        self.tempo.borrow().bpm_at_time(self.now())
    }

    pub fn set_bpm(&self, bpm: f64) {
        self.root.set_bpm(bpm);
    }

    /// Cancel the root scope and, with it, every task ever spawned.
    pub fn cancel_all(&self) {
        self.root.cancel();
    }

    /// No runnable tasks and no pending waits.
    pub fn is_idle(&self) -> bool {
        self.executor.is_idle() && !self.scheduler.borrow().has_pending()
    }

    /// Advance the clock to `target` seconds: fire every due wait in
    /// (time, registration) order, interleaving task execution, then
    /// tick frame waiters once. Deterministic.
    pub fn advance_to(&self, target: f64) {
        log::trace!("advance to {target}");
        self.executor.run_until_stalled();
        loop {
            let fired = self.scheduler.borrow_mut().fire_next(target);
            if fired.is_none() {
                break;
            }
            self.executor.run_until_stalled();
        }
        {
            let mut sched = self.scheduler.borrow_mut();
            sched.set_now(target);
            sched.tick_frame();
            sched.purge();
        }
        self.executor.run_until_stalled();
    }

    /// Advance by `sec` seconds (negative amounts are ignored).
    pub fn advance_by(&self, sec: f64) {
        self.advance_to(self.now() + sec.max(0.0));
    }

    /// Advance by `beats` beats at the current tempo map.
    pub fn advance_beats(&self, beats: f64) {
        let target = {
            let tempo = self.tempo.borrow();
            tempo.time_at_beats(tempo.beats_at_time(self.now()) + beats.max(0.0))
        };
        self.advance_to(target);
    }

    /// Keep firing timed waits until everything settles or the next due
    /// time would pass `limit_sec`. Scopes that only ever frame-wait are
    /// a live-mode construct and are not driven to completion here.
    pub fn run_until_idle(&self, limit_sec: f64) {
        self.executor.run_until_stalled();
        while !self.is_idle() {
            let next = self.scheduler.borrow().next_due();
            match next {
                Some(due) if due <= limit_sec => self.advance_to(due),
                _ => break,
            }
        }
    }

    /// Drive tasks against a real clock until everything settles.
    /// `frame_hz` bounds how often frame waiters tick (and how long the
    /// loop sleeps when nothing is due sooner).
    pub fn run_live<C: Clock>(&self, clock: &C, frame_hz: f64) {
        let frame_len = if frame_hz > 0.0 { 1.0 / frame_hz } else { 1.0 / 120.0 };
        self.executor.run_until_stalled();
        while !self.is_idle() {
            let now = clock.now();
            self.advance_to(now);
            if self.is_idle() {
                break;
            }
            let wake_at = match self.scheduler.borrow().next_due() {
                Some(due) => due.min(now + frame_len),
                None => now + frame_len,
            };
            let sleep = wake_at - clock.now();
            if sleep > 0.0 {
                std::thread::sleep(Duration::from_secs_f64(sleep));
            }
        }
    }
}
