//! Time contexts: the user-facing scheduling primitive.
//!
//! A `TimeContext` is a scope with its own local clock origin and
//! cancellation token. Code inside a scope suspends with `wait` /
//! `wait_sec` / `wait_frame` and spawns child scopes with `branch` /
//! `branch_wait`. Canceling a scope cancels its whole subtree, once.
//!
//! Scheduling is cooperative and single-threaded: "concurrent" branches
//! interleave at suspension points, driven by the owning transport.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use crate::timing::cancel::{CancelNotify, CancelToken, Canceled};
use crate::timing::executor::Executor;
use crate::timing::handle::{BranchWait, JoinState, TaskHandle};
use crate::timing::scheduler::{TimeScheduler, WaitCell};
use crate::timing::tempo::TempoMap;

static CTX_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_ctx_id() -> u64 {
    CTX_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

pub(crate) struct ContextInner {
    id: u64,
    start_time: f64,
    time: Cell<f64>,
    token: CancelToken,
    scheduler: Rc<RefCell<TimeScheduler>>,
    executor: Rc<Executor>,
    tempo: Rc<RefCell<TempoMap>>,
}

/// A scheduling scope. Cheap to clone; clones share the same scope.
pub struct TimeContext {
    inner: Rc<ContextInner>,
}

impl Clone for TimeContext {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl TimeContext {
    pub(crate) fn new_root(
        scheduler: Rc<RefCell<TimeScheduler>>,
        executor: Rc<Executor>,
        tempo: Rc<RefCell<TempoMap>>,
    ) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                id: next_ctx_id(),
                start_time: 0.0,
                time: Cell::new(0.0),
                token: CancelToken::new(),
                scheduler,
                executor,
                tempo,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Absolute logical time of this scope, in seconds.
    pub fn time(&self) -> f64 {
        self.inner.time.get()
    }

    pub(crate) fn set_time(&self, t: f64) {
        self.inner.time.set(t);
    }

    /// When this scope began, in absolute seconds.
    pub fn start_time(&self) -> f64 {
        self.inner.start_time
    }

    /// Seconds elapsed since this scope began.
    pub fn prog_time(&self) -> f64 {
        self.time() - self.inner.start_time
    }

    /// Absolute beat position of this scope.
    pub fn beats(&self) -> f64 {
        self.inner.tempo.borrow().beats_at_time(self.time())
    }

    /// Beats elapsed since this scope began.
    pub fn prog_beats(&self) -> f64 {
        let tempo = self.inner.tempo.borrow();
        tempo.beats_at_time(self.time()) - tempo.beats_at_time(self.inner.start_time)
    }

    pub fn bpm(&self) -> f64 {
        self.inner.tempo.borrow().bpm_at_time(self.time())
    }

    /// Change the shared tempo from the transport's current logical time
    /// onward. Pending beat waits reschedule to honor the new tempo.
    pub fn set_bpm(&self, bpm: f64) {
        let at = {
            let sched = self.inner.scheduler.borrow();
            sched.horizon().max(sched.now())
        };
        self.inner.tempo.borrow_mut().set_bpm_at_time(bpm, at);
        let tempo = self.inner.tempo.borrow();
        self.inner.scheduler.borrow_mut().retune(&tempo);
    }

    pub fn token(&self) -> &CancelToken {
        &self.inner.token
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.token.is_canceled()
    }

    /// Cancel this scope and every scope branched from it, exactly once.
    pub fn cancel(&self) {
        if !self.is_canceled() {
            log::debug!("canceling scope {}", self.inner.id);
        }
        self.inner.token.cancel();
    }

    /// Suspend for `beats` beats. Non-positive and non-finite durations
    /// become a sync point that resolves on the next scheduling step.
    pub fn wait(&self, beats: f64) -> WaitFuture {
        let delta = if beats.is_finite() { beats } else { 0.0 };
        let base = self.wait_base();
        if delta <= 0.0 {
            return WaitFuture::new(self.clone(), WaitKind::Timed { due: base });
        }
        let (target_beat, due) = {
            let tempo = self.inner.tempo.borrow();
            let target_beat = tempo.beats_at_time(base) + delta;
            (target_beat, tempo.time_at_beats(target_beat))
        };
        WaitFuture::new(self.clone(), WaitKind::Beat { target_beat, due })
    }

    /// Suspend for `sec` seconds, independent of tempo.
    pub fn wait_sec(&self, sec: f64) -> WaitFuture {
        let delta = if sec.is_finite() && sec > 0.0 { sec } else { 0.0 };
        let due = self.wait_base() + delta;
        WaitFuture::new(self.clone(), WaitKind::Timed { due })
    }

    /// Suspend until the next transport tick. Useful as back-pressure
    /// when no explicit duration is known.
    pub fn wait_frame(&self) -> WaitFuture {
        WaitFuture::new(self.clone(), WaitKind::Frame)
    }

    fn wait_base(&self) -> f64 {
        self.inner.scheduler.borrow().horizon().max(self.time())
    }

    /// Spawn a child scope running `body` concurrently and return its
    /// handle immediately. The child starts at the current logical time
    /// of the schedule and is canceled whenever this scope is. The
    /// caller's own continuation runs before the child's first step.
    pub fn branch<T, F, Fut>(&self, body: F) -> TaskHandle<T>
    where
        T: 'static,
        F: FnOnce(TimeContext) -> Fut,
        Fut: Future<Output = T> + 'static,
    {
        let start = self.wait_base();
        self.spawn_child(start, body)
    }

    /// Like [`branch`](Self::branch), but the returned future also
    /// suspends this scope until the child finishes; the child starts at
    /// this scope's own time and its end time folds back into it.
    pub fn branch_wait<T, F, Fut>(&self, body: F) -> BranchWait<T>
    where
        T: 'static,
        F: FnOnce(TimeContext) -> Fut,
        Fut: Future<Output = T> + 'static,
    {
        let handle = self.spawn_child(self.time(), body);
        BranchWait::new(self.clone(), handle)
    }

    fn spawn_child<T, F, Fut>(&self, start_time: f64, body: F) -> TaskHandle<T>
    where
        T: 'static,
        F: FnOnce(TimeContext) -> Fut,
        Fut: Future<Output = T> + 'static,
    {
        assert!(
            !self.is_canceled(),
            "cannot branch from a canceled scope (id {})",
            self.inner.id
        );

        let child = TimeContext {
            inner: Rc::new(ContextInner {
                id: next_ctx_id(),
                start_time,
                time: Cell::new(start_time),
                token: self.inner.token.child(),
                scheduler: self.inner.scheduler.clone(),
                executor: self.inner.executor.clone(),
                tempo: self.inner.tempo.clone(),
            }),
        };

        let join = Rc::new(JoinState::new());
        child
            .inner
            .token
            .watch(Rc::downgrade(&join) as Weak<dyn CancelNotify>);
        let handle = TaskHandle::new(child.clone(), join.clone());

        let future = body(child);
        self.inner.executor.spawn(async move {
            let value = future.await;
            join.complete(value);
        });
        handle
    }
}

enum WaitKind {
    Timed { due: f64 },
    Beat { target_beat: f64, due: f64 },
    Frame,
}

/// A pending suspension. Resolves `Ok(())` when its time arrives, or
/// `Err(Canceled)` if the scope is canceled first — in which case the
/// caller must not act as if the time had elapsed.
pub struct WaitFuture {
    ctx: TimeContext,
    kind: WaitKind,
    cell: Rc<WaitCell>,
    registered: bool,
}

impl WaitFuture {
    fn new(ctx: TimeContext, kind: WaitKind) -> Self {
        Self {
            ctx,
            kind,
            cell: WaitCell::new(),
            registered: false,
        }
    }

    fn resume_time(&self) -> f64 {
        match &self.kind {
            WaitKind::Timed { due } => *due,
            // Re-derive from the tempo map so waits that were retuned by
            // a tempo change resume at the right instant.
            WaitKind::Beat { target_beat, .. } => {
                self.ctx.inner.tempo.borrow().time_at_beats(*target_beat)
            }
            WaitKind::Frame => self.ctx.inner.scheduler.borrow().now(),
        }
    }
}

impl Future for WaitFuture {
    type Output = Result<(), Canceled>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.cell.is_canceled() || this.ctx.is_canceled() {
            return Poll::Ready(Err(Canceled));
        }

        if this.cell.is_done() {
            let resumed = this.resume_time().max(this.ctx.time());
            this.ctx.set_time(resumed);
            this.ctx.inner.scheduler.borrow_mut().bump_horizon(resumed);
            return Poll::Ready(Ok(()));
        }

        if !this.registered {
            this.ctx
                .inner
                .token
                .watch(Rc::downgrade(&this.cell) as Weak<dyn CancelNotify>);
            let mut sched = this.ctx.inner.scheduler.borrow_mut();
            match &this.kind {
                WaitKind::Timed { due } => sched.add_timed(*due, this.cell.clone()),
                WaitKind::Beat { target_beat, due } => {
                    sched.add_beat(*target_beat, *due, this.cell.clone())
                }
                WaitKind::Frame => sched.add_frame(this.cell.clone()),
            }
            this.registered = true;
        }

        this.cell.set_waker(cx.waker());
        Poll::Pending
    }
}
