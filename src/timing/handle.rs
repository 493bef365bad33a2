//! Task handles: the cancelable, awaitable side of a branch.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::timing::cancel::{CancelNotify, Canceled};
use crate::timing::context::TimeContext;

/// Completion state shared between a spawned task and its handle(s).
pub(crate) struct JoinState<T> {
    value: RefCell<Option<T>>,
    done: Cell<bool>,
    canceled: Cell<bool>,
    wakers: RefCell<Vec<Waker>>,
}

impl<T> JoinState<T> {
    pub fn new() -> Self {
        Self {
            value: RefCell::new(None),
            done: Cell::new(false),
            canceled: Cell::new(false),
            wakers: RefCell::new(Vec::new()),
        }
    }

    /// Record the task's result. A result arriving after cancellation is
    /// discarded — the handle keeps reporting canceled.
    pub fn complete(&self, value: T) {
        if self.canceled.get() {
            self.wake_all();
            return;
        }
        *self.value.borrow_mut() = Some(value);
        self.done.set(true);
        self.wake_all();
    }

    fn wake_all(&self) {
        for waker in self.wakers.borrow_mut().drain(..) {
            waker.wake();
        }
    }
}

impl<T> CancelNotify for JoinState<T> {
    fn on_cancel(&self) {
        if self.done.get() || self.canceled.replace(true) {
            return;
        }
        self.wake_all();
    }

    fn is_settled(&self) -> bool {
        self.done.get() || self.canceled.get()
    }
}

/// Handle to a branched task. Canceling it tears down the whole subtree
/// rooted at the branch; awaiting it yields the task's result, or
/// `Err(Canceled)` if the subtree was canceled first.
///
/// The result can be consumed by exactly one awaiter; a second await
/// after the value was taken is a programmer error and panics.
pub struct TaskHandle<T> {
    ctx: TimeContext,
    join: Rc<JoinState<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            join: self.join.clone(),
        }
    }
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(ctx: TimeContext, join: Rc<JoinState<T>>) -> Self {
        Self { ctx, join }
    }

    /// The branched scope this handle governs.
    pub fn context(&self) -> &TimeContext {
        &self.ctx
    }

    /// Cancel the branch and everything it spawned. Idempotent.
    pub fn cancel(&self) {
        self.ctx.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.ctx.is_canceled()
    }

    /// Whether the task has settled (completed or been canceled).
    pub fn is_settled(&self) -> bool {
        self.join.is_settled()
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, Canceled>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(value) = this.join.value.borrow_mut().take() {
            return Poll::Ready(Ok(value));
        }
        if this.join.canceled.get() {
            return Poll::Ready(Err(Canceled));
        }
        if this.join.done.get() {
            panic!("task result already consumed");
        }
        this.join.wakers.borrow_mut().push(cx.waker().clone());
        Poll::Pending
    }
}

/// Future returned by [`TimeContext::branch_wait`]: suspends the caller
/// until the child completes or is canceled, then folds the child's
/// final time back into the parent.
pub struct BranchWait<T> {
    parent: TimeContext,
    handle: TaskHandle<T>,
}

impl<T> BranchWait<T> {
    pub(crate) fn new(parent: TimeContext, handle: TaskHandle<T>) -> Self {
        Self { parent, handle }
    }

    /// A handle for canceling the child independently of the await.
    pub fn handle(&self) -> TaskHandle<T> {
        self.handle.clone()
    }
}

impl<T> Future for BranchWait<T> {
    type Output = Result<T, Canceled>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.handle).poll(cx) {
            Poll::Ready(Ok(value)) => {
                let end = this.handle.ctx.time().max(this.parent.time());
                this.parent.set_time(end);
                Poll::Ready(Ok(value))
            }
            other => other,
        }
    }
}
