//! Cancellation tokens.
//!
//! A `CancelToken` is a shared monotonic flag: once tripped it stays
//! tripped. Tokens form a tree — canceling a token notifies everything
//! watching it and cascades to every dependent token exactly once.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Control outcome of a wait or task that was canceled before finishing.
///
/// Not a failure: callers use it to skip post-wait side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canceled;

impl fmt::Display for Canceled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope canceled")
    }
}

impl std::error::Error for Canceled {}

/// Something that wants to hear about cancellation once (a pending wait,
/// a join waiting on a task).
pub(crate) trait CancelNotify {
    fn on_cancel(&self);
    /// Already done or canceled; used to purge stale watchers.
    fn is_settled(&self) -> bool;
}

struct TokenInner {
    canceled: Cell<bool>,
    dependents: RefCell<Vec<Weak<TokenInner>>>,
    watchers: RefCell<Vec<Weak<dyn CancelNotify>>>,
}

/// Shared cancellation flag with downward propagation.
pub struct CancelToken {
    inner: Rc<TokenInner>,
}

impl Clone for CancelToken {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TokenInner {
                canceled: Cell::new(false),
                dependents: RefCell::new(Vec::new()),
                watchers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Create a dependent token that cancels whenever this one does.
    /// A child of an already-canceled token starts out canceled.
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        if self.is_canceled() {
            child.cancel();
        } else {
            self.inner
                .dependents
                .borrow_mut()
                .push(Rc::downgrade(&child.inner));
        }
        child
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.get()
    }

    /// Trip the flag, notify watchers, cascade to dependents.
    /// Idempotent: the second and later calls are no-ops.
    pub fn cancel(&self) {
        if self.inner.canceled.replace(true) {
            return;
        }

        let watchers = std::mem::take(&mut *self.inner.watchers.borrow_mut());
        for watcher in watchers {
            if let Some(watcher) = watcher.upgrade() {
                watcher.on_cancel();
            }
        }

        let dependents = std::mem::take(&mut *self.inner.dependents.borrow_mut());
        for dependent in dependents {
            if let Some(inner) = dependent.upgrade() {
                CancelToken { inner }.cancel();
            }
        }
    }

    /// Register a watcher to be notified once on cancellation. If the
    /// token is already canceled the watcher is notified immediately.
    pub(crate) fn watch(&self, watcher: Weak<dyn CancelNotify>) {
        if self.is_canceled() {
            if let Some(watcher) = watcher.upgrade() {
                watcher.on_cancel();
            }
            return;
        }
        let mut watchers = self.inner.watchers.borrow_mut();
        watchers.retain(|w| w.upgrade().is_some_and(|w| !w.is_settled()));
        watchers.push(watcher);
    }
}
