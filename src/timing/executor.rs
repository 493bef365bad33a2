//! Single-threaded cooperative task executor.
//!
//! Tasks are plain `!Send` futures driven by a FIFO run queue. Wakers
//! re-enqueue their task; `run_until_stalled` drains the queue until
//! every task is either finished or parked on a waker. There is no
//! thread pool and no reactor — the transport decides when to run.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::mem::ManuallyDrop;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

type TaskQueue = Rc<RefCell<VecDeque<Rc<Task>>>>;

struct Task {
    /// `None` once the future has completed.
    future: RefCell<Option<Pin<Box<dyn Future<Output = ()>>>>>,
    queue: TaskQueue,
    /// Guards against double-enqueueing on repeated wakes.
    queued: Cell<bool>,
}

impl Task {
    fn schedule(self: &Rc<Self>) {
        if self.queued.replace(true) {
            return;
        }
        self.queue.borrow_mut().push_back(self.clone());
    }
}

pub(crate) struct Executor {
    queue: TaskQueue,
}

impl Executor {
    pub fn new() -> Self {
        Self {
            queue: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Enqueue a future. It is not polled until the next run.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        let task = Rc::new(Task {
            future: RefCell::new(Some(Box::pin(future))),
            queue: self.queue.clone(),
            queued: Cell::new(false),
        });
        task.schedule();
    }

    /// Poll queued tasks until none are runnable.
    pub fn run_until_stalled(&self) {
        loop {
            let task = self.queue.borrow_mut().pop_front();
            let Some(task) = task else {
                break;
            };
            task.queued.set(false);

            let waker = task_waker(task.clone());
            let mut cx = Context::from_waker(&waker);
            let mut slot = task.future.borrow_mut();
            if let Some(future) = slot.as_mut() {
                if future.as_mut().poll(&mut cx).is_ready() {
                    *slot = None;
                }
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

// Rc-backed waker. The whole engine is single-threaded; wakers never
// leave this thread, so the Send-free Rc is sound here.

static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, wake_raw, wake_by_ref_raw, drop_raw);

fn task_waker(task: Rc<Task>) -> Waker {
    unsafe { Waker::from_raw(raw_waker(task)) }
}

fn raw_waker(task: Rc<Task>) -> RawWaker {
    RawWaker::new(Rc::into_raw(task) as *const (), &VTABLE)
}

unsafe fn clone_raw(ptr: *const ()) -> RawWaker {
    let task = ManuallyDrop::new(Rc::from_raw(ptr as *const Task));
    raw_waker(Rc::clone(&task))
}

unsafe fn wake_raw(ptr: *const ()) {
    let task = Rc::from_raw(ptr as *const Task);
    task.schedule();
}

unsafe fn wake_by_ref_raw(ptr: *const ()) {
    let task = ManuallyDrop::new(Rc::from_raw(ptr as *const Task));
    task.schedule();
}

unsafe fn drop_raw(ptr: *const ()) {
    drop(Rc::from_raw(ptr as *const Task));
}
