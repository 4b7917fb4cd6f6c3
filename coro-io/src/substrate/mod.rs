//! The coroutine substrate: a minimal single-threaded executor.
//!
//! Stack switching, the ready queue, and `yield`/`suspend`/`resume` are
//! treated as the scheduler core's collaborator rather than its concern. In
//! this port the substrate is realized as a small `Future` executor,
//! grounded on `monoio`'s own `scheduler::{LocalScheduler, TaskQueue}` and
//! `task` modules: a "coroutine" is any `Future`, "suspend" is returning
//! `Poll::Pending`, and "resume" is the task's `Waker` firing, which
//! re-enqueues its index on the ready queue.
//!
//! Unlike `monoio`'s task system (which hand-rolls a ref-counted raw vtable
//! per task purely for allocation-count reasons), this executor stores each
//! task as a boxed closure behind `Rc<RefCell<Option<_>>>` in a [`Slab`].
//! That is a deliberate simplification: this crate's budget is the
//! scheduler core, not a maximally-optimized task allocator, and the boxed
//! closure keeps the whole thing free of `unsafe` except in the waker itself
//! (see [`waker`]), where there genuinely is no safe alternative.

mod join;
mod waker;

pub use join::JoinHandle;

use std::{
    cell::RefCell,
    future::Future,
    rc::Rc,
    task::{Context, Poll},
};

use crate::util::slab::Slab;

type TaskCell = Rc<RefCell<Option<Box<dyn FnMut(&mut Context<'_>) -> bool>>>>;

pub(crate) struct Inner {
    tasks: RefCell<Slab<TaskCell>>,
    ready: RefCell<std::collections::VecDeque<usize>>,
}

/// A handle to the ready queue and task table of one [`crate::Runtime`].
///
/// Cloning an `Executor` is cheap (it is a reference-counted handle to the
/// same underlying task table); all clones refer to the same substrate.
#[derive(Clone)]
pub struct Executor {
    pub(crate) inner: Rc<Inner>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// Creates a substrate with an empty ready queue and no tasks.
    pub fn new() -> Self {
        Executor {
            inner: Rc::new(Inner {
                tasks: RefCell::new(Slab::new()),
                ready: RefCell::new(std::collections::VecDeque::new()),
            }),
        }
    }

    /// Spawns `fut` as a new coroutine, scheduling it to run on the next
    /// drain. Returns a [`JoinHandle`] that resolves to its output.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let (handle, mut set_output) = JoinHandle::new_pair();
        let mut fut = Box::pin(fut);
        let poll_fn = move |cx: &mut Context<'_>| -> bool {
            match fut.as_mut().poll(cx) {
                Poll::Ready(v) => {
                    set_output(v);
                    true
                }
                Poll::Pending => false,
            }
        };
        let cell: TaskCell = Rc::new(RefCell::new(Some(Box::new(poll_fn))));
        let idx = self.inner.tasks.borrow_mut().insert(cell);
        self.inner.ready.borrow_mut().push_back(idx);
        handle
    }

    /// Runs exactly one runnable coroutine to its next suspension point (or
    /// to completion), mirroring `tb_co_scheduler_yield`: returns `false`
    /// without doing anything if the ready queue is currently empty.
    ///
    /// Cloning the task cell out of the slab before polling (rather than
    /// holding the slab borrow across the poll) is what lets a coroutine
    /// call [`Executor::spawn`] on itself from within its own poll —
    /// otherwise the nested `tasks.borrow_mut()` would panic against the
    /// outer `tasks.borrow()`.
    pub fn run_one_ready(&self) -> bool {
        let idx = match self.inner.ready.borrow_mut().pop_front() {
            Some(idx) => idx,
            None => return false,
        };
        let cell = {
            let tasks = self.inner.tasks.borrow();
            match tasks.get(idx) {
                Some(cell) => cell.clone(),
                None => return true,
            }
        };
        let waker = waker::task_waker(&self.inner, idx);
        let mut cx = Context::from_waker(&waker);
        let done = match cell.borrow_mut().as_mut() {
            Some(poll_fn) => poll_fn(&mut cx),
            None => return true,
        };
        if done {
            self.inner.tasks.borrow_mut().try_remove(idx);
        }
        true
    }

    /// Number of coroutines currently in the ready queue.
    pub fn ready_len(&self) -> usize {
        self.inner.ready.borrow().len()
    }

    /// Number of coroutines that exist but are not currently runnable —
    /// i.e. suspended on I/O readiness or a timer.
    pub fn suspended_count(&self) -> usize {
        self.inner
            .tasks
            .borrow()
            .len()
            .saturating_sub(self.ready_len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn run_one_ready_drains_fifo() {
        let exec = Executor::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            exec.spawn(async move {
                order.borrow_mut().push(i);
            });
        }
        while exec.run_one_ready() {}
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn suspended_count_tracks_pending_futures() {
        let exec = Executor::new();
        let gate = Rc::new(Cell::new(false));
        let waker_slot: Rc<RefCell<Option<std::task::Waker>>> = Rc::new(RefCell::new(None));
        let gate2 = gate.clone();
        let waker_slot2 = waker_slot.clone();
        exec.spawn(async move {
            std::future::poll_fn(|cx| {
                if gate2.get() {
                    Poll::Ready(())
                } else {
                    *waker_slot2.borrow_mut() = Some(cx.waker().clone());
                    Poll::Pending
                }
            })
            .await;
        });

        // One poll parks the task without re-waking it: it is suspended,
        // not runnable.
        exec.run_one_ready();
        assert_eq!(exec.ready_len(), 0);
        assert_eq!(exec.suspended_count(), 1);

        // Flip the gate and wake it ourselves, as a real completion
        // callback would.
        gate.set(true);
        waker_slot.borrow_mut().take().unwrap().wake();
        while exec.run_one_ready() {}
        assert_eq!(exec.suspended_count(), 0);
    }
}
