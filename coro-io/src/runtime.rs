//! The single-threaded runtime that drives an [`IoScheduler`] and a
//! coroutine [`Executor`] together.
//!
//! Grounded on `monoio`'s `Runtime::block_on`: spawn the root future, then
//! loop running every ready task before touching the poller at all (`monoio`
//! calls this the hot path), only blocking on I/O once the ready queue is
//! genuinely empty. Mirrors `tb_co_scheduler_io_loop`'s own structure at the
//! scheduler level (drain ready coroutines, `timer_spak`, then
//! `poller_wait`), just expressed as a `Future` executor instead of a
//! bespoke coroutine dispatch loop.

use std::{future::Future, io, rc::Rc};

use crate::scheduler::IoScheduler;
use crate::substrate::{Executor, JoinHandle};

scoped_thread_local!(static CURRENT: RuntimeContext);

pub(crate) struct RuntimeContext {
    pub(crate) executor: Executor,
    pub(crate) scheduler: Rc<IoScheduler>,
}

/// Returns the [`IoScheduler`] of the [`Runtime`] currently driving this
/// thread.
///
/// # Panics
///
/// Panics if called outside [`Runtime::block_on`].
pub(crate) fn current_scheduler() -> Rc<IoScheduler> {
    CURRENT.with(|ctx| ctx.scheduler.clone())
}

fn current_executor() -> Executor {
    CURRENT.with(|ctx| ctx.executor.clone())
}

/// Spawns `fut` onto the currently running [`Runtime`], returning a
/// [`JoinHandle`] for its output.
///
/// # Panics
///
/// Panics if called outside [`Runtime::block_on`].
pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    current_executor().spawn(fut)
}

/// A single-threaded runtime: one coroutine substrate, one I/O scheduler.
pub struct Runtime {
    executor: Executor,
    scheduler: Rc<IoScheduler>,
}

impl Runtime {
    /// Builds a runtime with default capacity settings. See
    /// [`crate::scheduler::SchedulerBuilder`] to customize the poller and
    /// timer sizing.
    pub fn new() -> io::Result<Self> {
        Ok(Runtime {
            executor: Executor::new(),
            scheduler: Rc::new(IoScheduler::new()?),
        })
    }

    /// Builds a runtime around an already-constructed scheduler.
    pub fn with_scheduler(scheduler: IoScheduler) -> Self {
        Runtime {
            executor: Executor::new(),
            scheduler: Rc::new(scheduler),
        }
    }

    /// A handle to this runtime's scheduler, for calling [`IoScheduler::kill`]
    /// from outside the running future (e.g. from a signal handler driven by
    /// a different part of the same thread).
    pub fn scheduler(&self) -> Rc<IoScheduler> {
        self.scheduler.clone()
    }

    /// Runs `root` to completion, driving the coroutine substrate and the
    /// I/O scheduler together on the current thread.
    ///
    /// Each iteration: drain every runnable coroutine first (the hot path —
    /// no syscalls), then, only if coroutines are left suspended with
    /// nothing runnable, block on the scheduler for up to its next timer
    /// deadline (or indefinitely if none is armed) and dispatch whatever
    /// that unblocks.
    pub fn block_on<F>(&self, root: F) -> F::Output
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        assert!(!CURRENT.is_set(), "cannot start a runtime inside a runtime");

        let ctx = RuntimeContext {
            executor: self.executor.clone(),
            scheduler: self.scheduler.clone(),
        };

        CURRENT.set(&ctx, || {
            let handle = self.executor.spawn(root);

            loop {
                // Hot path: drain every runnable coroutine before touching
                // the poller at all. `Executor::spawn`'s wrapped future
                // stashes its output in `handle` as soon as it resolves, so
                // a `try_take` after this loop sees it with no extra poll.
                //
                // A timer due mid-drain must still fire before the drain
                // empties, not just once the whole batch is done — a
                // coroutine woken by one due timer can itself queue work a
                // sibling is waiting on. So each yield is followed by an
                // `advance`, same as the original driver loop's
                // yield-then-`timer_spak` ordering.
                while self.executor.run_one_ready() {
                    self.scheduler.advance();
                }

                if let Some(output) = handle.try_take() {
                    return output;
                }

                if self.scheduler.suspended_count() == 0 && self.executor.ready_len() == 0 {
                    unreachable!(
                        "root future suspended with no pending I/O, timer, or ready coroutine"
                    );
                }

                let timeout = self.scheduler.next_delay();
                sched_trace!(?timeout, "driver loop blocking in poller.wait");
                self.scheduler
                    .drive(timeout)
                    .expect("I/O scheduler poll failed");
            }
        })
    }
}
