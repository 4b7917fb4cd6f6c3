//! Suspending a coroutine for a fixed interval.
//!
//! Grounded on `tb_co_scheduler_io_sleep`: post a one-shot task to whichever
//! timer fits the interval, then suspend. Unlike a timed [`crate::wait`],
//! there is no companion registration to race against — just the one timer.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use crate::io_state::IoState;
use crate::runtime::current_scheduler;

/// Suspends the current coroutine for `duration`.
///
/// Must be called from within a running [`crate::Runtime`].
pub fn sleep(duration: Duration) -> Sleep {
    Sleep {
        duration,
        state: IoState::Idle,
    }
}

/// Future returned by [`sleep`].
pub struct Sleep {
    duration: Duration,
    state: IoState,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let scheduler = current_scheduler();

        if this.state.is_idle() {
            this.state = scheduler.start_sleep(this.duration);
        }

        if scheduler.poll_sleep(&this.state, cx) {
            this.state = IoState::Idle;
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if !self.state.is_idle() {
            current_scheduler().cancel_sleep(self.state);
        }
    }
}
