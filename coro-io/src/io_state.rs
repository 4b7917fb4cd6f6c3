//! Per-coroutine suspension state.
//!
//! The original source tracks a waiting coroutine with three untyped
//! `tb_cpointer_t` slots on `tb_coroutine_t` (an event handle, a timer
//! handle, and a "which one fired" flag), interpreted differently depending
//! on whether the coroutine called `wait`, `sleep`, or neither. That shape
//! doesn't carry its own invariants in Rust — nothing stops two of the three
//! slots from being set inconsistently. `IoState` replaces it with a single
//! tagged enum: a coroutine is in exactly one of these states at a time, and
//! the type system (not a caller's discipline) rules out the invalid
//! combinations I1 rules out by fiat in the original.

use crate::driver::PollToken;
use crate::time::TimerHandle;

/// What a coroutine is currently doing, from the scheduler's point of view.
#[derive(Debug, Clone, Copy)]
pub(crate) enum IoState {
    /// Not suspended on I/O or a timer.
    Idle,
    /// Suspended in [`crate::sleep::sleep`], parked on `handle`.
    Sleeping { handle: TimerHandle, high_precision: bool },
    /// Suspended in [`crate::wait::wait`] on readiness alone.
    WaitingIo { token: PollToken },
    /// Suspended in [`crate::wait::wait`] with a timeout: both a poller
    /// registration and a timer are armed, and whichever fires first wins
    /// (O1). The loser is cancelled through the companion slot still
    /// recorded here, never left dangling (I2).
    WaitingIoWithTimeout {
        token: PollToken,
        timer: TimerHandle,
        high_precision: bool,
    },
}

impl IoState {
    /// `true` once the coroutine has no outstanding registration at all —
    /// the state I1 requires before a coroutine may suspend again.
    pub(crate) fn is_idle(&self) -> bool {
        matches!(self, IoState::Idle)
    }
}
