//! Two timer wheels: a high-precision, millisecond-tick wheel for short or
//! oddly-aligned delays, and a cheaper second-tick wheel for everything that
//! sleeps in whole seconds.
//!
//! Grounded on the original source's `tb_co_scheduler_io_sleep`, which picks
//! between `scheduler_io->timer` (millisecond ticks) and `->ltimer`
//! (second ticks, `TB_LTIMER_TICK_S`) by checking whether the requested
//! interval is a whole number of seconds. The sizing constants below
//! (`TIMER_GROW`/`LTIMER_GROW`) are carried over unchanged from that source;
//! here they size the initial capacity hint on each wheel's backing
//! [`crate::util::slab::Slab`] rather than a C array growth step, but the
//! same small/normal profile split applies.

mod clock;
mod wheel;

pub(crate) use clock::Clock;
pub(crate) use wheel::{TimerHandle, TimingWheel};

use std::time::Duration;

/// Initial slab capacity hint for the low-precision (second-tick) wheel on
/// an ordinary build.
pub(crate) const LTIMER_GROW: usize = 4096;
/// Initial slab capacity hint for the low-precision wheel on a
/// size-constrained build (see [`crate::scheduler::SchedulerBuilder::small_profile`]).
pub(crate) const LTIMER_GROW_SMALL: usize = 64;
/// Initial slab capacity hint for the high-precision (millisecond-tick)
/// wheel; a fixed fraction of the low-precision one, same ratio the
/// original source uses (`LTIMER_GROW >> 4`).
pub(crate) const TIMER_GROW: usize = LTIMER_GROW >> 4;
pub(crate) const TIMER_GROW_SMALL: usize = LTIMER_GROW_SMALL >> 4;

const HIGH_PRECISION_TICK: Duration = Duration::from_millis(1);
const LOW_PRECISION_TICK: Duration = Duration::from_secs(1);

/// Returns `true` if a sleep/wait timeout of `interval` belongs on the
/// high-precision wheel: anything that is not a whole number of seconds.
/// Mirrors the original source's selection rule (`interval_ms % 1000 != 0`).
pub(crate) fn needs_high_precision(interval: Duration) -> bool {
    interval.subsec_nanos() != 0
}

pub(crate) fn new_high_precision_wheel(start: std::time::Instant) -> TimingWheel {
    TimingWheel::new(HIGH_PRECISION_TICK, start)
}

pub(crate) fn new_low_precision_wheel(start: std::time::Instant) -> TimingWheel {
    TimingWheel::new(LOW_PRECISION_TICK, start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_second_intervals_use_low_precision() {
        assert!(!needs_high_precision(Duration::from_secs(3)));
        assert!(!needs_high_precision(Duration::from_secs(0)));
    }

    #[test]
    fn sub_second_or_misaligned_intervals_use_high_precision() {
        assert!(needs_high_precision(Duration::from_millis(1500)));
        assert!(needs_high_precision(Duration::from_millis(10)));
        assert!(needs_high_precision(Duration::from_micros(2_000_500)));
    }
}
