//! Internal utilities shared across the crate.

/// Scheduler-lifecycle / driver-loop tracing, gated behind the `trace`
/// feature so a build without it pays nothing — not even the `tracing`
/// dependency, which is `optional = true` and only pulled in by this
/// feature. Mirrors the density of the original source's `tb_trace_d`
/// calls at scheduler init/kill and wheel-selection sites.
macro_rules! sched_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "trace")]
        { tracing::trace!($($arg)*); }
    };
}

/// As [`sched_trace`], at `debug` level — driver-loop iteration boundaries
/// and scheduler lifecycle transitions (`tb_trace_d`'s more prominent call
/// sites in the original).
macro_rules! sched_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "trace")]
        { tracing::debug!($($arg)*); }
    };
}

/// As [`sched_trace`], at `warn` level — poller insert failures and other
/// recoverable faults (`tb_trace_e` in the original).
macro_rules! sched_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "trace")]
        { tracing::warn!($($arg)*); }
    };
}

#[macro_use]
pub(crate) mod scoped_tls;
pub(crate) mod slab;
