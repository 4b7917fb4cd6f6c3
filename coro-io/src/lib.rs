//! `coro-io`: an I/O-driven coroutine scheduler core.
//!
//! This crate multiplexes many lightweight cooperative tasks onto a single
//! OS thread by coupling a readiness poller ([`driver`]) with two timer
//! wheels ([`time`]): one high-precision (sub-second) and one low-precision
//! (second-granularity, cheaper). Tasks suspend on I/O readiness
//! ([`wait`]), on a sleep interval ([`sleep`]), or on a bounded
//! wait-for-events-with-timeout (`wait` with `timeout: Some(_)`); the core
//! resumes exactly one waiter per suspension event (readiness or deadline,
//! whichever comes first) and unregisters the other side cleanly.
//!
//! The "coroutine" in the scheduler's vocabulary is realized the idiomatic
//! Rust way: an `async fn` backed by a hand-written [`Future`][std::future::Future].
//! Suspending is returning `Poll::Pending`; resuming is the task's `Waker`
//! firing and the executor re-polling it. See [`substrate`] for the
//! minimal single-threaded executor this relies on.
//!
//! Everything here is single-threaded and `!Send` by construction (`Rc`,
//! not `Arc`): there are no locks, because there is only ever one thread
//! touching the poller, the timers, or any task's state.

#![warn(missing_docs, unreachable_pub)]

#[macro_use]
mod util;

pub mod driver;
pub mod scheduler;
pub mod sleep;
pub mod substrate;
pub mod wait;

mod io_state;
mod runtime;
mod time;

pub use driver::{Interest, Ready};
pub use runtime::{spawn, Runtime};
pub use scheduler::{IoScheduler, SchedulerBuilder};
pub use sleep::sleep;
pub use substrate::JoinHandle;
pub use wait::{wait, WaitOutcome};
