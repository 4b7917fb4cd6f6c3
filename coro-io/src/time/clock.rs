//! Source-of-time abstraction.
//!
//! Ported from `monoio`'s `time::clock::Clock`. `std::time::Instant::now()`
//! is the only backend; there is no `test-util` clock override here, since
//! nothing downstream needs one yet.

use std::time::Instant;

#[derive(Debug, Clone)]
pub(crate) struct Clock;

impl Clock {
    pub(crate) fn new() -> Clock {
        Clock
    }

    pub(crate) fn now(&self) -> Instant {
        Instant::now()
    }
}
