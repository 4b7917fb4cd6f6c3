//! Readiness and interest bitsets.
// Adapted from monoio's `driver/legacy/ready.rs`, itself copied from tokio.
// The read/write-canceled bits that file carries for io_uring cancellation
// bookkeeping are dropped here — this poller has no io_uring leg, so there
// is nothing to cancel at that layer (a killed wait is modeled at the
// registration level instead, see `driver::poller::PollOutcome`).

use std::{fmt, ops};

const READABLE: u8 = 0b0001;
const WRITABLE: u8 = 0b0010;
const READ_CLOSED: u8 = 0b0100;
const WRITE_CLOSED: u8 = 0b1000;

/// The set of events a coroutine is interested in for one registration.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Interest(mio::Interest);

impl Interest {
    /// Readable (or peer-closed-for-reading) readiness.
    pub const READABLE: Interest = Interest(mio::Interest::READABLE);
    /// Writable (or peer-closed-for-writing) readiness.
    pub const WRITABLE: Interest = Interest(mio::Interest::WRITABLE);

    pub(crate) fn to_mio(self) -> mio::Interest {
        self.0
    }
}

impl ops::BitOr for Interest {
    type Output = Self;

    fn bitor(self, other: Self) -> Self {
        Interest(self.0.add(other.0))
    }
}

impl ops::BitOrAssign for Interest {
    fn bitor_assign(&mut self, other: Self) {
        *self = *self | other;
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Describes which operations an I/O resource became ready for.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Ready(u8);

impl Ready {
    /// The empty set: no operation is ready.
    pub const EMPTY: Ready = Ready(0);
    /// Readable readiness.
    pub const READABLE: Ready = Ready(READABLE);
    /// Writable readiness.
    pub const WRITABLE: Ready = Ready(WRITABLE);
    /// The peer closed the read half.
    pub const READ_CLOSED: Ready = Ready(READ_CLOSED);
    /// The peer closed the write half.
    pub const WRITE_CLOSED: Ready = Ready(WRITE_CLOSED);

    const READ_ALL: Ready = Ready(READABLE | READ_CLOSED);
    const WRITE_ALL: Ready = Ready(WRITABLE | WRITE_CLOSED);

    pub(crate) fn from_mio(event: &mio::event::Event) -> Ready {
        let mut ready = Ready::EMPTY;
        if event.is_readable() {
            ready |= Ready::READABLE;
        }
        if event.is_writable() {
            ready |= Ready::WRITABLE;
        }
        if event.is_read_closed() {
            ready |= Ready::READ_CLOSED;
        }
        if event.is_write_closed() {
            ready |= Ready::WRITE_CLOSED;
        }
        ready
    }

    /// Returns `true` if this set has no bits set.
    pub fn is_empty(self) -> bool {
        self == Ready::EMPTY
    }

    /// Returns `true` if any bit overlapping read interest is set.
    pub fn is_readable(self) -> bool {
        !(self & Ready::READ_ALL).is_empty()
    }

    /// Returns `true` if any bit overlapping write interest is set.
    pub fn is_writable(self) -> bool {
        !(self & Ready::WRITE_ALL).is_empty()
    }

    /// Returns `true` if `self` contains every bit in `interest`.
    pub fn satisfies(self, interest: Interest) -> bool {
        let mask = Ready::from_interest(interest);
        !(self & mask).is_empty()
    }

    /// Returns `self` with every bit in `mask` cleared.
    pub(crate) fn without(self, mask: Ready) -> Ready {
        Ready(self.0 & !mask.0)
    }

    fn from_interest(interest: Interest) -> Ready {
        let mut ready = Ready::EMPTY;
        if interest.0.is_readable() {
            ready |= Ready::READ_ALL;
        }
        if interest.0.is_writable() {
            ready |= Ready::WRITE_ALL;
        }
        ready
    }
}

impl ops::BitOr for Ready {
    type Output = Ready;
    fn bitor(self, other: Ready) -> Ready {
        Ready(self.0 | other.0)
    }
}

impl ops::BitOrAssign for Ready {
    fn bitor_assign(&mut self, other: Ready) {
        self.0 |= other.0;
    }
}

impl ops::BitAnd for Ready {
    type Output = Ready;
    fn bitand(self, other: Ready) -> Ready {
        Ready(self.0 & other.0)
    }
}

impl fmt::Debug for Ready {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ready")
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readable_interest_matches_readable_and_closed() {
        assert!(Ready::READABLE.satisfies(Interest::READABLE));
        assert!(Ready::READ_CLOSED.satisfies(Interest::READABLE));
        assert!(!Ready::WRITABLE.satisfies(Interest::READABLE));
    }

    #[test]
    fn combined_interest_matches_either_half() {
        let both = Interest::READABLE | Interest::WRITABLE;
        assert!(Ready::READABLE.satisfies(both));
        assert!(Ready::WRITABLE.satisfies(both));
        assert!(!Ready::EMPTY.satisfies(both));
    }
}
