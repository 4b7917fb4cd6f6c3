//! A `mio::Poll`-backed readiness multiplexer.
//!
//! Grounded on `monoio`'s `driver::legacy::{LegacyInner, ScheduledIo}`: one
//! `mio::Poll` plus a slab of per-registration readiness state. Diverges
//! from that source in two ways that matter for this crate's single-waiter
//! invariant: a registration stores exactly one `Waker` (there is one
//! coroutine per wait, not a split reader/writer pair), and a killed
//! registration is tombstoned in place rather than removed outright, so a
//! `poll` that is already in flight over a stale token index can't alias a
//! freshly inserted registration.

use std::{io, task::Waker, time::Duration};

use crate::util::slab::Slab;

use super::ready::{Interest, Ready};

/// Opaque identifier for one registration. Doubles as the `mio::Token`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PollToken(pub(crate) usize);

enum RegState {
    /// Waiting for readiness; `waker` fires when `poll` observes an event
    /// for this token that overlaps `interest`.
    Active { interest: Interest, waker: Option<Waker> },
    /// The wait was cancelled (the other half of a wait-with-timeout raced
    /// ahead, or the registration's owner dropped). The slot is kept around
    /// as a tombstone until the next `remove` call reclaims it, matching
    /// O2: removing an already-removed registration is a no-op, not an
    /// error.
    Killed,
}

struct Registration {
    readiness: Ready,
    state: RegState,
}

/// Thin wrapper over `mio::Poll` plus the registration table it drives.
pub(crate) struct MioPoller {
    poll: mio::Poll,
    events: mio::Events,
    registrations: Slab<Registration>,
}

impl MioPoller {
    pub(crate) fn new(capacity: usize) -> io::Result<Self> {
        Ok(MioPoller {
            poll: mio::Poll::new()?,
            events: mio::Events::with_capacity(capacity),
            registrations: Slab::new(),
        })
    }

    /// Registers `source` for `interest`, returning the token to later
    /// `poll`/`remove` it by. Mirrors `LegacyDriver::register`: the slab
    /// slot is inserted first so the `mio::Token` is known before the
    /// syscall, and rolled back if registration fails.
    pub(crate) fn insert(
        &mut self,
        source: &mut impl mio::event::Source,
        interest: Interest,
    ) -> io::Result<PollToken> {
        let idx = self.registrations.insert(Registration {
            readiness: Ready::EMPTY,
            state: RegState::Active {
                interest,
                waker: None,
            },
        });
        match self
            .poll
            .registry()
            .register(source, mio::Token(idx), interest.to_mio())
        {
            Ok(()) => Ok(PollToken(idx)),
            Err(e) => {
                self.registrations.try_remove(idx);
                Err(e)
            }
        }
    }

    /// Deregisters `source` and drops its registration state. Safe to call
    /// on a token whose registration was already tombstoned by [`Self::kill`].
    pub(crate) fn remove(
        &mut self,
        token: PollToken,
        source: &mut impl mio::event::Source,
    ) -> io::Result<()> {
        self.registrations.try_remove(token.0);
        match self.poll.registry().deregister(source) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Stores `waker`, to be woken the next time `token` observes readiness
    /// overlapping the interest it was registered with. Replaces any
    /// previously stored waker — there is at most one waiter per
    /// registration (I3).
    pub(crate) fn set_waker(&mut self, token: PollToken, waker: Waker) {
        if let Some(reg) = self.registrations.get_mut(token.0) {
            if let RegState::Active {
                waker: slot,
                interest,
            } = &mut reg.state
            {
                let ready = reg.readiness;
                if ready.satisfies(*interest) {
                    waker.wake();
                    return;
                }
                *slot = Some(waker);
            }
        }
    }

    /// Tombstones a registration without deregistering it from `mio` yet
    /// (the caller still owns the `mio::event::Source` and must deregister
    /// separately via [`Self::remove`]). Waking whatever waker is parked
    /// here lets the coroutine observe the kill and unwind. Idempotent:
    /// killing an already-killed or already-removed token does nothing.
    pub(crate) fn kill(&mut self, token: PollToken) {
        if let Some(reg) = self.registrations.get_mut(token.0) {
            if let RegState::Active { waker, .. } = &mut reg.state {
                if let Some(waker) = waker.take() {
                    waker.wake();
                }
            }
            reg.state = RegState::Killed;
        }
    }

    /// Returns whatever readiness has accumulated on `token` since it was
    /// last cleared, without blocking.
    pub(crate) fn readiness(&self, token: PollToken) -> Ready {
        self.registrations
            .get(token.0)
            .map(|reg| reg.readiness)
            .unwrap_or(Ready::EMPTY)
    }

    /// Clears `mask` out of `token`'s accumulated readiness, mirroring
    /// `ScheduledIo::clear_readiness`: a coroutine that got a `WouldBlock`
    /// back from its syscall despite the poller saying "ready" needs to
    /// reset so the next `poll_readiness` parks it again instead of
    /// spinning.
    pub(crate) fn clear_readiness(&mut self, token: PollToken, mask: Ready) {
        if let Some(reg) = self.registrations.get_mut(token.0) {
            reg.readiness = reg.readiness.without(mask);
        }
    }

    /// Blocks on the underlying `mio::Poll` for up to `timeout` (or
    /// indefinitely if `None`), then dispatches every observed event to its
    /// registration, waking any parked waker whose interest is satisfied.
    /// Mirrors `LegacyDriver::inner_park` + `LegacyInner::dispatch`.
    pub(crate) fn poll(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
        let mut woken = Vec::new();
        for event in self.events.iter() {
            let idx = event.token().0;
            let ready = Ready::from_mio(event);
            if let Some(reg) = self.registrations.get_mut(idx) {
                reg.readiness |= ready;
                if let RegState::Active { interest, waker } = &mut reg.state {
                    if reg.readiness.satisfies(*interest) {
                        if let Some(w) = waker.take() {
                            woken.push(w);
                        }
                    }
                }
            }
        }
        for waker in woken {
            waker.wake();
        }
        Ok(())
    }

    /// Number of live (non-tombstoned) registrations.
    pub(crate) fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Wakes and discards every registration, live or tombstoned. Used when
    /// the owning scheduler is killed: every coroutine still parked on I/O
    /// needs a chance to observe that and unwind, since the poller will not
    /// be driven again.
    pub(crate) fn kill_all(&mut self) -> Vec<Waker> {
        self.registrations
            .drain()
            .into_iter()
            .filter_map(|reg| match reg.state {
                RegState::Active { waker, .. } => waker,
                RegState::Killed => None,
            })
            .collect()
    }
}
