//! A deadline-ordered timer queue.
//!
//! The retrieved `monoio` source tree did not include its hierarchical
//! six-level `time::driver::wheel` module, so this is not a port of it.
//! Instead it is a single min-heap of `(deadline_tick, slab_index,
//! generation)` triples — the same lazy-deletion priority-queue shape
//! `monoio`'s own `Handle::clear_entry`/`reregister` use around their wheel
//! (remove by marking, not by eager scan) — paired with a [`Slab`] so
//! cancellation is O(1). This trades the wheel's O(1) amortized insert for
//! O(log n), which is the right tradeoff at the scale a single-threaded
//! scheduler's timer set actually reaches.
//!
//! A cancelled or fired timer frees its slab slot for reuse by a later
//! `insert`, so a [`TimerHandle`] cannot be just a slab index: a handle kept
//! around after its own timer fires or is cancelled would otherwise alias
//! whatever unrelated timer later lands in that same slot. Every handle
//! therefore carries a generation counter alongside its index, minted
//! fresh on every `insert` and checked by
//! [`Self::contains`], [`Self::cancel`], [`Self::set_waker`], and the
//! heap-draining loops in [`Self::advance`]/[`Self::next_delay`] before any
//! of them trust the slot's current occupant. This is the same tagged-index
//! idiom a generational slotmap uses to make a stale key a safe no-op
//! instead of an alias.
//!
//! One `TimingWheel` instance is built per precision tier; see [`super`] for
//! the high/low-precision constructors and the tick-size selection rule.

use std::{
    cmp::Reverse,
    collections::BinaryHeap,
    task::Waker,
    time::{Duration, Instant},
};

use crate::util::slab::Slab;

/// Handle to one armed timer. The generation tag disambiguates this handle
/// from a later timer that reused the same slab slot after this one fired
/// or was cancelled — see the module docs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TimerHandle(usize, u64);

impl TimerHandle {
    /// A handle that never matches any slab slot, so `contains` is always
    /// `false` and `cancel`/`set_waker` are always no-ops for it. Used by
    /// the scheduler to resolve a sleep or wait armed after the scheduler
    /// has already been killed, without registering anything that would
    /// need tearing down later.
    pub(crate) fn already_resolved() -> TimerHandle {
        TimerHandle(usize::MAX, u64::MAX)
    }
}

struct TimerEntryInner {
    deadline_tick: u64,
    generation: u64,
    waker: Option<Waker>,
}

pub(crate) struct TimingWheel {
    tick: Duration,
    start: Instant,
    current_tick: u64,
    entries: Slab<TimerEntryInner>,
    queue: BinaryHeap<Reverse<(u64, usize, u64)>>,
    next_generation: u64,
}

impl TimingWheel {
    /// Builds a wheel with `tick`-sized slots, anchored to `start` (ticks
    /// are counted from this instant so two wheels with different
    /// granularities stay comparable against the same clock).
    pub(crate) fn new(tick: Duration, start: Instant) -> Self {
        TimingWheel {
            tick,
            start,
            current_tick: 0,
            entries: Slab::new(),
            queue: BinaryHeap::new(),
            next_generation: 0,
        }
    }

    fn instant_to_tick(&self, instant: Instant) -> u64 {
        let dur = instant.saturating_duration_since(self.start);
        let tick_nanos = self.tick.as_nanos().max(1);
        let ticks = (dur.as_nanos() + tick_nanos - 1) / tick_nanos;
        ticks.min(u64::MAX as u128) as u64
    }

    fn tick_to_duration(&self, ticks: u64) -> Duration {
        let nanos = self.tick.as_nanos().saturating_mul(ticks as u128);
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }

    /// Arms a new timer `delay` out from `now`. A zero delay arms at the
    /// current tick, so it fires on the very next [`Self::advance`].
    pub(crate) fn insert(&mut self, now: Instant, delay: Duration) -> TimerHandle {
        let deadline_tick = self.instant_to_tick(now + delay).max(self.current_tick);
        let generation = self.next_generation;
        self.next_generation += 1;
        let idx = self.entries.insert(TimerEntryInner {
            deadline_tick,
            generation,
            waker: None,
        });
        self.queue.push(Reverse((deadline_tick, idx, generation)));
        TimerHandle(idx, generation)
    }

    /// Replaces the waker to be woken when `handle` fires. There is at most
    /// one waiter per timer; a later call simply overwrites the earlier one.
    /// A no-op if `handle`'s slot has since been freed or reused.
    pub(crate) fn set_waker(&mut self, handle: TimerHandle, waker: Waker) {
        if let Some(entry) = self.entries.get_mut(handle.0) {
            if entry.generation == handle.1 {
                entry.waker = Some(waker);
            }
        }
    }

    /// Cancels `handle`. Idempotent: cancelling an already-fired or
    /// already-cancelled handle is a no-op, never an error, and never
    /// touches a slot that was reused by a later timer.
    pub(crate) fn cancel(&mut self, handle: TimerHandle) {
        if self.entries.get(handle.0).map(|e| e.generation) == Some(handle.1) {
            self.entries.try_remove(handle.0);
        }
    }

    /// Returns the wakers of every timer whose deadline is at or before
    /// `now`, removing them from the wheel.
    pub(crate) fn advance(&mut self, now: Instant) -> Vec<Waker> {
        let target = self.instant_to_tick(now);
        let mut fired = Vec::new();
        while let Some(&Reverse((tick, idx, generation))) = self.queue.peek() {
            if tick > target {
                break;
            }
            self.queue.pop();
            if let Some(entry) = self.entries.get(idx) {
                if entry.generation == generation {
                    if let Some(entry) = self.entries.try_remove(idx) {
                        if let Some(waker) = entry.waker {
                            fired.push(waker);
                        }
                    }
                }
                // Else: this slab slot was freed and reused for a later
                // timer; the heap entry for *that* timer carries its own
                // generation and tick and will be matched when its turn
                // comes.
            }
        }
        if target > self.current_tick {
            self.current_tick = target;
        }
        fired
    }

    /// Time remaining until the earliest still-armed timer, if any. The
    /// driver loop uses this as its poll timeout so it never busy-waits
    /// past the next deadline nor blocks through it.
    pub(crate) fn next_delay(&mut self, now: Instant) -> Option<Duration> {
        while let Some(&Reverse((tick, idx, generation))) = self.queue.peek() {
            match self.entries.get(idx) {
                Some(entry) if entry.generation == generation => {
                    let deadline = self.start + self.tick_to_duration(tick);
                    return Some(deadline.saturating_duration_since(now));
                }
                _ => {
                    self.queue.pop();
                }
            }
        }
        None
    }

    /// Fires every still-armed timer unconditionally, returning their
    /// wakers so their coroutines can observe the kill and unwind rather
    /// than waiting forever on a wheel that no longer advances.
    pub(crate) fn kill(&mut self) -> Vec<Waker> {
        self.queue.clear();
        self.entries
            .drain()
            .into_iter()
            .filter_map(|entry| entry.waker)
            .collect()
    }

    /// Number of timers currently armed.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if `handle` has neither fired nor been cancelled yet.
    /// `false` for a stale handle even if its old slot was reused by a
    /// later, unrelated timer.
    pub(crate) fn contains(&self, handle: TimerHandle) -> bool {
        self.entries.get(handle.0).map(|e| e.generation) == Some(handle.1)
    }
}
