// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scoped thread-local storage.
//!
//! Forked from `monoio`'s own copy of the same crate, which is itself a
//! fork of the `scoped-tls` crate. Ported rather than depended on because
//! `monoio` vendors it in-tree instead of pulling it from crates.io.
//!
//! A scoped variable stores a *reference* to a value only for the duration
//! of a closure. This is how the running [`crate::runtime::Runtime`] makes
//! itself reachable to free functions like [`crate::wait::wait`] and
//! [`crate::sleep::sleep`] without threading a handle through every `async
//! fn` in the program.

use std::{cell::Cell, marker, thread::LocalKey};

macro_rules! scoped_thread_local {
    ($(#[$attrs:meta])* $vis:vis static $name:ident: $ty:ty) => (
        $(#[$attrs])*
        $vis static $name: $crate::util::scoped_tls::ScopedKey<$ty> = $crate::util::scoped_tls::ScopedKey {
            inner: {
                thread_local!(static FOO: ::std::cell::Cell<*const ()> = {
                    ::std::cell::Cell::new(::std::ptr::null())
                });
                &FOO
            },
            _marker: ::std::marker::PhantomData,
        };
    )
}

/// A thread-local storage key corresponding to a reference to `T`, scoped to
/// the lifetime of a closure passed to [`ScopedKey::set`].
pub(crate) struct ScopedKey<T> {
    #[doc(hidden)]
    pub(crate) inner: &'static LocalKey<Cell<*const ()>>,
    #[doc(hidden)]
    pub(crate) _marker: marker::PhantomData<T>,
}

unsafe impl<T> Sync for ScopedKey<T> {}

impl<T> ScopedKey<T> {
    /// Inserts a value for the duration of `f`, restoring the previous
    /// value (if any) on return.
    pub(crate) fn set<F, R>(&'static self, t: &T, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        struct Reset {
            key: &'static LocalKey<Cell<*const ()>>,
            val: *const (),
        }
        impl Drop for Reset {
            fn drop(&mut self) {
                self.key.with(|c| c.set(self.val));
            }
        }
        let prev = self.inner.with(|c| {
            let prev = c.get();
            c.set(t as *const T as *const ());
            prev
        });
        let _reset = Reset {
            key: self.inner,
            val: prev,
        };
        f()
    }

    /// Gets a value out of this scoped variable, panicking if it has not
    /// been `set` on the current thread.
    pub(crate) fn with<F, R>(&'static self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let val = self.inner.with(|c| c.get());
        assert!(
            !val.is_null(),
            "coro_io: called outside of a running Runtime (no coroutine substrate in scope)"
        );
        unsafe { f(&*(val as *const T)) }
    }

    /// Gets a value out of this scoped variable, without panicking if it has
    /// not been `set` on the current thread.
    pub(crate) fn try_with<F, R>(&'static self, f: F) -> R
    where
        F: FnOnce(Option<&T>) -> R,
    {
        let val = self.inner.with(|c| c.get());
        if val.is_null() {
            f(None)
        } else {
            unsafe { f(Some(&*(val as *const T))) }
        }
    }

    /// `true` if this key has been `set` for the current thread.
    #[inline]
    pub(crate) fn is_set(&'static self) -> bool {
        self.inner.with(|c| !c.get().is_null())
    }
}
