//! A handle to a spawned coroutine's eventual output.

use std::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, Waker},
};

struct Shared<T> {
    output: RefCell<Option<T>>,
    waker: RefCell<Option<Waker>>,
}

/// The output of a coroutine spawned with [`super::Executor::spawn`] or
/// [`crate::spawn`].
///
/// A `JoinHandle` can be polled directly (`.await`ed from another
/// coroutine) or drained with [`JoinHandle::try_take`], which is how
/// [`crate::Runtime::block_on`] observes completion of its root future
/// without needing its own `Waker` dance.
pub struct JoinHandle<T> {
    shared: Rc<Shared<T>>,
}

impl<T> JoinHandle<T> {
    pub(crate) fn new_pair() -> (Self, impl FnMut(T)) {
        let shared = Rc::new(Shared {
            output: RefCell::new(None),
            waker: RefCell::new(None),
        });
        let setter_shared = shared.clone();
        let setter = move |value: T| {
            *setter_shared.output.borrow_mut() = Some(value);
            if let Some(waker) = setter_shared.waker.borrow_mut().take() {
                waker.wake();
            }
        };
        (JoinHandle { shared }, setter)
    }

    /// Returns the output if the coroutine has completed, without blocking.
    pub fn try_take(&self) -> Option<T> {
        self.shared.output.borrow_mut().take()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        if let Some(v) = self.shared.output.borrow_mut().take() {
            return Poll::Ready(v);
        }
        *self.shared.waker.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}
