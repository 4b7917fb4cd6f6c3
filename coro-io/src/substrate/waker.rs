//! Per-task wakers.
//!
//! `std`'s safe `Wake` trait only has a blanket `From<Arc<W>> for Waker`
//! impl for `W: Send + Sync`, which rules it out for a single-threaded,
//! `Rc`-based executor. `monoio` (`task/raw.rs`, `task/waker_fn.rs`) and
//! every other single-threaded Rust executor solve this the same way: a
//! hand-written `RawWaker`/`RawWakerVTable` over a reference-counted,
//! non-atomic pointer. This is that, scoped down to "push a task index onto
//! the ready queue," which is all a task waker needs to do here.

use std::{
    rc::{Rc, Weak},
    task::{RawWaker, RawWakerVTable, Waker},
};

use super::Inner;

struct WakeData {
    inner: Weak<Inner>,
    index: usize,
}

fn schedule(data: &WakeData) {
    if let Some(inner) = data.inner.upgrade() {
        inner.ready.borrow_mut().push_back(data.index);
    }
    // If the executor is gone, waking is a silent no-op: there is nothing
    // left to resume.
}

unsafe fn clone(ptr: *const ()) -> RawWaker {
    let rc = Rc::from_raw(ptr as *const WakeData);
    let cloned = rc.clone();
    std::mem::forget(rc);
    RawWaker::new(Rc::into_raw(cloned) as *const (), &VTABLE)
}

unsafe fn wake(ptr: *const ()) {
    let rc = Rc::from_raw(ptr as *const WakeData);
    schedule(&rc);
    // `rc` drops here, releasing the one reference this `RawWaker` owned.
}

unsafe fn wake_by_ref(ptr: *const ()) {
    let rc = std::mem::ManuallyDrop::new(Rc::from_raw(ptr as *const WakeData));
    schedule(&rc);
}

unsafe fn drop_raw(ptr: *const ()) {
    drop(Rc::from_raw(ptr as *const WakeData));
}

static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, wake, wake_by_ref, drop_raw);

pub(super) fn task_waker(inner: &Rc<Inner>, index: usize) -> Waker {
    let data = Rc::new(WakeData {
        inner: Rc::downgrade(inner),
        index,
    });
    let raw = RawWaker::new(Rc::into_raw(data) as *const (), &VTABLE);
    unsafe { Waker::from_raw(raw) }
}
