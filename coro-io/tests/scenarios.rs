//! Integration tests driving real loopback sockets and a real clock through
//! a [`coro_io::Runtime`], in the style of `monoio/tests/tcp_echo.rs`: spawn
//! coroutines on the executor, signal completion with `local_sync`'s
//! single-threaded oneshot channel, and assert on what actually happened
//! rather than on internal bookkeeping.

use std::{
    cell::RefCell,
    future::Future,
    rc::Rc,
    sync::Arc,
    task::{Context, Wake, Waker},
    time::{Duration, Instant},
};

use coro_io::{sleep, spawn, wait, Interest, Runtime, WaitOutcome};

/// A connected loopback pair, set non-blocking the way `mio` requires.
fn loopback_pair() -> (mio::net::TcpStream, mio::net::TcpStream) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = std::net::TcpStream::connect(addr).unwrap();
    let (server, _) = listener.accept().unwrap();
    client.set_nonblocking(true).unwrap();
    server.set_nonblocking(true).unwrap();
    (
        mio::net::TcpStream::from_std(client),
        mio::net::TcpStream::from_std(server),
    )
}

/// A `Waker` that just flips a flag, for manually driving a future one poll
/// at a time outside an `Executor`. `Wake`'s blanket impl requires
/// `Send + Sync`; every use here stays on one thread, same trick the
/// in-crate unit tests (`scheduler.rs`, `time/wheel.rs`) already use.
struct Flag(std::cell::Cell<bool>);
impl Wake for Flag {
    fn wake(self: Arc<Self>) {
        self.0.set(true);
    }
}
unsafe impl Sync for Flag {}
unsafe impl Send for Flag {}

fn flagged_waker() -> (Waker, Arc<Flag>) {
    let flag = Arc::new(Flag(std::cell::Cell::new(false)));
    (Waker::from(flag.clone()), flag)
}

// S1 — a single coroutine sleeping a sub-second interval resolves on the
// high-precision wheel, after at least that much time has actually passed.
#[test]
fn s1_sleep_high_precision() {
    let runtime = Runtime::new().unwrap();
    let start = Instant::now();
    runtime.block_on(async {
        sleep(Duration::from_millis(50)).await;
    });
    assert!(start.elapsed() >= Duration::from_millis(50));
}

// S2 — a whole-second sleep belongs on the low-precision wheel
// (`time::needs_high_precision` is unit-tested directly for the selection
// rule itself; this checks the end-to-end behavior still holds).
#[test]
fn s2_sleep_low_precision() {
    let runtime = Runtime::new().unwrap();
    let start = Instant::now();
    runtime.block_on(async {
        sleep(Duration::from_secs(1)).await;
    });
    assert!(start.elapsed() >= Duration::from_secs(1));
}

// S3 — wait, event wins: the peer writes before the deadline, so the wait
// returns readiness rather than a timeout.
#[test]
fn s3_wait_event_wins() {
    let (mut client, mut server) = loopback_pair();
    let runtime = Runtime::new().unwrap();

    let outcome = runtime.block_on(async move {
        let (tx, rx) = local_sync::oneshot::channel();
        spawn(async move {
            sleep(Duration::from_millis(20)).await;
            use std::io::Write;
            client.write_all(b"hi").unwrap();
            tx.send(()).unwrap();
        });

        let outcome = wait(&mut server, Interest::READABLE, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        rx.await.unwrap();
        outcome
    });

    assert!(matches!(outcome, WaitOutcome::Ready(r) if r.is_readable()));
}

// S4 — wait, timer wins: nothing is ever written, so the bounded wait times
// out well before its much longer notional deadline would matter.
#[test]
fn s4_wait_timer_wins() {
    let (_client, mut server) = loopback_pair();
    let runtime = Runtime::new().unwrap();

    let start = Instant::now();
    let outcome = runtime.block_on(async move {
        wait(&mut server, Interest::READABLE, Some(Duration::from_millis(20)))
            .await
            .unwrap()
    });

    assert!(matches!(outcome, WaitOutcome::TimedOut));
    assert!(start.elapsed() >= Duration::from_millis(20));
}

// S5 — wait, insert fails: registering a socket that is already registered
// with the same poller is rejected by `mio` (`EEXIST`), the one reliable way
// to force the poller-insert failure path without a cooperating fake
// poller. Unix-only: relies on duplicating a raw fd, which has no portable
// equivalent here.
#[cfg(unix)]
#[test]
fn s5_wait_insert_failure_is_an_error() {
    use std::os::unix::io::{AsRawFd, FromRawFd};

    let (_client, mut first) = loopback_pair();
    let raw = first.as_raw_fd();
    let runtime = Runtime::new().unwrap();

    runtime.block_on(async move {
        // Poll once by hand to drive `start_wait`'s registration without
        // letting the wait resolve (nothing will ever make it ready).
        let mut first_wait = Box::pin(wait(&mut first, Interest::READABLE, None));
        let (waker, _flag) = flagged_waker();
        let mut cx = Context::from_waker(&waker);
        assert!(first_wait.as_mut().poll(&mut cx).is_pending());

        // A second handle onto the very same fd: registering it too must
        // fail, since the first registration is still live.
        let mut second = unsafe { mio::net::TcpStream::from_raw_fd(raw) };
        let result = wait(&mut second, Interest::READABLE, None).await;
        std::mem::forget(second); // `first` still owns this fd.
        assert!(result.is_err());
    });
}

// S6 — kill: every suspended waiter resumes (as `Killed`) once the
// scheduler is killed, regardless of how far off its own deadline was.
#[test]
fn s6_kill_wakes_every_waiter() {
    let runtime = Runtime::new().unwrap();
    let scheduler = runtime.scheduler();
    let resumed = Rc::new(RefCell::new(0usize));

    runtime.block_on(async move {
        let pairs: Vec<_> = (0..10).map(|_| loopback_pair()).collect();
        let (tx, rx) = local_sync::oneshot::channel();
        let tx = Rc::new(RefCell::new(Some(tx)));

        for (_client, mut server) in pairs {
            let resumed = resumed.clone();
            let tx = tx.clone();
            spawn(async move {
                let outcome = wait(&mut server, Interest::READABLE, Some(Duration::from_secs(10)))
                    .await
                    .unwrap();
                assert!(matches!(outcome, WaitOutcome::Killed));
                *resumed.borrow_mut() += 1;
                if *resumed.borrow() == 10 {
                    if let Some(tx) = tx.borrow_mut().take() {
                        let _ = tx.send(());
                    }
                }
            });
        }

        // Let every spawned waiter register before killing the scheduler.
        sleep(Duration::from_millis(1)).await;
        scheduler.kill();
        rx.await.unwrap();
    });

    assert_eq!(*resumed.borrow(), 10);
    assert!(runtime.scheduler().is_killed());
}

// S7 — mixed drain: runnable coroutines finish in FIFO order within the
// same tick that suspends the root future, before the driver loop has any
// reason to block on the poller for the (far longer) sleeps below.
#[test]
fn s7_runnables_drain_before_the_driver_blocks() {
    let runtime = Runtime::new().unwrap();
    let order = Rc::new(RefCell::new(Vec::new()));

    runtime.block_on(async move {
        for i in 0..5 {
            let order = order.clone();
            spawn(async move {
                order.borrow_mut().push(i);
            });
        }
        for _ in 0..3 {
            spawn(async move {
                sleep(Duration::from_secs(60)).await;
            });
        }
        sleep(Duration::from_millis(1)).await;
    });

    assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
}

// Invariant I2 — after a timed-out wait resolves, neither the poller nor
// either timer still holds an entry for it: a second wait on the very same
// socket must be free to register cleanly.
#[test]
fn i2_timed_out_wait_leaves_no_dangling_registration() {
    let (_client, mut server) = loopback_pair();
    let runtime = Runtime::new().unwrap();

    runtime.block_on(async move {
        let first = wait(&mut server, Interest::READABLE, Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert!(matches!(first, WaitOutcome::TimedOut));

        // If the first wait's poller/timer entries were not cleaned up,
        // this second registration on the same socket would either fail
        // (stale poller entry) or never resolve.
        let second = wait(&mut server, Interest::READABLE, Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert!(matches!(second, WaitOutcome::TimedOut));
    });
}

// Invariant I2 (drop path) — a wait abandoned mid-flight (its future
// dropped before resolving) must also leave no dangling registration,
// exercised via `Wait`'s `Drop` impl rather than a natural resolution.
#[test]
fn i2_dropped_wait_leaves_no_dangling_registration() {
    let (_client, mut server) = loopback_pair();
    let runtime = Runtime::new().unwrap();

    runtime.block_on(async move {
        {
            let mut pending = Box::pin(wait(&mut server, Interest::READABLE, Some(Duration::from_secs(30))));
            let (waker, _flag) = flagged_waker();
            let mut cx = Context::from_waker(&waker);
            assert!(pending.as_mut().poll(&mut cx).is_pending());
            // `pending` drops here, still unresolved.
        }

        let second = wait(&mut server, Interest::READABLE, Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert!(matches!(second, WaitOutcome::TimedOut));
    });
}
