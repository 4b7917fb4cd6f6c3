//! The poller: a readiness multiplexer with insert/remove/wait operations.
//!
//! Grounded on `monoio`'s legacy (mio-based) driver
//! (`driver/legacy/{mod.rs,scheduled_io.rs,ready.rs}`): a `mio::Poll`
//! backing a slab of per-registration readiness state, each slot holding the
//! `Waker` of whichever coroutine is waiting on it.

mod poller;
mod ready;

pub(crate) use poller::{MioPoller, PollToken};
pub use ready::{Interest, Ready};

/// Anything that can be registered with the poller. Re-exported from `mio`
/// rather than reinvented: socket/file-descriptor abstractions are not this
/// core's concern, so callers bring their own `mio::net::TcpStream`,
/// `UnixStream`, and so on.
pub use mio::event::Source;
