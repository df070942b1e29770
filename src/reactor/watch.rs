//! Per-socket readiness watches.
//!
//! The engine announces descriptors it wants watched; it keeps each one open
//! for as long as the interest stands. A [`SocketWatch`] therefore borrows
//! the descriptor rather than owning it: dropping the watch deregisters the
//! fd from the runtime without closing a socket the engine still uses.

use std::io;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::{Events, Interest, Socket};

/// Background task translating OS readiness on one descriptor into
/// `(socket, events)` notes for the reactor driver.
pub(crate) struct SocketWatch {
    task: JoinHandle<()>,
}

impl SocketWatch {
    /// Start watching `socket` for `interest`, reporting readiness through
    /// `ready`. Fails when the descriptor cannot be registered (already
    /// closed, or not pollable).
    pub(crate) fn spawn(
        socket: Socket,
        interest: Interest,
        ready: mpsc::UnboundedSender<(Socket, Events)>,
    ) -> io::Result<Self> {
        let task = sys::spawn(socket, interest, ready)?;
        Ok(Self { task })
    }

    pub(crate) fn abort(self) {
        self.task.abort();
    }
}

#[cfg(unix)]
mod sys {
    use super::*;
    use std::os::fd::{AsRawFd, RawFd};
    use tokio::io::unix::AsyncFd;
    use tokio::io::Interest as IoInterest;

    /// Non-owning view of an engine-held descriptor.
    struct WatchFd(RawFd);

    impl AsRawFd for WatchFd {
        fn as_raw_fd(&self) -> RawFd {
            self.0
        }
    }

    pub(super) fn spawn(
        socket: Socket,
        interest: Interest,
        ready: mpsc::UnboundedSender<(Socket, Events)>,
    ) -> io::Result<JoinHandle<()>> {
        let io_interest = match (interest.wants_read(), interest.wants_write()) {
            (true, false) => IoInterest::READABLE,
            (false, true) => IoInterest::WRITABLE,
            _ => IoInterest::READABLE | IoInterest::WRITABLE,
        };
        let fd = AsyncFd::with_interest(WatchFd(socket), io_interest)?;

        Ok(tokio::spawn(async move {
            loop {
                let mut guard = match fd.ready(io_interest).await {
                    Ok(guard) => guard,
                    Err(error) => {
                        tracing::warn!(socket, error = %error, "socket watch failed");
                        break;
                    }
                };
                let readiness = guard.ready();
                let mut events = Events::new();
                if readiness.is_readable() {
                    events = events.input();
                }
                if readiness.is_writable() {
                    events = events.output();
                }
                if readiness.is_read_closed() || readiness.is_write_closed() {
                    events = events.error();
                }
                // The engine does the actual IO during socket_action; clear
                // the cached readiness so the next edge is observed.
                guard.clear_ready();
                if events.is_empty() || ready.send((socket, events)).is_err() {
                    break;
                }
            }
        }))
    }
}

#[cfg(windows)]
mod sys {
    use super::*;
    use std::time::Duration;
    use windows_sys::Win32::Networking::WinSock::{
        WSAPoll, POLLERR, POLLHUP, POLLRDNORM, POLLWRNORM, SOCKET as WinSocket, WSAPOLLFD,
    };

    // No AsyncFd on Windows; sample the descriptor with a zero-timeout
    // WSAPoll between short sleeps, like the waiter's sliced waits.
    const POLL_SLICE: Duration = Duration::from_millis(20);

    pub(super) fn spawn(
        socket: Socket,
        interest: Interest,
        ready: mpsc::UnboundedSender<(Socket, Events)>,
    ) -> io::Result<JoinHandle<()>> {
        let mut wanted = 0;
        if interest.wants_read() {
            wanted |= POLLRDNORM;
        }
        if interest.wants_write() {
            wanted |= POLLWRNORM;
        }

        Ok(tokio::spawn(async move {
            loop {
                let mut fd = WSAPOLLFD {
                    fd: socket as WinSocket,
                    events: wanted,
                    revents: 0,
                };
                let rc = unsafe { WSAPoll(&mut fd, 1, 0) };
                if rc < 0 {
                    tracing::warn!(socket, "socket watch failed");
                    break;
                }
                if rc > 0 {
                    let mut events = Events::new();
                    if fd.revents & POLLRDNORM != 0 {
                        events = events.input();
                    }
                    if fd.revents & POLLWRNORM != 0 {
                        events = events.output();
                    }
                    if fd.revents & (POLLERR | POLLHUP) != 0 {
                        events = events.error();
                    }
                    if !events.is_empty() && ready.send((socket, events)).is_err() {
                        break;
                    }
                }
                tokio::time::sleep(POLL_SLICE).await;
            }
        }))
    }
}
