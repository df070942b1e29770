//! Bounded readiness waits with cross-thread wakeup.
//!
//! `wait`/`poll` suspend the calling thread until a watched descriptor is
//! ready, a timeout passes, or a [`WakeHandle`] is signalled. The wakeup is
//! level-triggered: signalling before the wait starts makes the next wait
//! return immediately, so an unblock request is never lost.
//!
//! Unix uses `poll(2)` plus a self-pipe; Windows uses `WSAPoll` sliced
//! around an atomic wake flag.

use std::io;
use std::time::{Duration, Instant};

use crate::engine::{Interest, Socket};

#[cfg(unix)]
mod sys {
    use super::*;
    use std::os::fd::RawFd;
    use std::sync::Arc;

    struct PipeFds {
        read: RawFd,
        write: RawFd,
    }

    impl Drop for PipeFds {
        fn drop(&mut self) {
            unsafe {
                libc::close(self.read);
                libc::close(self.write);
            }
        }
    }

    fn set_nonblocking_cloexec(fd: RawFd) -> io::Result<()> {
        unsafe {
            if libc::fcntl(fd, libc::F_SETFL, libc::O_NONBLOCK) < 0 {
                return Err(io::Error::last_os_error());
            }
            if libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) < 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    pub struct Waiter {
        pipe: Arc<PipeFds>,
    }

    /// Unblocks a pending (or the next) wait. Clone and send freely.
    #[derive(Clone)]
    pub struct WakeHandle {
        pipe: Arc<PipeFds>,
    }

    impl WakeHandle {
        pub fn wake(&self) {
            let byte = [1u8];
            // A full pipe already has a pending wakeup; nothing to add.
            unsafe {
                libc::write(self.pipe.write, byte.as_ptr() as *const _, 1);
            }
        }
    }

    impl Waiter {
        pub fn new() -> io::Result<Self> {
            let mut fds = [0 as RawFd; 2];
            if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
                return Err(io::Error::last_os_error());
            }
            let pipe = PipeFds {
                read: fds[0],
                write: fds[1],
            };
            set_nonblocking_cloexec(pipe.read)?;
            set_nonblocking_cloexec(pipe.write)?;
            Ok(Self { pipe: Arc::new(pipe) })
        }

        pub fn wake_handle(&self) -> WakeHandle {
            WakeHandle {
                pipe: Arc::clone(&self.pipe),
            }
        }

        /// Block until a watched socket is ready, the timeout elapses, or a
        /// wakeup is signalled.
        pub fn wait(
            &self,
            sockets: &[(Socket, Interest)],
            timeout: Duration,
        ) -> io::Result<()> {
            let deadline = Instant::now() + timeout;
            let mut fds: Vec<libc::pollfd> = Vec::with_capacity(sockets.len() + 1);
            fds.push(libc::pollfd {
                fd: self.pipe.read,
                events: libc::POLLIN,
                revents: 0,
            });
            for (socket, interest) in sockets {
                let mut events = 0;
                if interest.wants_read() {
                    events |= libc::POLLIN;
                }
                if interest.wants_write() {
                    events |= libc::POLLOUT;
                }
                fds.push(libc::pollfd {
                    fd: *socket,
                    events,
                    revents: 0,
                });
            }

            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let millis = remaining.as_millis().min(i32::MAX as u128) as i32;
                let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, millis) };
                if rc < 0 {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::Interrupted {
                        if Instant::now() >= deadline {
                            return Ok(());
                        }
                        continue;
                    }
                    return Err(err);
                }
                if rc > 0 && fds[0].revents != 0 {
                    self.drain_wakeups();
                }
                return Ok(());
            }
        }

        fn drain_wakeups(&self) {
            let mut buf = [0u8; 16];
            loop {
                let n = unsafe {
                    libc::read(self.pipe.read, buf.as_mut_ptr() as *mut _, buf.len())
                };
                if n <= 0 {
                    break;
                }
            }
        }
    }
}

#[cfg(windows)]
mod sys {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use windows_sys::Win32::Networking::WinSock::{
        WSAPoll, POLLERR, POLLHUP, POLLRDNORM, POLLWRNORM, SOCKET as WinSocket, WSAPOLLFD,
    };

    // WSAPoll cannot watch our wake flag, so waits are sliced around it.
    const WAKE_SLICE: Duration = Duration::from_millis(25);

    pub struct Waiter {
        flag: Arc<AtomicBool>,
    }

    /// Unblocks a pending (or the next) wait. Clone and send freely.
    #[derive(Clone)]
    pub struct WakeHandle {
        flag: Arc<AtomicBool>,
    }

    impl WakeHandle {
        pub fn wake(&self) {
            self.flag.store(true, Ordering::Release);
        }
    }

    impl Waiter {
        pub fn new() -> io::Result<Self> {
            Ok(Self {
                flag: Arc::new(AtomicBool::new(false)),
            })
        }

        pub fn wake_handle(&self) -> WakeHandle {
            WakeHandle {
                flag: Arc::clone(&self.flag),
            }
        }

        pub fn wait(
            &self,
            sockets: &[(Socket, Interest)],
            timeout: Duration,
        ) -> io::Result<()> {
            let deadline = Instant::now() + timeout;
            let mut fds: Vec<WSAPOLLFD> = sockets
                .iter()
                .map(|(socket, interest)| {
                    let mut events = 0;
                    if interest.wants_read() {
                        events |= POLLRDNORM;
                    }
                    if interest.wants_write() {
                        events |= POLLWRNORM;
                    }
                    WSAPOLLFD {
                        fd: *socket as WinSocket,
                        events,
                        revents: 0,
                    }
                })
                .collect();

            loop {
                if self.flag.swap(false, Ordering::AcqRel) {
                    return Ok(());
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Ok(());
                }
                let slice = remaining.min(WAKE_SLICE);
                let millis = slice.as_millis().max(1).min(i32::MAX as u128) as i32;
                if fds.is_empty() {
                    std::thread::sleep(slice);
                    continue;
                }
                let rc = unsafe { WSAPoll(fds.as_mut_ptr(), fds.len() as u32, millis) };
                if rc < 0 {
                    return Err(io::Error::last_os_error());
                }
                if rc > 0 {
                    let ready = fds
                        .iter()
                        .any(|fd| fd.revents & (POLLRDNORM | POLLWRNORM | POLLERR | POLLHUP) != 0);
                    if ready {
                        return Ok(());
                    }
                }
            }
        }
    }
}

pub use sys::{WakeHandle, Waiter};
