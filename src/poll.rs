use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::error::{Error, Result};

/// Readiness to wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// Outcome of a single [`Poller::wait`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The socket is ready, or in an error/hang-up state the next I/O call will report
    Ready,
    /// A signal interrupted the wait
    Interrupted,
    /// The bounded interval elapsed
    TimedOut,
}

/// Blocks on a socket until it becomes readable or writable
///
/// One `poll(2)` call per `wait`. Interruption and expiry are reported, never
/// retried here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    interval: Option<Duration>,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(1)))
    }
}

impl Poller {
    /// `None` waits indefinitely.
    pub fn new(interval: Option<Duration>) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn wait(&self, fd: RawFd, direction: Direction) -> Result<Readiness> {
        let events = match direction {
            Direction::Read => libc::POLLIN,
            Direction::Write => libc::POLLOUT,
        };
        let mut pfd = libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        let timeout = self
            .interval
            .map_or(-1, |d| libc::c_int::try_from(d.as_millis()).unwrap_or(libc::c_int::MAX));

        // SAFETY: `pfd` is a valid pollfd for the duration of the call and the count is 1
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                tracing::trace!(fd, ?direction, "poll interrupted");
                return Ok(Readiness::Interrupted);
            }
            return Err(Error::Transport(err));
        }
        if rc == 0 {
            tracing::trace!(fd, ?direction, "poll interval elapsed");
            return Ok(Readiness::TimedOut);
        }
        if pfd.revents & libc::POLLNVAL != 0 {
            return Err(Error::Transport(io::Error::new(
                io::ErrorKind::InvalidInput,
                "socket descriptor is not open",
            )));
        }
        Ok(Readiness::Ready)
    }
}
