// SPDX-License-Identifier: GPL-2.0
//! epoll readiness multiplexer

use std::os::fd::AsFd;

use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};

/// Events fetched per wait
const MAX_EVENTS: usize = 64;

/// Caller-chosen id attached to a registered fd
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// At least one record can be read
    Readable,
    /// Error or hang-up with nothing left to read
    Failed(EpollFlags),
}

impl Readiness {
    pub fn from_flags(flags: EpollFlags) -> Self {
        if flags.contains(EpollFlags::EPOLLIN) {
            Readiness::Readable
        } else {
            Readiness::Failed(flags)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    pub token: Token,
    pub readiness: Readiness,
}

pub struct Multiplexer {
    epoll: Epoll,
    events: Vec<EpollEvent>,
}

impl Multiplexer {
    pub fn new() -> nix::Result<Self> {
        Ok(Self {
            epoll: Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)?,
            events: vec![EpollEvent::empty(); MAX_EVENTS],
        })
    }

    /// Watch `fd` for input
    pub fn register<F: AsFd>(&self, fd: F, token: Token) -> nix::Result<()> {
        self.epoll
            .add(fd, EpollEvent::new(EpollFlags::EPOLLIN, token.0))
    }

    pub fn deregister<F: AsFd>(&self, fd: F) -> nix::Result<()> {
        self.epoll.delete(fd)
    }

    /// Block until at least one fd is ready; `EINTR` is retried
    pub fn wait(&mut self) -> nix::Result<Vec<Ready>> {
        self.wait_with(EpollTimeout::NONE)
    }

    /// Like [`Multiplexer::wait`], giving up after `timeout_ms`
    #[cfg(test)]
    pub(crate) fn wait_timeout(&mut self, timeout_ms: u16) -> nix::Result<Vec<Ready>> {
        self.wait_with(EpollTimeout::from(timeout_ms))
    }

    fn wait_with(&mut self, timeout: EpollTimeout) -> nix::Result<Vec<Ready>> {
        let count = loop {
            match self.epoll.wait(&mut self.events, timeout) {
                Ok(count) => break count,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e),
            }
        };
        Ok(self.events[..count]
            .iter()
            .map(|event| Ready {
                token: Token(event.data()),
                readiness: Readiness::from_flags(event.events()),
            })
            .collect())
    }
}
