// SPDX-License-Identifier: GPL-2.0
//! Input device error types

use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// Errors from evdev and uinput operations
#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("device name too long: {0} bytes")]
    NameTooLong(usize),

    #[error("axis {code:#x} rejected: {reason}")]
    InvalidAxis { code: u16, reason: &'static str },

    #[error("no effect in slot {0}")]
    UnknownEffect(i16),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<Errno> for InputError {
    fn from(errno: Errno) -> Self {
        InputError::Io(io::Error::from(errno))
    }
}

impl InputError {
    /// Positive errno describing the failure.
    ///
    /// Errors that do not carry an OS error map to `EIO`.
    pub fn errno(&self) -> i32 {
        match self {
            InputError::Open { source, .. } | InputError::Io(source) => {
                source.raw_os_error().unwrap_or(Errno::EIO as i32)
            }
            InputError::NameTooLong(_)
            | InputError::InvalidAxis { .. }
            | InputError::UnknownEffect(_) => Errno::EINVAL as i32,
        }
    }

    /// Non-blocking read found nothing to do
    pub fn is_would_block(&self) -> bool {
        matches!(self, InputError::Io(e) if e.kind() == io::ErrorKind::WouldBlock)
    }
}
