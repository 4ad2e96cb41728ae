// SPDX-License-Identifier: GPL-2.0
//! Startup failures and their process exit codes

use handheld_evdev::InputError;
use thiserror::Error;

/// Fatal errors; the daemon exits on any of these
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("no matching input devices found")]
    NoDevices,

    #[error("no keys found")]
    NoKeys,

    #[error("failed to create virtual device: {0}")]
    VirtualDevice(#[source] InputError),

    #[error("failed to create event multiplexer: {0}")]
    Multiplexer(#[source] nix::Error),

    #[error("failed to monitor {what}: {source}")]
    Monitor {
        what: String,
        #[source]
        source: nix::Error,
    },

    #[error("event wait failed: {0}")]
    Wait(#[source] nix::Error),
}

impl DaemonError {
    /// Negative errno reported as the process status
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::NoDevices | DaemonError::NoKeys | DaemonError::VirtualDevice(_) => {
                -libc::ENODEV
            }
            DaemonError::Multiplexer(_) | DaemonError::Monitor { .. } | DaemonError::Wait(_) => -1,
        }
    }

    /// Low byte of [`DaemonError::exit_code`], as the shell sees it
    pub fn exit_status(&self) -> u8 {
        self.exit_code() as u8
    }
}
