// SPDX-License-Identifier: GPL-2.0
//! Physical evdev nodes: key and axis sources, the force-feedback sink

use std::collections::{BTreeMap, BTreeSet};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::path::{Path, PathBuf};

use evdev::{Device, FFEffect, FFEffectData, InputEvent};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use tracing::debug;

use crate::axis::AxisSetup;
use crate::device::{EventSource, HapticDevice, InputDevice};
use crate::error::InputError;
use crate::query;

/// Switch an open descriptor to non-blocking reads
pub fn set_nonblocking(fd: RawFd) -> Result<(), InputError> {
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

/// Borrow the descriptor behind an evdev handle
pub(crate) fn borrow_fd(owner: &impl AsRawFd) -> BorrowedFd<'_> {
    // SAFETY: `owner` keeps the descriptor open for the borrow's lifetime
    unsafe { BorrowedFd::borrow_raw(owner.as_raw_fd()) }
}

fn open_device(path: &Path) -> Result<Device, InputError> {
    Device::open(path).map_err(|source| InputError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Key or axis source, read without blocking
pub struct EvdevSource {
    path: PathBuf,
    device: Device,
}

impl EvdevSource {
    pub fn open(path: &Path) -> Result<Self, InputError> {
        let device = open_device(path)?;
        set_nonblocking(device.as_raw_fd())?;
        Ok(Self {
            path: path.to_path_buf(),
            device,
        })
    }
}

impl AsFd for EvdevSource {
    fn as_fd(&self) -> BorrowedFd<'_> {
        borrow_fd(&self.device)
    }
}

impl EventSource for EvdevSource {
    fn fetch_events(&mut self) -> Result<Vec<InputEvent>, InputError> {
        Ok(self.device.fetch_events()?.collect())
    }
}

impl InputDevice for EvdevSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn key_codes(&self) -> BTreeSet<u16> {
        query::key_codes(&self.device)
    }

    fn axes(&self) -> Vec<AxisSetup> {
        query::axis_setups(&self.device)
    }
}

/// Force-feedback sink.
///
/// Uploaded effects are held by slot; dropping one erases it from the
/// device.
pub struct EvdevHaptic {
    path: PathBuf,
    device: Device,
    effects: BTreeMap<i16, FFEffect>,
}

impl EvdevHaptic {
    /// Open read-write; evdev falls back to read-only when write access
    /// is refused, in which case uploads fail later.
    pub fn open(path: &Path) -> Result<Self, InputError> {
        Ok(Self {
            path: path.to_path_buf(),
            device: open_device(path)?,
            effects: BTreeMap::new(),
        })
    }
}

impl HapticDevice for EvdevHaptic {
    fn path(&self) -> &Path {
        &self.path
    }

    fn upload_effect(&mut self, effect: FFEffectData) -> Result<i16, InputError> {
        let effect = self.device.upload_ff_effect(effect)?;
        let slot = effect.id() as i16;
        self.effects.insert(slot, effect);
        Ok(slot)
    }

    fn erase_effect(&mut self, slot: i16) -> Result<(), InputError> {
        let effect = self
            .effects
            .remove(&slot)
            .ok_or(InputError::UnknownEffect(slot))?;
        debug!("Erasing slot {} on {}", effect.id(), self.path.display());
        Ok(())
    }

    fn send_event(&mut self, event: InputEvent) -> Result<(), InputError> {
        self.device.send_events(&[event])?;
        Ok(())
    }
}
