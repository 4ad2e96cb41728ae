// SPDX-License-Identifier: GPL-2.0
//! Device traits consumed by the daemon
//!
//! The real implementations are [`crate::EvdevSource`], [`crate::EvdevHaptic`]
//! and [`crate::UinputPad`]; tests substitute in-memory fakes.

use std::collections::BTreeSet;
use std::os::fd::AsFd;
use std::path::Path;

use evdev::{FFEffectData, InputEvent};

use crate::axis::AxisSetup;
use crate::error::InputError;
use crate::uinput::PadDescriptor;

/// A pollable handle that yields whole event records
pub trait EventSource: AsFd {
    /// Every event pending on the handle, oldest first.
    ///
    /// Fails with `WouldBlock` when nothing is pending.
    fn fetch_events(&mut self) -> Result<Vec<InputEvent>, InputError>;
}

/// A physical key or axis source
pub trait InputDevice: EventSource {
    fn path(&self) -> &Path;

    /// Key codes the device reports; empty if it reports none
    fn key_codes(&self) -> BTreeSet<u16>;

    /// Absolute axes the device reports, with their current info
    fn axes(&self) -> Vec<AxisSetup>;
}

/// A physical force-feedback sink
pub trait HapticDevice {
    fn path(&self) -> &Path;

    /// Program `effect` into a slot the device picks; returns the slot
    fn upload_effect(&mut self, effect: FFEffectData) -> Result<i16, InputError>;

    fn erase_effect(&mut self, slot: i16) -> Result<(), InputError>;

    /// Gain and playback control go through plain event writes
    fn send_event(&mut self, event: InputEvent) -> Result<(), InputError>;
}

/// Answers the force-feedback traffic applications send to the virtual device
pub trait FfRequests {
    /// Program virtual effect `id`; returns the result code for the upload
    fn upload(&mut self, id: i16, effect: FFEffectData) -> i32;

    /// Remove virtual effect `id`; returns the result code for the erase
    fn erase(&mut self, id: i16) -> i32;

    /// `EV_FF` event written by an application: gain or playback
    fn control(&mut self, code: u16, value: i32);
}

/// The composite uinput device
pub trait VirtualPad: AsFd {
    /// Write `events` as one frame, terminated by `SYN_REPORT`
    fn emit(&mut self, events: &[InputEvent]) -> Result<(), InputError>;

    /// Handle everything pending on the device.
    ///
    /// Upload and erase requests are completed before this returns. Returns
    /// how many events were handled.
    fn service(&mut self, requests: &mut dyn FfRequests) -> Result<usize, InputError>;

    /// Capabilities registered on the device
    fn descriptor(&self) -> &PadDescriptor;
}
