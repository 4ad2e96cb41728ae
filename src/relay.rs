// SPDX-License-Identifier: GPL-2.0
//! Force-feedback relay between the virtual device and the haptic sink
//!
//! Applications program effects on the virtual device. uinput turns each
//! upload and erase into a request the relay completes by replaying it on
//! the physical device. Playback and gain arrive as plain `EV_FF` events.
//!
//! The physical device assigns its own effect ids, so the relay keeps a map
//! from virtual id to hardware slot. Ids it has never seen are forwarded
//! unchanged, and so is every `EV_FF` code other than gain.

use std::collections::BTreeMap;

use evdev::{EventType, FFEffectData, FFEffectType, InputEvent};
use handheld_evdev::{FfRequests, HapticDevice};
use tracing::{debug, trace, warn};

const FF_GAIN: u16 = FFEffectType::FF_GAIN.0;

/// Meaning of an `EV_FF` event written to the virtual device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfCommand {
    /// Set device gain
    Gain(i32),
    /// Play effect `id` `count` times; 0 stops it. Property codes such as
    /// autocenter land here as well and are forwarded unchanged.
    Effect { id: i16, count: i32 },
}

impl FfCommand {
    pub fn classify(code: u16, value: i32) -> Self {
        match code {
            FF_GAIN => FfCommand::Gain(value),
            c => FfCommand::Effect {
                id: c as i16,
                count: value,
            },
        }
    }
}

pub struct ForceFeedbackRelay {
    haptic: Option<Box<dyn HapticDevice>>,
    slots: BTreeMap<i16, i16>,
}

impl ForceFeedbackRelay {
    pub fn new(haptic: Option<Box<dyn HapticDevice>>) -> Self {
        Self {
            haptic,
            slots: BTreeMap::new(),
        }
    }

    pub fn has_haptic(&self) -> bool {
        self.haptic.is_some()
    }

    /// Hardware slot currently holding virtual effect `id`
    pub fn hardware_slot(&self, id: i16) -> Option<i16> {
        self.slots.get(&id).copied()
    }

    fn resolve(&self, id: i16) -> i16 {
        self.hardware_slot(id).unwrap_or(id)
    }

    /// Program a copy of `effect` into a fresh hardware slot and map it
    fn program(&mut self, id: i16, effect: FFEffectData) -> Result<(), i32> {
        let Some(haptic) = self.haptic.as_mut() else {
            debug!("No force-feedback device, rejecting upload");
            return Err(libc::ENODEV);
        };

        let slot = match haptic.upload_effect(effect) {
            Ok(slot) => slot,
            Err(e) => {
                warn!("Uploading effect {} to {}: {}", id, haptic.path().display(), e);
                return Err(e.errno());
            }
        };
        debug!("Effect {} -> slot {}", id, slot);

        // Updating an effect allocates a new slot; free the one it replaces
        if let Some(stale) = self.slots.insert(id, slot) {
            if stale != slot {
                if let Err(e) = haptic.erase_effect(stale) {
                    debug!("Releasing slot {}: {}", stale, e);
                }
            }
        }
        Ok(())
    }

    /// Forward gain or playback control to the haptic device
    pub fn handle_ff_event(&mut self, code: u16, value: i32) {
        let (code, value) = match FfCommand::classify(code, value) {
            FfCommand::Gain(gain) => (FF_GAIN, gain),
            // property codes above FF_GAIN are not effect ids
            FfCommand::Effect { id, count } if (id as u16) < FF_GAIN => {
                (self.resolve(id) as u16, count)
            }
            FfCommand::Effect { id, count } => (id as u16, count),
        };

        let Some(haptic) = self.haptic.as_mut() else {
            debug!("No force-feedback device, dropping EV_FF {:#x}", code);
            return;
        };
        trace!("-> {}: EV_FF {:#x} {}", haptic.path().display(), code, value);
        let event = InputEvent::new(EventType::FORCEFEEDBACK, code, value);
        if let Err(e) = haptic.send_event(event) {
            warn!("Force-feedback write failed: {}; event dropped", e);
        }
    }
}

impl FfRequests for ForceFeedbackRelay {
    fn upload(&mut self, id: i16, effect: FFEffectData) -> i32 {
        match self.program(id, effect) {
            Ok(()) => 0,
            Err(errno) => -errno,
        }
    }

    fn erase(&mut self, id: i16) -> i32 {
        let slot = self.slots.remove(&id).unwrap_or(id);
        let Some(haptic) = self.haptic.as_mut() else {
            return -libc::ENODEV;
        };
        match haptic.erase_effect(slot) {
            Ok(()) => 0,
            Err(e) => {
                warn!("Erasing slot {}: {}", slot, e);
                -e.errno()
            }
        }
    }

    fn control(&mut self, code: u16, value: i32) {
        self.handle_ff_event(code, value);
    }
}
