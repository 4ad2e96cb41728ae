// SPDX-License-Identifier: GPL-2.0
//! Composite virtual device on `/dev/uinput`

use std::collections::{BTreeMap, BTreeSet};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};

use evdev::uinput::{UInputEvent, VirtualDevice, VirtualDeviceBuilder};
use evdev::{
    AttributeSet, BusType, FFEffectType, InputEvent, InputEventKind, InputId, Key,
    UInputEventType,
};
use tracing::{debug, trace, warn};

use crate::axis::{AxisInfo, AxisSetup};
use crate::device::{FfRequests, VirtualPad};
use crate::error::InputError;
use crate::source::{borrow_fd, set_nonblocking};

/// Longest name uinput stores, including the terminating NUL
pub const UINPUT_MAX_NAME_SIZE: usize = 80;

/// Identity the virtual device presents to applications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadIdentity {
    pub name: String,
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

/// Everything registered on the virtual device before activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadDescriptor {
    pub identity: PadIdentity,
    pub axes: BTreeMap<u16, AxisInfo>,
    pub keys: BTreeSet<u16>,
    pub ff_effects: BTreeSet<u16>,
    pub ff_effects_max: u32,
}

impl PadDescriptor {
    /// Descriptor with no capabilities
    pub fn new(identity: PadIdentity) -> Self {
        Self {
            identity,
            axes: BTreeMap::new(),
            keys: BTreeSet::new(),
            ff_effects: BTreeSet::new(),
            ff_effects_max: 0,
        }
    }

    pub fn has_force_feedback(&self) -> bool {
        !self.ff_effects.is_empty()
    }

    /// Add an axis uinput will accept; a rejected axis is left out
    pub fn insert_axis(&mut self, axis: AxisSetup) -> Result<(), InputError> {
        axis.validate()?;
        self.axes.insert(axis.code, axis.info);
        Ok(())
    }

    pub fn axis_setups(&self) -> impl Iterator<Item = AxisSetup> + '_ {
        self.axes
            .iter()
            .map(|(&code, &info)| AxisSetup::new(code, info))
    }

    /// The name must leave room for the terminating NUL
    pub fn check_name(&self) -> Result<(), InputError> {
        let len = self.identity.name.len();
        if len >= UINPUT_MAX_NAME_SIZE {
            return Err(InputError::NameTooLong(len));
        }
        Ok(())
    }

    fn input_id(&self) -> InputId {
        let id = &self.identity;
        InputId::new(BusType(id.bustype), id.vendor, id.product, id.version)
    }

    fn key_set(&self) -> AttributeSet<Key> {
        self.keys.iter().map(|&code| Key::new(code)).collect()
    }

    fn effect_set(&self) -> AttributeSet<FFEffectType> {
        self.ff_effects
            .iter()
            .map(|&code| FFEffectType(code))
            .collect()
    }
}

/// An active uinput device; destroyed on drop
pub struct UinputPad {
    device: VirtualDevice,
    descriptor: PadDescriptor,
}

impl UinputPad {
    /// Register `descriptor` and activate the device.
    ///
    /// Every capability is registered before the device is set up and
    /// created; any step failing is fatal.
    pub fn create(descriptor: &PadDescriptor) -> Result<Self, InputError> {
        descriptor.check_name()?;

        let mut builder = VirtualDeviceBuilder::new()?
            .name(&descriptor.identity.name)
            .input_id(descriptor.input_id());
        if !descriptor.keys.is_empty() {
            builder = builder.with_keys(&descriptor.key_set())?;
        }
        for axis in descriptor.axis_setups() {
            builder = builder.with_absolute_axis(&axis.to_uinput())?;
        }
        if descriptor.has_force_feedback() {
            builder = builder
                .with_ff(&descriptor.effect_set())?
                .with_ff_effects_max(descriptor.ff_effects_max);
        }

        let device = builder.build()?;
        set_nonblocking(device.as_raw_fd())?;
        debug!(
            "Created {} with {} axes, {} keys, {} effects",
            descriptor.identity.name,
            descriptor.axes.len(),
            descriptor.keys.len(),
            descriptor.ff_effects.len()
        );

        Ok(Self {
            device,
            descriptor: descriptor.clone(),
        })
    }

    fn complete_upload(&mut self, event: UInputEvent, requests: &mut dyn FfRequests) {
        let request_id = event.value();
        let mut upload = match self.device.process_ff_upload(event) {
            Ok(upload) => upload,
            Err(e) => {
                warn!("Upload request {}: {}", request_id, e);
                return;
            }
        };
        let retval = requests.upload(upload.effect_id(), upload.effect());
        upload.set_retval(retval);
        trace!("Upload request {} -> {}", request_id, retval);
    }

    fn complete_erase(&mut self, event: UInputEvent, requests: &mut dyn FfRequests) {
        let request_id = event.value();
        let mut erase = match self.device.process_ff_erase(event) {
            Ok(erase) => erase,
            Err(e) => {
                warn!("Erase request {}: {}", request_id, e);
                return;
            }
        };
        let retval = requests.erase(erase.effect_id() as i16);
        erase.set_retval(retval);
        trace!("Erase request {} -> {}", request_id, retval);
    }
}

impl AsFd for UinputPad {
    fn as_fd(&self) -> BorrowedFd<'_> {
        borrow_fd(&self.device)
    }
}

impl VirtualPad for UinputPad {
    fn emit(&mut self, events: &[InputEvent]) -> Result<(), InputError> {
        self.device.emit(events)?;
        Ok(())
    }

    fn service(&mut self, requests: &mut dyn FfRequests) -> Result<usize, InputError> {
        let events: Vec<UInputEvent> = self.device.fetch_events()?.collect();
        let count = events.len();

        for event in events {
            match event.kind() {
                InputEventKind::UInput(code) if code == UInputEventType::UI_FF_UPLOAD.0 => {
                    self.complete_upload(event, requests)
                }
                InputEventKind::UInput(code) if code == UInputEventType::UI_FF_ERASE.0 => {
                    self.complete_erase(event, requests)
                }
                InputEventKind::ForceFeedback(code) => requests.control(code, event.value()),
                kind => debug!("Unhandled {:?} from virtual device", kind),
            }
        }
        Ok(count)
    }

    fn descriptor(&self) -> &PadDescriptor {
        &self.descriptor
    }
}
