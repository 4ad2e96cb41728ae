// SPDX-License-Identifier: GPL-2.0
//! Build the composite descriptor and activate the virtual device
//!
//! Each capability category is an independent component that adds to the
//! descriptor only when its devices are present.

use std::collections::BTreeSet;

use handheld_evdev::{InputDevice, InputError, PadDescriptor, UinputPad, VirtualPad};
use tracing::{debug, info, warn};

use crate::config::WrapperConfig;
use crate::error::DaemonError;
use crate::registry::{Category, DeviceSet};

/// One optional slice of the virtual device's capabilities
pub trait PadComponent {
    fn name(&self) -> &'static str;

    fn contribute(
        &self,
        devices: &DeviceSet,
        config: &WrapperConfig,
        descriptor: &mut PadDescriptor,
    ) -> Result<(), DaemonError>;
}

/// Mirrors every axis of the retained axis source.
///
/// An axis uinput would refuse is skipped; the rest are still registered.
#[derive(Debug, Default)]
pub struct AxisComponent;

impl PadComponent for AxisComponent {
    fn name(&self) -> &'static str {
        "axes"
    }

    fn contribute(
        &self,
        devices: &DeviceSet,
        _config: &WrapperConfig,
        descriptor: &mut PadDescriptor,
    ) -> Result<(), DaemonError> {
        let Some(source) = devices
            .records(Category::AbsoluteAxis)
            .find_map(|record| record.input())
        else {
            return Ok(());
        };

        for axis in source.axes() {
            match descriptor.insert_axis(axis) {
                Ok(()) => debug!(
                    "Axis {:#x}: [{}, {}] fuzz {} flat {}",
                    axis.code,
                    axis.info.minimum,
                    axis.info.maximum,
                    axis.info.fuzz,
                    axis.info.flat
                ),
                Err(e) => warn!("Skipping axis {:#x}: {}", axis.code, e),
            }
        }
        Ok(())
    }
}

/// Union of the key codes of every retained key source
#[derive(Debug, Default)]
pub struct KeyComponent;

impl PadComponent for KeyComponent {
    fn name(&self) -> &'static str {
        "keys"
    }

    fn contribute(
        &self,
        devices: &DeviceSet,
        _config: &WrapperConfig,
        descriptor: &mut PadDescriptor,
    ) -> Result<(), DaemonError> {
        if devices.count(Category::Key) == 0 {
            return Ok(());
        }

        let mut keys = BTreeSet::new();
        for source in devices.records(Category::Key).filter_map(|r| r.input()) {
            keys.extend(source.key_codes());
        }
        if keys.is_empty() {
            warn!("No keys found");
            return Err(DaemonError::NoKeys);
        }
        descriptor.keys.extend(keys);
        Ok(())
    }
}

/// Advertises the configured effects when a force-feedback sink exists
#[derive(Debug, Default)]
pub struct HapticComponent;

impl PadComponent for HapticComponent {
    fn name(&self) -> &'static str {
        "force feedback"
    }

    fn contribute(
        &self,
        devices: &DeviceSet,
        config: &WrapperConfig,
        descriptor: &mut PadDescriptor,
    ) -> Result<(), DaemonError> {
        if devices.count(Category::ForceFeedback) == 0 {
            return Ok(());
        }
        descriptor.ff_effects.extend(config.ff_effects.iter().copied());
        descriptor.ff_effects_max = config.ff_effects_max;
        Ok(())
    }
}

/// Activates a descriptor; replaceable in tests
pub trait PadFactory {
    fn create(&mut self, descriptor: &PadDescriptor) -> Result<Box<dyn VirtualPad>, InputError>;
}

/// Creates the device through `/dev/uinput`
#[derive(Debug, Default)]
pub struct UinputFactory;

impl PadFactory for UinputFactory {
    fn create(&mut self, descriptor: &PadDescriptor) -> Result<Box<dyn VirtualPad>, InputError> {
        Ok(Box::new(UinputPad::create(descriptor)?))
    }
}

pub struct Composer {
    components: Vec<Box<dyn PadComponent>>,
}

impl Composer {
    pub fn new(components: Vec<Box<dyn PadComponent>>) -> Self {
        Self { components }
    }

    /// Axis, key and force-feedback components, in that order
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(AxisComponent),
            Box::new(KeyComponent),
            Box::new(HapticComponent),
        ])
    }

    /// Run every component over the retained devices
    pub fn describe(
        &self,
        devices: &DeviceSet,
        config: &WrapperConfig,
    ) -> Result<PadDescriptor, DaemonError> {
        let mut descriptor = PadDescriptor::new(config.identity.clone());
        for component in &self.components {
            component.contribute(devices, config, &mut descriptor)?;
            debug!("Applied {} component", component.name());
        }
        Ok(descriptor)
    }

    /// Describe and activate the virtual device
    pub fn compose(
        &self,
        devices: &DeviceSet,
        config: &WrapperConfig,
        factory: &mut dyn PadFactory,
    ) -> Result<Box<dyn VirtualPad>, DaemonError> {
        let descriptor = self.describe(devices, config)?;
        let pad = factory
            .create(&descriptor)
            .map_err(DaemonError::VirtualDevice)?;
        let active = pad.descriptor();
        info!(
            "Created {}: {} axes, {} keys, force feedback {}",
            active.identity.name,
            active.axes.len(),
            active.keys.len(),
            if active.has_force_feedback() { "on" } else { "off" }
        );
        Ok(pad)
    }
}
