// SPDX-License-Identifier: GPL-2.0
//! Capability queries on evdev nodes
//!
//! Every query degrades to "nothing supported" on failure: a node that
//! cannot answer is simply not interesting to the caller.

use std::collections::BTreeSet;
use std::path::Path;

use evdev::{Device, EventType};
use tracing::{debug, trace};

use crate::axis::{AxisInfo, AxisSetup};

/// Name and top-level event types of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub name: String,
    pub event_types: BTreeSet<u16>,
}

impl Capabilities {
    pub fn of(device: &Device) -> Self {
        Self {
            name: device.name().unwrap_or_default().to_string(),
            event_types: device.supported_events().iter().map(|t| t.0).collect(),
        }
    }

    pub fn supports(&self, event_type: EventType) -> bool {
        self.event_types.contains(&event_type.0)
    }
}

/// Open `path`, read its capabilities and close it again.
///
/// `None` if the node cannot be opened or does not answer evdev queries.
pub fn read_capabilities(path: &Path) -> Option<Capabilities> {
    match Device::open(path) {
        Ok(device) => Some(Capabilities::of(&device)),
        Err(e) => {
            trace!("{}: {}", path.display(), e);
            None
        }
    }
}

/// Key codes the device reports
pub fn key_codes(device: &Device) -> BTreeSet<u16> {
    device
        .supported_keys()
        .map(|keys| keys.iter().map(|key| key.code()).collect())
        .unwrap_or_default()
}

/// Every reported absolute axis with its current info.
///
/// Empty if the axis state cannot be read.
pub fn axis_setups(device: &Device) -> Vec<AxisSetup> {
    let Some(axes) = device.supported_absolute_axes() else {
        return Vec::new();
    };
    let state = match device.get_abs_state() {
        Ok(state) => state,
        Err(e) => {
            debug!("Axis query failed: {}", e);
            return Vec::new();
        }
    };

    axes.iter()
        .filter_map(|axis| {
            let abs = state.get(axis.0 as usize)?;
            Some(AxisSetup::new(
                axis.0,
                AxisInfo {
                    value: abs.value,
                    minimum: abs.minimum,
                    maximum: abs.maximum,
                    fuzz: abs.fuzz,
                    flat: abs.flat,
                    resolution: abs.resolution,
                },
            ))
        })
        .collect()
}
