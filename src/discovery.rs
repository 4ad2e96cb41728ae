// SPDX-License-Identifier: GPL-2.0
//! Scan event nodes and retain the ones to merge

use std::path::Path;

use handheld_evdev::{
    read_capabilities, Capabilities, EvdevHaptic, EvdevSource, HapticDevice, InputDevice,
    InputError,
};
use tracing::{debug, info, trace, warn};

use crate::config::WrapperConfig;
use crate::error::DaemonError;
use crate::registry::{Category, DeviceHandle, DeviceRecord, DeviceSet, Insertion};

/// Access to event nodes, replaceable in tests
pub trait DeviceNodes {
    /// Name and event types of the node, or `None` if it cannot be opened.
    ///
    /// Any handle used for the query is released before returning.
    fn capabilities(&mut self, path: &Path) -> Option<Capabilities>;

    /// Open a key or axis source for non-blocking reads
    fn open_input(&mut self, path: &Path) -> Result<Box<dyn InputDevice>, InputError>;

    /// Open a force-feedback sink with write access
    fn open_haptic(&mut self, path: &Path) -> Result<Box<dyn HapticDevice>, InputError>;
}

/// The real `/dev/input/event*` nodes
#[derive(Debug, Default)]
pub struct EventNodes;

impl DeviceNodes for EventNodes {
    fn capabilities(&mut self, path: &Path) -> Option<Capabilities> {
        read_capabilities(path)
    }

    fn open_input(&mut self, path: &Path) -> Result<Box<dyn InputDevice>, InputError> {
        Ok(Box::new(EvdevSource::open(path)?))
    }

    fn open_haptic(&mut self, path: &Path) -> Result<Box<dyn HapticDevice>, InputError> {
        Ok(Box::new(EvdevHaptic::open(path)?))
    }
}

/// Scan every configured node and retain matching handles.
///
/// A node whose name is on the allow-list is classified once per category it
/// advertises, so one node can yield several records. Key nodes past the
/// key-device limit are skipped without being opened.
pub fn discover(
    nodes: &mut dyn DeviceNodes,
    config: &WrapperConfig,
) -> Result<DeviceSet, DaemonError> {
    let mut devices = DeviceSet::new(config.max_key_devices);

    for index in 0..config.node_count {
        let path = config.node_path(index);
        let Some(caps) = nodes.capabilities(&path) else {
            continue;
        };
        if !config.is_allowed(&caps.name) {
            trace!("Ignoring {} ({:?})", path.display(), caps.name);
            continue;
        }

        for category in Category::ALL {
            if !caps.supports(category.event_type()) {
                continue;
            }
            if !devices.has_room(category) {
                debug!(
                    "{} limit reached, skipping {}",
                    category.label(),
                    path.display()
                );
                continue;
            }

            let handle = match category {
                Category::ForceFeedback => nodes.open_haptic(&path).map(DeviceHandle::Haptic),
                Category::AbsoluteAxis | Category::Key => {
                    nodes.open_input(&path).map(DeviceHandle::Input)
                }
            };
            let handle = match handle {
                Ok(handle) => handle,
                Err(e) => {
                    warn!("Skipping {} for {}: {}", category.label(), path.display(), e);
                    continue;
                }
            };

            info!("Found {}: {}", category.label(), path.display());
            let record = DeviceRecord {
                category,
                path: path.clone(),
                name: caps.name.clone(),
                handle,
            };
            match devices.insert(record) {
                Insertion::Stored => {}
                Insertion::Replaced(old) => {
                    info!(
                        "{} now {}, dropping {}",
                        category.label(),
                        path.display(),
                        old.path.display()
                    );
                }
                Insertion::Rejected(record) => {
                    debug!("{} rejected {}", category.label(), record.path.display());
                }
            }
        }
    }

    if devices.matched() == 0 {
        return Err(DaemonError::NoDevices);
    }
    Ok(devices)
}
