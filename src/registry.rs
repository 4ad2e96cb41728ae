// SPDX-License-Identifier: GPL-2.0
//! Retained device handles, grouped by capability category
//!
//! Each category owns a bounded collection. The bound and what happens when
//! it is reached are properties of the category, enforced at insertion.

use std::collections::BTreeMap;
use std::os::fd::{AsFd, BorrowedFd};
use std::path::PathBuf;

use evdev::{EventType, InputEvent};
use handheld_evdev::{EventSource, HapticDevice, InputDevice, InputError};

/// Capability a retained handle is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    ForceFeedback,
    AbsoluteAxis,
    Key,
}

impl Category {
    /// Classification order for a matching node
    pub const ALL: [Category; 3] = [
        Category::ForceFeedback,
        Category::AbsoluteAxis,
        Category::Key,
    ];

    /// Event type whose presence puts a node in this category
    pub fn event_type(self) -> EventType {
        match self {
            Category::ForceFeedback => EventType::FORCEFEEDBACK,
            Category::AbsoluteAxis => EventType::ABSOLUTE,
            Category::Key => EventType::KEY,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::ForceFeedback => "EV_FF",
            Category::AbsoluteAxis => "EV_ABS",
            Category::Key => "EV_KEY",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What a full collection does with one more item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// The newest item displaces the last stored one
    ReplaceLast,
    /// The item is refused
    KeepFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bound {
    pub capacity: usize,
    pub overflow: Overflow,
}

/// Outcome of [`Slots::insert`]
#[derive(Debug)]
pub enum Insertion<T> {
    Stored,
    /// Stored; the displaced item is handed back
    Replaced(T),
    /// Not stored; the item is handed back
    Rejected(T),
}

/// Bounded collection
#[derive(Debug)]
pub struct Slots<T> {
    bound: Bound,
    items: Vec<T>,
}

impl<T> Slots<T> {
    pub fn new(bound: Bound) -> Self {
        Self {
            bound,
            items: Vec::with_capacity(bound.capacity),
        }
    }

    /// Whether an insertion would store the item
    pub fn has_room(&self) -> bool {
        self.bound.capacity > 0
            && (self.items.len() < self.bound.capacity
                || self.bound.overflow == Overflow::ReplaceLast)
    }

    pub fn insert(&mut self, item: T) -> Insertion<T> {
        if self.items.len() < self.bound.capacity {
            self.items.push(item);
            return Insertion::Stored;
        }
        match (self.bound.overflow, self.items.last_mut()) {
            (Overflow::ReplaceLast, Some(last)) => {
                Insertion::Replaced(std::mem::replace(last, item))
            }
            _ => Insertion::Rejected(item),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

/// An open handle, typed by how it is used
pub enum DeviceHandle {
    Input(Box<dyn InputDevice>),
    Haptic(Box<dyn HapticDevice>),
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceHandle::Input(dev) => write!(f, "Input({})", dev.path().display()),
            DeviceHandle::Haptic(dev) => write!(f, "Haptic({})", dev.path().display()),
        }
    }
}

/// A retained device: the handle plus where it was found
#[derive(Debug)]
pub struct DeviceRecord {
    pub category: Category,
    pub path: PathBuf,
    pub name: String,
    pub handle: DeviceHandle,
}

impl DeviceRecord {
    pub fn input(&self) -> Option<&dyn InputDevice> {
        match &self.handle {
            DeviceHandle::Input(dev) => Some(dev.as_ref()),
            DeviceHandle::Haptic(_) => None,
        }
    }

    /// Events pending on an input source
    pub fn fetch_events(&mut self) -> Result<Vec<InputEvent>, InputError> {
        match &mut self.handle {
            DeviceHandle::Input(dev) => dev.fetch_events(),
            DeviceHandle::Haptic(_) => Err(InputError::Io(std::io::Error::from(
                std::io::ErrorKind::Unsupported,
            ))),
        }
    }

    /// Pollable fd; force-feedback sinks are write-only traffic
    pub fn poll_fd(&self) -> Option<BorrowedFd<'_>> {
        match &self.handle {
            DeviceHandle::Input(dev) => Some(dev.as_fd()),
            DeviceHandle::Haptic(_) => None,
        }
    }

    pub fn into_haptic(self) -> Option<Box<dyn HapticDevice>> {
        match self.handle {
            DeviceHandle::Haptic(dev) => Some(dev),
            DeviceHandle::Input(_) => None,
        }
    }
}

/// Retained handles split by consumer
pub struct DeviceParts {
    /// Sink for relayed force feedback
    pub haptic: Option<Box<dyn HapticDevice>>,
    /// Axis and key sources, in category then discovery order
    pub inputs: Vec<DeviceRecord>,
}

/// All retained devices
#[derive(Debug)]
pub struct DeviceSet {
    slots: BTreeMap<Category, Slots<DeviceRecord>>,
    matched: usize,
}

impl DeviceSet {
    pub fn new(max_key_devices: usize) -> Self {
        let mut slots = BTreeMap::new();
        for category in Category::ALL {
            slots.insert(category, Slots::new(Self::bound_for(category, max_key_devices)));
        }
        Self { slots, matched: 0 }
    }

    /// One force-feedback sink and one axis source, newest wins;
    /// up to `max_key_devices` key sources, oldest win.
    pub fn bound_for(category: Category, max_key_devices: usize) -> Bound {
        match category {
            Category::ForceFeedback | Category::AbsoluteAxis => Bound {
                capacity: 1,
                overflow: Overflow::ReplaceLast,
            },
            Category::Key => Bound {
                capacity: max_key_devices,
                overflow: Overflow::KeepFirst,
            },
        }
    }

    pub fn has_room(&self, category: Category) -> bool {
        self.slots.get(&category).is_some_and(Slots::has_room)
    }

    /// Store a record under its category.
    ///
    /// Stored and replacing insertions count as matches.
    pub fn insert(&mut self, record: DeviceRecord) -> Insertion<DeviceRecord> {
        let outcome = match self.slots.get_mut(&record.category) {
            Some(slots) => slots.insert(record),
            None => Insertion::Rejected(record),
        };
        if !matches!(outcome, Insertion::Rejected(_)) {
            self.matched += 1;
        }
        outcome
    }

    /// Number of successful insertions
    pub fn matched(&self) -> usize {
        self.matched
    }

    pub fn records(&self, category: Category) -> impl Iterator<Item = &DeviceRecord> {
        self.slots.get(&category).into_iter().flat_map(Slots::iter)
    }

    pub fn count(&self, category: Category) -> usize {
        self.slots.get(&category).map_or(0, Slots::len)
    }

    pub fn into_parts(mut self) -> DeviceParts {
        let haptic = self
            .slots
            .remove(&Category::ForceFeedback)
            .and_then(|slots| slots.into_vec().into_iter().next())
            .and_then(DeviceRecord::into_haptic);
        let inputs = self
            .slots
            .into_values()
            .flat_map(Slots::into_vec)
            .collect();
        DeviceParts { haptic, inputs }
    }
}
