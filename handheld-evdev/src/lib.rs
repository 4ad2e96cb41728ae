// SPDX-License-Identifier: GPL-2.0
//! evdev and uinput access for the handheld gamepad wrapper
//!
//! A thin layer over the `evdev` crate:
//! - `query`: name and capability queries
//! - `source`: physical key/axis sources and the force-feedback sink
//! - `uinput`: the composite virtual device
//! - `device`: the traits the daemon is written against

pub mod axis;
pub mod device;
pub mod error;
pub mod query;
pub mod source;
pub mod uinput;

pub use axis::{AxisInfo, AxisSetup};
pub use device::{EventSource, FfRequests, HapticDevice, InputDevice, VirtualPad};
pub use error::InputError;
pub use query::{read_capabilities, Capabilities};
pub use source::{EvdevHaptic, EvdevSource};
pub use uinput::{PadDescriptor, PadIdentity, UinputPad};
