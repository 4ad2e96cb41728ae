// SPDX-License-Identifier: GPL-2.0
//! Absolute axis parameters

use evdev::{AbsInfo, AbsoluteAxisType, UinputAbsSetup};

use crate::error::InputError;

/// Highest absolute axis code the kernel accepts
pub const ABS_MAX: u16 = 0x3f;

/// Range and filtering of one absolute axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisInfo {
    pub value: i32,
    pub minimum: i32,
    pub maximum: i32,
    pub fuzz: i32,
    pub flat: i32,
    pub resolution: i32,
}

/// An axis code with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSetup {
    pub code: u16,
    pub info: AxisInfo,
}

impl AxisSetup {
    pub fn new(code: u16, info: AxisInfo) -> Self {
        Self { code, info }
    }

    /// Apply the checks uinput makes on `UI_ABS_SETUP`
    pub fn validate(&self) -> Result<(), InputError> {
        let reject = |reason| {
            Err(InputError::InvalidAxis {
                code: self.code,
                reason,
            })
        };
        let info = &self.info;
        if self.code > ABS_MAX {
            return reject("code out of range");
        }
        if (info.minimum != 0 || info.maximum != 0) && info.maximum < info.minimum {
            return reject("maximum below minimum");
        }
        if let Some(range) = info.maximum.checked_sub(info.minimum) {
            if info.flat > range {
                return reject("flat wider than range");
            }
        }
        Ok(())
    }

    pub fn to_uinput(&self) -> UinputAbsSetup {
        let info = &self.info;
        UinputAbsSetup::new(
            AbsoluteAxisType(self.code),
            AbsInfo::new(
                info.value,
                info.minimum,
                info.maximum,
                info.fuzz,
                info.flat,
                info.resolution,
            ),
        )
    }
}
