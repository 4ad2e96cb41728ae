// SPDX-License-Identifier: GPL-2.0
//! Compiled-in wrapper configuration
//!
//! The device set and the virtual identity are fixed for the target
//! hardware; nothing here is read from files or the environment.

use std::path::PathBuf;

use evdev::FFEffectType;
use handheld_evdev::PadIdentity;

/// Node names merged into the virtual device
pub const ALLOWED_NAMES: &[&str] = &[
    "pwm-vibrator",
    "adc-joystick",
    "gpio-keys-control",
    "gpio-keys-vol",
    "adc-keys",
];

/// Effect slots the kernel's memless force-feedback layer provides
pub const MAX_FF_EFFECTS: u32 = 16;

/// `BUS_HOST` from `linux/input.h`
pub const BUS_HOST: u16 = 0x19;

/// Most key devices merged into the virtual device
pub const MAX_KEY_DEVICES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperConfig {
    /// Directory holding the event nodes
    pub node_dir: PathBuf,
    /// Node file name prefix, followed by the index
    pub node_prefix: String,
    /// Indices `0..node_count` are scanned
    pub node_count: u32,
    pub allowed_names: Vec<String>,
    pub max_key_devices: usize,
    pub identity: PadIdentity,
    /// Effect kinds advertised when a force-feedback device is present
    pub ff_effects: Vec<u16>,
    pub ff_effects_max: u32,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            node_dir: PathBuf::from("/dev/input"),
            node_prefix: "event".to_string(),
            node_count: 256,
            allowed_names: ALLOWED_NAMES.iter().map(|s| s.to_string()).collect(),
            max_key_devices: MAX_KEY_DEVICES,
            identity: PadIdentity {
                name: "Virtual Gamepad".to_string(),
                bustype: BUS_HOST,
                vendor: 0x1234,
                product: 0x5678,
                version: 0,
            },
            ff_effects: [
                FFEffectType::FF_RUMBLE,
                FFEffectType::FF_GAIN,
                FFEffectType::FF_PERIODIC,
                FFEffectType::FF_SINE,
                FFEffectType::FF_TRIANGLE,
                FFEffectType::FF_SQUARE,
            ]
            .iter()
            .map(|effect| effect.0)
            .collect(),
            ff_effects_max: MAX_FF_EFFECTS,
        }
    }
}

impl WrapperConfig {
    /// Path of node `index`, e.g. `/dev/input/event3`
    pub fn node_path(&self, index: u32) -> PathBuf {
        self.node_dir.join(format!("{}{}", self.node_prefix, index))
    }

    /// Whether a node with this name takes part in the merge.
    ///
    /// Names compare exactly.
    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed_names.iter().any(|n| n == name)
    }
}
