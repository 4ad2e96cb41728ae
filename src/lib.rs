// SPDX-License-Identifier: GPL-2.0
//! Handheld gamepad wrapper daemon
//!
//! Merges the vibrator, joystick and button nodes of a handheld into one
//! uinput gamepad and relays force feedback back to the vibrator.

pub mod compose;
pub mod config;
pub mod discovery;
pub mod error;
pub mod mux;
pub mod registry;
pub mod relay;
pub mod router;

#[cfg(test)]
mod testing;

use std::convert::Infallible;

use tracing::info;

pub use config::WrapperConfig;
pub use error::DaemonError;

use compose::{Composer, UinputFactory};
use discovery::{discover, EventNodes};
use mux::Multiplexer;
use relay::ForceFeedbackRelay;
use router::Router;

/// Discover, compose, and route events until a fatal error
pub fn run(config: &WrapperConfig) -> Result<Infallible, DaemonError> {
    let devices = discover(&mut EventNodes, config)?;
    info!("Matched {} device capabilities", devices.matched());

    let pad = Composer::standard().compose(&devices, config, &mut UinputFactory)?;

    let parts = devices.into_parts();
    let relay = ForceFeedbackRelay::new(parts.haptic);
    if !relay.has_haptic() {
        info!("No force-feedback device; effect uploads will be refused");
    }
    let mux = Multiplexer::new().map_err(DaemonError::Multiplexer)?;

    let mut router = Router::new(pad, parts.inputs, relay, mux);
    router.monitor()?;
    router.run()
}
