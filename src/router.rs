// SPDX-License-Identifier: GPL-2.0
//! Main event loop
//!
//! Physical key, axis and sync events are copied onto the virtual device one
//! frame at a time: events are buffered per source until its `SYN_REPORT`.
//! Force-feedback traffic written to the virtual device by applications is
//! handed to the relay.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::mem;
use std::os::fd::AsFd;

use evdev::{EventType, InputEvent, Synchronization};
use handheld_evdev::VirtualPad;
use tracing::{debug, info, trace, warn};

use crate::error::DaemonError;
use crate::mux::{Multiplexer, Readiness, Ready, Token};
use crate::registry::DeviceRecord;
use crate::relay::ForceFeedbackRelay;

/// Token of the virtual device; physical sources count up from 1
pub const VIRTUAL_TOKEN: Token = Token(0);

/// A monitored physical source and its partial frame
struct Source {
    record: DeviceRecord,
    frame: Vec<InputEvent>,
}

pub struct Router {
    pad: Box<dyn VirtualPad>,
    sources: BTreeMap<Token, Source>,
    relay: ForceFeedbackRelay,
    mux: Multiplexer,
    pad_monitored: bool,
}

impl Router {
    pub fn new(
        pad: Box<dyn VirtualPad>,
        inputs: Vec<DeviceRecord>,
        relay: ForceFeedbackRelay,
        mux: Multiplexer,
    ) -> Self {
        let sources = inputs
            .into_iter()
            .zip(1..)
            .map(|(record, id)| {
                let source = Source {
                    record,
                    frame: Vec::new(),
                };
                (Token(id), source)
            })
            .collect();
        Self {
            pad,
            sources,
            relay,
            mux,
            pad_monitored: false,
        }
    }

    /// Register every input source and the virtual device
    pub fn monitor(&mut self) -> Result<(), DaemonError> {
        for (&token, Source { record, .. }) in &self.sources {
            let Some(fd) = record.poll_fd() else {
                continue;
            };
            self.mux
                .register(fd, token)
                .map_err(|source| DaemonError::Monitor {
                    what: record.path.display().to_string(),
                    source,
                })?;
            debug!("Monitoring {} ({})", record.path.display(), record.category);
        }

        self.mux
            .register(self.pad.as_fd(), VIRTUAL_TOKEN)
            .map_err(|source| DaemonError::Monitor {
                what: "virtual device".to_string(),
                source,
            })?;
        self.pad_monitored = true;
        info!("Monitoring {} sources", self.sources.len() + 1);
        Ok(())
    }

    /// Wait and dispatch forever
    pub fn run(&mut self) -> Result<Infallible, DaemonError> {
        loop {
            let ready = self.mux.wait().map_err(DaemonError::Wait)?;
            for item in ready {
                self.handle_ready(item);
            }
        }
    }

    pub fn handle_ready(&mut self, ready: Ready) {
        match ready.readiness {
            Readiness::Readable => self.read_one(ready.token),
            Readiness::Failed(flags) => {
                debug!("{:?} reported {:?}", ready.token, flags);
                self.close(ready.token);
            }
        }
    }

    fn read_one(&mut self, token: Token) {
        if token == VIRTUAL_TOKEN {
            match self.pad.service(&mut self.relay) {
                Ok(count) => trace!("Handled {} requests on the virtual device", count),
                Err(e) if e.is_would_block() => trace!("Virtual device: nothing to read"),
                Err(e) => warn!("Read from virtual device failed: {}", e),
            }
            return;
        }

        let Some(source) = self.sources.get_mut(&token) else {
            trace!("{:?} is no longer monitored", token);
            return;
        };
        match source.record.fetch_events() {
            Ok(events) => {
                for event in events {
                    self.forward(token, event);
                }
            }
            Err(e) if e.is_would_block() => trace!("{:?}: nothing to read", token),
            Err(e) => warn!("Read from {:?} failed: {}; events dropped", token, e),
        }
    }

    /// Stop monitoring a failed handle.
    ///
    /// A physical source is closed. The virtual device stays alive so
    /// forwarding continues; it is only no longer read.
    fn close(&mut self, token: Token) {
        if token == VIRTUAL_TOKEN {
            if self.pad_monitored {
                if let Err(e) = self.mux.deregister(self.pad.as_fd()) {
                    debug!("Deregistering virtual device: {}", e);
                }
                self.pad_monitored = false;
                warn!("Virtual device reported an error; no longer reading it");
            }
            return;
        }

        let Some(Source { record, .. }) = self.sources.remove(&token) else {
            return;
        };
        if let Some(fd) = record.poll_fd() {
            if let Err(e) = self.mux.deregister(fd) {
                debug!("Deregistering {}: {}", record.path.display(), e);
            }
        }
        warn!("Closing {} ({})", record.path.display(), record.category);
    }

    /// Add one physical event to its source's frame; a `SYN_REPORT`
    /// writes the frame out
    fn forward(&mut self, token: Token, event: InputEvent) {
        let Some(source) = self.sources.get_mut(&token) else {
            return;
        };
        trace!(
            "{:?}: type {} code {} value {}",
            token,
            event.event_type().0,
            event.code(),
            event.value()
        );

        match event.event_type() {
            EventType::SYNCHRONIZATION if event.code() == Synchronization::SYN_REPORT.0 => {
                let frame = mem::take(&mut source.frame);
                if let Err(e) = self.pad.emit(&frame) {
                    warn!("Write to virtual device failed: {}; frame dropped", e);
                }
            }
            EventType::SYNCHRONIZATION if event.code() == Synchronization::SYN_DROPPED.0 => {
                debug!(
                    "{} dropped events; discarding {} buffered",
                    source.record.path.display(),
                    source.frame.len()
                );
                source.frame.clear();
            }
            kind @ (EventType::SYNCHRONIZATION | EventType::ABSOLUTE | EventType::KEY) => {
                // copy without the source timestamp
                source
                    .frame
                    .push(InputEvent::new(kind, event.code(), event.value()));
            }
            kind => debug!("Unhandled {:?} from {}", kind, source.record.path.display()),
        }
    }

    #[cfg(test)]
    pub(crate) fn source_count(&self) -> usize {
        self.sources.len()
    }

    #[cfg(test)]
    pub(crate) fn is_pad_monitored(&self) -> bool {
        self.pad_monitored
    }

    /// One wait with a timeout; returns how many handles were ready
    #[cfg(test)]
    pub(crate) fn turn(&mut self, timeout_ms: u16) -> Result<usize, DaemonError> {
        let ready = self.mux.wait_timeout(timeout_ms).map_err(DaemonError::Wait)?;
        let count = ready.len();
        for item in ready {
            self.handle_ready(item);
        }
        Ok(count)
    }
}
