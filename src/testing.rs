// SPDX-License-Identifier: GPL-2.0
//! In-memory devices for unit tests
//!
//! Pollable fakes are backed by a Unix socket pair so they can sit in a
//! real epoll set. Calls that reach the kernel in production are recorded
//! in a shared [`Journal`] instead.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use evdev::{EventType, FFEffectData, FFEffectKind, FFReplay, FFTrigger, InputEvent};
use handheld_evdev::{
    AxisInfo, AxisSetup, Capabilities, EventSource, FfRequests, HapticDevice, InputDevice,
    InputError, PadDescriptor, VirtualPad,
};

use crate::compose::PadFactory;
use crate::config::WrapperConfig;
use crate::discovery::DeviceNodes;
use crate::registry::{Category, DeviceHandle, DeviceRecord};

/// Type, code and value of an event, without its timestamp
pub type Triple = (u16, u16, i32);

pub fn triple(event: &InputEvent) -> Triple {
    (event.event_type().0, event.code(), event.value())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// One frame written to the virtual device
    PadEmit(Vec<Triple>),
    EndUpload { request_id: u32, retval: i32 },
    EndErase { request_id: u32, retval: i32 },
    /// Upload on the haptic device, with the slot it was given
    HapticUpload(i16),
    HapticErase(i16),
    HapticWrite(Triple),
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Call>>>);

impl Journal {
    pub fn record(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Batches a fake hands out, one per fetch
#[derive(Debug, Clone, Default)]
pub struct Feed(Rc<RefCell<VecDeque<Result<Vec<InputEvent>, i32>>>>);

impl Feed {
    pub fn push(&self, events: &[InputEvent]) {
        self.0.borrow_mut().push_back(Ok(events.to_vec()));
    }

    /// Next fetch fails with `errno`
    pub fn push_error(&self, errno: i32) {
        self.0.borrow_mut().push_back(Err(errno));
    }

    fn next(&self) -> Result<Vec<InputEvent>, InputError> {
        match self.0.borrow_mut().pop_front() {
            Some(Ok(events)) => Ok(events),
            Some(Err(errno)) => Err(InputError::Io(io::Error::from_raw_os_error(errno))),
            None => Err(InputError::Io(io::Error::from(io::ErrorKind::WouldBlock))),
        }
    }
}

pub fn node_path(index: u32) -> PathBuf {
    WrapperConfig::default().node_path(index)
}

pub fn rumble(strong: u16, weak: u16) -> FFEffectData {
    FFEffectData {
        direction: 0,
        trigger: FFTrigger {
            button: 0,
            interval: 0,
        },
        replay: FFReplay {
            length: 100,
            delay: 0,
        },
        kind: FFEffectKind::Rumble {
            strong_magnitude: strong,
            weak_magnitude: weak,
        },
    }
}

pub fn axis(code: u16, minimum: i32, maximum: i32) -> AxisSetup {
    AxisSetup::new(
        code,
        AxisInfo {
            minimum,
            maximum,
            ..Default::default()
        },
    )
}

/// Key or axis source
#[derive(Debug)]
pub struct FakeInput {
    path: PathBuf,
    socket: UnixStream,
    _peer: UnixStream,
    keys: BTreeSet<u16>,
    axes: Vec<AxisSetup>,
    feed: Feed,
    _guard: Option<HandleGuard>,
}

impl FakeInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (socket, peer) = UnixStream::pair().unwrap();
        Self {
            path: path.into(),
            socket,
            _peer: peer,
            keys: BTreeSet::new(),
            axes: Vec::new(),
            feed: Feed::default(),
            _guard: None,
        }
    }

    pub fn with_keys(mut self, keys: &[u16]) -> Self {
        self.keys = keys.iter().copied().collect();
        self
    }

    pub fn with_axes(mut self, axes: &[AxisSetup]) -> Self {
        self.axes = axes.to_vec();
        self
    }

    pub fn feed(&self) -> Feed {
        self.feed.clone()
    }
}

impl AsFd for FakeInput {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }
}

impl EventSource for FakeInput {
    fn fetch_events(&mut self) -> Result<Vec<InputEvent>, InputError> {
        self.feed.next()
    }
}

impl InputDevice for FakeInput {
    fn path(&self) -> &Path {
        &self.path
    }

    fn key_codes(&self) -> BTreeSet<u16> {
        self.keys.clone()
    }

    fn axes(&self) -> Vec<AxisSetup> {
        self.axes.clone()
    }
}

/// Force-feedback sink assigning slots from a counter
#[derive(Debug)]
pub struct FakeHaptic {
    path: PathBuf,
    journal: Journal,
    next_slot: i16,
    slots: BTreeSet<i16>,
    upload_errno: Option<i32>,
}

impl FakeHaptic {
    pub fn new(journal: &Journal) -> Self {
        Self {
            path: node_path(0),
            journal: journal.clone(),
            next_slot: 0,
            slots: BTreeSet::new(),
            upload_errno: None,
        }
    }

    pub fn first_slot(mut self, slot: i16) -> Self {
        self.next_slot = slot;
        self
    }

    pub fn failing_uploads(mut self, errno: i32) -> Self {
        self.upload_errno = Some(errno);
        self
    }
}

impl HapticDevice for FakeHaptic {
    fn path(&self) -> &Path {
        &self.path
    }

    fn upload_effect(&mut self, _effect: FFEffectData) -> Result<i16, InputError> {
        if let Some(errno) = self.upload_errno {
            return Err(InputError::Io(io::Error::from_raw_os_error(errno)));
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(slot);
        self.journal.record(Call::HapticUpload(slot));
        Ok(slot)
    }

    fn erase_effect(&mut self, slot: i16) -> Result<(), InputError> {
        self.journal.record(Call::HapticErase(slot));
        if !self.slots.remove(&slot) {
            return Err(InputError::UnknownEffect(slot));
        }
        Ok(())
    }

    fn send_event(&mut self, event: InputEvent) -> Result<(), InputError> {
        self.journal.record(Call::HapticWrite(triple(&event)));
        Ok(())
    }
}

/// Traffic an application sends to the virtual device
#[derive(Debug)]
pub enum PadRequest {
    Upload {
        request_id: u32,
        id: i16,
        effect: FFEffectData,
    },
    Erase {
        request_id: u32,
        id: i16,
    },
    Control {
        code: u16,
        value: i32,
    },
}

/// Virtual device with scripted force-feedback requests
#[derive(Debug)]
pub struct FakePad {
    socket: UnixStream,
    _peer: UnixStream,
    journal: Journal,
    descriptor: PadDescriptor,
    requests: VecDeque<PadRequest>,
    fail_writes: bool,
}

impl FakePad {
    pub fn new(journal: &Journal) -> Self {
        Self::with_descriptor(journal, PadDescriptor::new(WrapperConfig::default().identity))
    }

    pub fn with_descriptor(journal: &Journal, descriptor: PadDescriptor) -> Self {
        let (socket, peer) = UnixStream::pair().unwrap();
        Self {
            socket,
            _peer: peer,
            journal: journal.clone(),
            descriptor,
            requests: VecDeque::new(),
            fail_writes: false,
        }
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn queue(&mut self, request: PadRequest) {
        self.requests.push_back(request);
    }
}

impl AsFd for FakePad {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }
}

impl VirtualPad for FakePad {
    fn emit(&mut self, events: &[InputEvent]) -> Result<(), InputError> {
        if self.fail_writes {
            return Err(InputError::Io(io::Error::from_raw_os_error(libc::ENODEV)));
        }
        self.journal
            .record(Call::PadEmit(events.iter().map(triple).collect()));
        Ok(())
    }

    fn service(&mut self, requests: &mut dyn FfRequests) -> Result<usize, InputError> {
        if self.requests.is_empty() {
            return Err(InputError::Io(io::Error::from(io::ErrorKind::WouldBlock)));
        }
        let mut count = 0;
        while let Some(request) = self.requests.pop_front() {
            match request {
                PadRequest::Upload {
                    request_id,
                    id,
                    effect,
                } => {
                    let retval = requests.upload(id, effect);
                    self.journal.record(Call::EndUpload { request_id, retval });
                }
                PadRequest::Erase { request_id, id } => {
                    let retval = requests.erase(id);
                    self.journal.record(Call::EndErase { request_id, retval });
                }
                PadRequest::Control { code, value } => requests.control(code, value),
            }
            count += 1;
        }
        Ok(count)
    }

    fn descriptor(&self) -> &PadDescriptor {
        &self.descriptor
    }
}

pub struct FakePadFactory {
    journal: Journal,
    fail: bool,
}

impl FakePadFactory {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            fail: false,
        }
    }

    pub fn failing(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            fail: true,
        }
    }
}

impl PadFactory for FakePadFactory {
    fn create(&mut self, descriptor: &PadDescriptor) -> Result<Box<dyn VirtualPad>, InputError> {
        if self.fail {
            return Err(InputError::Open {
                path: PathBuf::from("/dev/uinput"),
                source: io::Error::from_raw_os_error(libc::EACCES),
            });
        }
        Ok(Box::new(FakePad::with_descriptor(
            &self.journal,
            descriptor.clone(),
        )))
    }
}

pub fn input_record(category: Category, input: FakeInput) -> DeviceRecord {
    DeviceRecord {
        category,
        path: input.path.clone(),
        name: match category {
            Category::AbsoluteAxis => "adc-joystick",
            _ => "adc-keys",
        }
        .to_string(),
        handle: DeviceHandle::Input(Box::new(input)),
    }
}

pub fn key_record(index: u32, keys: &[u16]) -> DeviceRecord {
    input_record(
        Category::Key,
        FakeInput::new(node_path(index)).with_keys(keys),
    )
}

pub fn axis_record(index: u32, axes: &[AxisSetup]) -> DeviceRecord {
    input_record(
        Category::AbsoluteAxis,
        FakeInput::new(node_path(index)).with_axes(axes),
    )
}

pub fn haptic_record(journal: &Journal, index: u32) -> DeviceRecord {
    let mut haptic = FakeHaptic::new(journal);
    haptic.path = node_path(index);
    DeviceRecord {
        category: Category::ForceFeedback,
        path: node_path(index),
        name: "pwm-vibrator".to_string(),
        handle: DeviceHandle::Haptic(Box::new(haptic)),
    }
}

/// Counts open handles while alive
#[derive(Debug)]
struct HandleGuard(Rc<Cell<usize>>);

impl HandleGuard {
    fn new(open: &Rc<Cell<usize>>, max: &Rc<Cell<usize>>) -> Self {
        open.set(open.get() + 1);
        max.set(max.get().max(open.get()));
        Self(open.clone())
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

/// Node as seen by [`FakeNodes`]
#[derive(Debug, Clone)]
pub struct FakeNode {
    name: String,
    event_types: Vec<EventType>,
    keys: Vec<u16>,
    axes: Vec<AxisSetup>,
    fail_open: bool,
}

impl FakeNode {
    pub fn new(name: &str, event_types: &[EventType]) -> Self {
        Self {
            name: name.to_string(),
            event_types: event_types.to_vec(),
            keys: Vec::new(),
            axes: Vec::new(),
            fail_open: false,
        }
    }

    pub fn keys(mut self, keys: &[u16]) -> Self {
        self.keys = keys.to_vec();
        self
    }

    pub fn axis(mut self, code: u16, minimum: i32, maximum: i32) -> Self {
        self.axes.push(axis(code, minimum, maximum));
        self
    }

    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCall {
    Input(u32),
    Haptic(u32),
}

/// Scripted `/dev/input` directory
#[derive(Debug, Default)]
pub struct FakeNodes {
    nodes: BTreeMap<PathBuf, (u32, FakeNode)>,
    opened: Vec<NodeCall>,
    open_handles: Rc<Cell<usize>>,
    max_open: Rc<Cell<usize>>,
}

impl FakeNodes {
    pub fn add(&mut self, index: u32, node: FakeNode) {
        self.nodes.insert(node_path(index), (index, node));
    }

    pub fn opened(&self) -> Vec<NodeCall> {
        self.opened.clone()
    }

    /// Most handles open at the same time during the scan
    pub fn max_open_handles(&self) -> usize {
        self.max_open.get()
    }

    fn lookup(&self, path: &Path) -> io::Result<(u32, FakeNode)> {
        self.nodes
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn open_error(path: &Path, source: io::Error) -> InputError {
        InputError::Open {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl DeviceNodes for FakeNodes {
    fn capabilities(&mut self, path: &Path) -> Option<Capabilities> {
        let (_, node) = self.lookup(path).ok()?;
        let _query = HandleGuard::new(&self.open_handles, &self.max_open);
        Some(Capabilities {
            name: node.name.clone(),
            event_types: node.event_types.iter().map(|t| t.0).collect(),
        })
    }

    fn open_input(&mut self, path: &Path) -> Result<Box<dyn InputDevice>, InputError> {
        let (index, node) = self.lookup(path).map_err(|e| Self::open_error(path, e))?;
        self.opened.push(NodeCall::Input(index));
        if node.fail_open {
            return Err(Self::open_error(
                path,
                io::Error::from_raw_os_error(libc::EACCES),
            ));
        }
        let mut input = FakeInput::new(path)
            .with_keys(&node.keys)
            .with_axes(&node.axes);
        input._guard = Some(HandleGuard::new(&self.open_handles, &self.max_open));
        Ok(Box::new(input))
    }

    fn open_haptic(&mut self, path: &Path) -> Result<Box<dyn HapticDevice>, InputError> {
        let (index, node) = self.lookup(path).map_err(|e| Self::open_error(path, e))?;
        self.opened.push(NodeCall::Haptic(index));
        if node.fail_open {
            return Err(Self::open_error(
                path,
                io::Error::from_raw_os_error(libc::EACCES),
            ));
        }
        let mut haptic = FakeHaptic::new(&Journal::default());
        haptic.path = path.to_path_buf();
        Ok(Box::new(haptic))
    }
}
