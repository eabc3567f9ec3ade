//! The modem: owner of the device table and the dispatcher.
//!
//! Intents are addressed to a device by address. They fail synchronously
//! with [`EngineError::Configuration`] if the device is unknown; otherwise
//! the command is queued and the optional completion runs exactly once when
//! it resolves. Inbound traffic enters through [`Modem::handle_bytes`] or
//! [`Modem::handle_message`], and the host drives timeouts with
//! [`Modem::poll`].

use std::collections::BTreeMap;
use std::time::Instant;

use insteon_message::{Address, Message, MessageReader};
use tracing::{debug, warn};

use crate::device::Device;
use crate::dimmer::{Dimmer, ModeRequest};
use crate::dispatch::{DispatchConfig, Resolution};
use crate::error::{EngineError, EngineResult};
use crate::protocol::{OnDone, Pending, Protocol};
use crate::telemetry::metric_defs;

/// Modem and its known devices.
#[derive(Debug)]
pub struct Modem {
    protocol: Protocol,
    devices: BTreeMap<Address, Device>,
    reader: MessageReader,
}

impl Modem {
    /// Create a modem with no devices.
    pub fn new(address: Address, config: DispatchConfig) -> Self {
        Modem {
            protocol: Protocol::new(address, config),
            devices: BTreeMap::new(),
            reader: MessageReader::new(),
        }
    }

    /// Modem address.
    pub fn address(&self) -> Address {
        self.protocol.address()
    }

    /// Send context, for inspecting outstanding commands.
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    // ========================================================================
    // Device table
    // ========================================================================

    /// Register a device.
    pub fn add_device(&mut self, device: impl Into<Device>) -> EngineResult<()> {
        let device = device.into();
        let address = device.address();
        if self.devices.contains_key(&address) {
            return Err(EngineError::configuration(format!(
                "device {address} is already registered"
            )));
        }
        debug!("[{}] added device '{}'", address, device.name());
        self.devices.insert(address, device);
        Ok(())
    }

    /// Remove a device, failing its outstanding commands as cancelled.
    pub fn remove_device(&mut self, address: Address) -> Option<Device> {
        let device = self.devices.remove(&address);
        for resolution in self.protocol.dispatcher_mut().cancel_device(address) {
            self.resolve(resolution);
        }
        self.run_ready();
        device
    }

    pub fn device(&self, address: Address) -> Option<&Device> {
        self.devices.get(&address)
    }

    /// All devices, ordered by address.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn dimmer(&self, address: Address) -> Option<&Dimmer> {
        self.devices.get(&address).and_then(Device::as_dimmer)
    }

    pub fn dimmer_mut(&mut self, address: Address) -> Option<&mut Dimmer> {
        self.devices.get_mut(&address).and_then(Device::as_dimmer_mut)
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Turn a dimmer on.
    pub fn turn_on(
        &mut self,
        address: Address,
        level: Option<u8>,
        req: &ModeRequest,
        reason: &str,
        on_done: Option<OnDone>,
    ) -> EngineResult<()> {
        self.with_dimmer(address, |dimmer, proto| {
            dimmer.turn_on(proto, level, req, reason, on_done)
        })
    }

    /// Turn a dimmer off.
    pub fn turn_off(
        &mut self,
        address: Address,
        req: &ModeRequest,
        reason: &str,
        on_done: Option<OnDone>,
    ) -> EngineResult<()> {
        self.with_dimmer(address, |dimmer, proto| {
            dimmer.turn_off(proto, req, reason, on_done)
        })
    }

    /// Turn a dimmer on or off.
    pub fn set(
        &mut self,
        address: Address,
        is_on: bool,
        level: Option<u8>,
        req: &ModeRequest,
        reason: &str,
        on_done: Option<OnDone>,
    ) -> EngineResult<()> {
        self.with_dimmer(address, |dimmer, proto| {
            dimmer.set(proto, is_on, level, req, reason, on_done)
        })
    }

    /// Change a dimmer's default on-level.
    pub fn set_on_level(
        &mut self,
        address: Address,
        level: u8,
        reason: &str,
        on_done: Option<OnDone>,
    ) -> EngineResult<()> {
        self.with_dimmer(address, |dimmer, proto| {
            dimmer.set_on_level(proto, level, reason, on_done)
        })
    }

    /// Current default on-level of a dimmer.
    pub fn get_on_level(&self, address: Address) -> EngineResult<u8> {
        self.dimmer(address)
            .map(Dimmer::on_level)
            .ok_or_else(|| EngineError::unknown_device(address))
    }

    /// Trigger a scene on a dimmer.
    pub fn scene(
        &mut self,
        address: Address,
        is_on: bool,
        group: Option<u8>,
        reason: &str,
        on_done: Option<OnDone>,
    ) -> EngineResult<()> {
        self.with_dimmer(address, |dimmer, proto| {
            dimmer.scene(proto, is_on, group, reason, on_done)
        })
    }

    /// Request a dimmer's current state.
    pub fn refresh(
        &mut self,
        address: Address,
        reason: &str,
        on_done: Option<OnDone>,
    ) -> EngineResult<()> {
        self.with_dimmer(address, |dimmer, proto| dimmer.refresh(proto, reason, on_done))
    }

    /// Link a dimmer to the modem.
    pub fn pair(&mut self, address: Address, on_done: Option<OnDone>) -> EngineResult<()> {
        let seq = self
            .dimmer(address)
            .ok_or_else(|| EngineError::unknown_device(address))?
            .pair_sequence();
        let on_done: OnDone = match on_done {
            Some(on_done) => on_done,
            None => Box::new(move |_: &mut Modem, result: EngineResult<()>| match result {
                Ok(()) => debug!("[{}] paired", address),
                Err(err) => warn!("[{}] pairing failed: {}", address, err),
            }),
        };
        seq.run(self, on_done);
        self.run_ready();
        Ok(())
    }

    /// Record that the device controls `group` with `remote` as responder.
    pub fn db_add_ctrl_of(
        &mut self,
        address: Address,
        remote: Address,
        group: u8,
        on_done: Option<OnDone>,
    ) -> EngineResult<()> {
        self.with_dimmer(address, |dimmer, proto| {
            let result = dimmer.link_db_mut().add_ctrl_of(remote, group, [0x00; 3]);
            proto.defer(on_done, result);
        })
    }

    /// Record that the device responds to `remote`'s `group`.
    pub fn db_add_resp_of(
        &mut self,
        address: Address,
        remote: Address,
        group: u8,
        on_done: Option<OnDone>,
    ) -> EngineResult<()> {
        self.with_dimmer(address, |dimmer, proto| {
            let result = dimmer.link_db_mut().add_resp_of(remote, group, [0x00; 3]);
            proto.defer(on_done, result);
        })
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Feed raw bytes from the transport. Complete frames are handled in
    /// arrival order; a trailing partial frame is kept for the next call.
    pub fn handle_bytes(&mut self, bytes: &[u8]) {
        self.reader.push(bytes);
        loop {
            match self.reader.next_message() {
                Ok(Some(msg)) => self.handle_message(&msg),
                Ok(None) => break,
                Err(err) => {
                    metrics::counter!(metric_defs::FRAMES_DROPPED.name).increment(1);
                    warn!("dropping frame from stream: {}", err);
                }
            }
        }
    }

    /// Decode and handle one complete frame. Malformed frames are logged
    /// and dropped.
    pub fn handle_frame(&mut self, frame: &[u8]) {
        match Message::decode(frame) {
            Ok(msg) => self.handle_message(&msg),
            Err(err) => {
                metrics::counter!(metric_defs::FRAMES_DROPPED.name).increment(1);
                warn!("dropping frame {}: {}", hex::encode(frame), err);
            }
        }
    }

    /// Handle one inbound message.
    pub fn handle_message(&mut self, msg: &Message) {
        if msg.msg_type().is_direct_reply() {
            match self.protocol.dispatcher_mut().handle_reply(msg) {
                Some(resolution) => self.resolve(resolution),
                None => debug!("unmatched reply {}", msg),
            }
        } else {
            let Modem {
                protocol, devices, ..
            } = self;
            match devices.get_mut(&msg.from()) {
                Some(device) => device.handle_inbound(protocol, msg),
                None => debug!("message from unknown device {}", msg),
            }
        }
        self.run_ready();
    }

    /// Handle reply timeouts.
    pub fn poll(&mut self, now: Instant) {
        for resolution in self.protocol.dispatcher_mut().poll(now) {
            self.resolve(resolution);
        }
        self.run_ready();
    }

    /// Drain messages waiting to be written to the transport.
    pub fn take_outbound(&mut self) -> Vec<Message> {
        self.protocol.dispatcher_mut().take_outbound()
    }

    /// Commands outstanding for a device, head first.
    pub fn pending(&self, address: Address) -> impl Iterator<Item = &Pending> {
        self.protocol.dispatcher().pending(address)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn with_dimmer<F>(&mut self, address: Address, f: F) -> EngineResult<()>
    where
        F: FnOnce(&mut Dimmer, &mut Protocol),
    {
        let Modem {
            protocol, devices, ..
        } = self;
        let dimmer = devices
            .get_mut(&address)
            .and_then(Device::as_dimmer_mut)
            .ok_or_else(|| EngineError::unknown_device(address))?;
        f(dimmer, protocol);
        self.run_ready();
        Ok(())
    }

    /// Start a sequence step against a dimmer, failing the step if the
    /// dimmer is gone.
    pub(crate) fn run_step<F>(&mut self, address: Address, done: OnDone, f: F)
    where
        F: FnOnce(&mut Dimmer, &mut Protocol, OnDone),
    {
        let Modem {
            protocol, devices, ..
        } = self;
        match devices.get_mut(&address).and_then(Device::as_dimmer_mut) {
            Some(dimmer) => f(dimmer, protocol, done),
            None => protocol.defer(Some(done), Err(EngineError::unknown_device(address))),
        }
        self.run_ready();
    }

    fn resolve(&mut self, resolution: Resolution<Pending>) {
        let Resolution {
            handler, outcome, ..
        } = resolution;
        let Pending {
            device,
            action,
            reason,
            on_done,
        } = handler;

        let result = match outcome {
            Ok(reply) => {
                if let Some(target) = self.devices.get_mut(&device) {
                    target.complete(action, &reason, &reply);
                }
                Ok(())
            }
            Err(err) => {
                warn!("[{}] {}", device, err);
                Err(err)
            }
        };
        if let Some(on_done) = on_done {
            on_done(self, result);
        }
    }

    fn run_ready(&mut self) {
        while let Some((on_done, result)) = self.protocol.next_ready() {
            match on_done {
                Some(on_done) => on_done(self, result),
                None => {
                    if let Err(err) = result {
                        warn!("{}", err);
                    }
                }
            }
        }
    }
}
