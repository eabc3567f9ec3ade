//! Send context shared by devices.
//!
//! [`Protocol`] bundles the modem address, the dispatcher, and the queue of
//! completions that finished without wire traffic. Devices borrow it to send
//! commands while the modem keeps ownership of the device table.

use std::collections::VecDeque;

use insteon_message::{Address, Message, MessageType, EXT_DATA_SIZE};

use crate::dispatch::{AckMatcher, DispatchConfig, Dispatcher};
use crate::error::EngineError;
use crate::modem::Modem;
use crate::sequence::Completion;

/// Completion for an intent sent through the modem.
pub type OnDone = Completion<Modem>;

/// What to do with a device's state when its command is acked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckAction {
    /// Update level and mode from the ack's command bytes.
    Level,
    /// Store a new default on-level.
    OnLevel(u8),
    /// Scene triggered; state arrives separately.
    Scene,
    /// Status reply: level in cmd2, link-db delta in cmd1.
    Refresh,
}

/// Handler stored with each outstanding command.
pub struct Pending {
    /// Target device.
    pub device: Address,
    /// State update to apply on ack.
    pub action: AckAction,
    /// Caller-supplied reason, carried into emitted events.
    pub reason: String,
    /// Caller's completion.
    pub on_done: Option<OnDone>,
}

impl std::fmt::Debug for Pending {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending")
            .field("device", &self.device)
            .field("action", &self.action)
            .field("reason", &self.reason)
            .field("on_done", &self.on_done.is_some())
            .finish()
    }
}

/// Outbound side of the modem.
pub struct Protocol {
    address: Address,
    dispatcher: Dispatcher<Pending>,
    ready: VecDeque<(Option<OnDone>, Result<(), EngineError>)>,
}

impl std::fmt::Debug for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protocol")
            .field("address", &self.address)
            .field("dispatcher", &self.dispatcher)
            .field("ready", &self.ready.len())
            .finish()
    }
}

impl Protocol {
    /// Create the send context for a modem.
    pub fn new(address: Address, config: DispatchConfig) -> Self {
        Protocol {
            address,
            dispatcher: Dispatcher::new(config),
            ready: VecDeque::new(),
        }
    }

    /// Modem address, used as the source of every outbound message.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Outstanding-command tracker.
    pub fn dispatcher(&self) -> &Dispatcher<Pending> {
        &self.dispatcher
    }

    pub(crate) fn dispatcher_mut(&mut self) -> &mut Dispatcher<Pending> {
        &mut self.dispatcher
    }

    /// Send a standard direct command to a device.
    pub fn send_standard(
        &mut self,
        to: Address,
        cmd1: u8,
        cmd2: u8,
        matcher: AckMatcher,
        pending: Pending,
    ) {
        let msg = Message::standard(self.address, to, MessageType::Direct, cmd1, cmd2);
        self.dispatcher.send(msg, matcher, pending, None);
    }

    /// Send an extended direct command to a device.
    pub fn send_extended(
        &mut self,
        to: Address,
        cmd1: u8,
        cmd2: u8,
        data: [u8; EXT_DATA_SIZE],
        pending: Pending,
    ) {
        let msg = Message::extended(self.address, to, MessageType::Direct, cmd1, cmd2, data);
        self.dispatcher.send(msg, AckMatcher::Command, pending, None);
    }

    /// Queue a completion that finished without wire traffic. It runs once
    /// the current operation returns to the modem.
    pub fn defer(&mut self, on_done: Option<OnDone>, result: Result<(), EngineError>) {
        self.ready.push_back((on_done, result));
    }

    pub(crate) fn next_ready(&mut self) -> Option<(Option<OnDone>, Result<(), EngineError>)> {
        self.ready.pop_front()
    }
}
