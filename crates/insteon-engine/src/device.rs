//! Device table entries.

use insteon_message::{Address, Message};

use crate::dimmer::Dimmer;
use crate::protocol::{AckAction, Protocol};

/// A device known to the modem.
#[derive(Debug)]
pub enum Device {
    Dimmer(Dimmer),
}

impl Device {
    pub fn address(&self) -> Address {
        match self {
            Device::Dimmer(dimmer) => dimmer.address(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Device::Dimmer(dimmer) => dimmer.name(),
        }
    }

    pub fn as_dimmer(&self) -> Option<&Dimmer> {
        match self {
            Device::Dimmer(dimmer) => Some(dimmer),
        }
    }

    pub fn as_dimmer_mut(&mut self) -> Option<&mut Dimmer> {
        match self {
            Device::Dimmer(dimmer) => Some(dimmer),
        }
    }

    pub(crate) fn complete(&mut self, action: AckAction, reason: &str, reply: &Message) {
        match self {
            Device::Dimmer(dimmer) => dimmer.complete(action, reason, reply),
        }
    }

    pub(crate) fn handle_inbound(&mut self, proto: &mut Protocol, msg: &Message) {
        match self {
            Device::Dimmer(dimmer) => dimmer.handle_inbound(proto, msg),
        }
    }
}

impl From<Dimmer> for Device {
    fn from(dimmer: Dimmer) -> Self {
        Device::Dimmer(dimmer)
    }
}
