//! Insteon device engine
//!
//! Sans-I/O protocol engine for Insteon devices. The [`Modem`] owns the
//! device table and a [`Dispatcher`] that serializes direct commands per
//! device, retries on nak or timeout, and resolves each command exactly
//! once. Devices turn intents into commands and turn acks and broadcasts
//! into state changes published on a per-device [`Signal`].
//!
//! # Example
//!
//! ```rust
//! use insteon_engine::{Dimmer, DimmerSettings, DispatchConfig, Modem, ModeRequest};
//! use insteon_message::{Address, Message, MessageType};
//!
//! let modem_addr = Address::new(0x44, 0x85, 0x11);
//! let light = Address::new(0x01, 0x02, 0x03);
//!
//! let mut modem = Modem::new(modem_addr, DispatchConfig::default());
//! modem
//!     .add_device(Dimmer::new(light, "kitchen", DimmerSettings::default()))
//!     .unwrap();
//!
//! modem.turn_on(light, Some(0x80), &ModeRequest::default(), "", None).unwrap();
//! let sent = modem.take_outbound();
//! assert_eq!((sent[0].cmd1(), sent[0].cmd2()), (0x11, 0x80));
//!
//! let ack = Message::standard(light, modem_addr, MessageType::DirectAck, 0x11, 0x80);
//! modem.handle_message(&ack);
//! assert_eq!(modem.dimmer(light).unwrap().level(), Some(0x80));
//! ```

pub mod device;
pub mod dimmer;
pub mod dispatch;
pub mod error;
pub mod link_db;
pub mod modem;
pub mod on_off;
pub mod protocol;
pub mod ramp;
pub mod sequence;
pub mod signal;
pub mod telemetry;

pub use device::Device;
pub use dimmer::{Dimmer, DimmerCommand, DimmerEvent, DimmerSettings, ModeRequest, REASON_DEVICE};
pub use dispatch::{AckMatcher, DispatchConfig, Dispatcher, Resolution};
pub use error::{EngineError, EngineResult, SignalError};
pub use link_db::{LinkDatabase, LinkRecord, MemoryLinkDb};
pub use modem::Modem;
pub use on_off::{Manual, Mode};
pub use protocol::{AckAction, OnDone, Pending, Protocol};
pub use sequence::{CommandSeq, Completion};
pub use signal::{Signal, SlotId};
