//! Insteon MQTT bridge
//!
//! Connects dimmers held by an [`insteon_engine::Modem`] to a
//! publish/subscribe bus. Device state changes are rendered through
//! payload templates and published; messages on input topics are rendered
//! into commands and handed to the modem.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use insteon_bridge::{MemoryBus, MqttRouter};
//! use insteon_engine::{Dimmer, DimmerSettings, DispatchConfig, Modem};
//! use insteon_message::Address;
//!
//! let light = Address::new(0x01, 0x02, 0x03);
//! let mut modem = Modem::new(Address::new(0x44, 0x85, 0x11), DispatchConfig::default());
//! modem.add_device(Dimmer::new(light, "kitchen", DimmerSettings::default())).unwrap();
//!
//! let bus = Rc::new(MemoryBus::new());
//! let mut router = MqttRouter::new(bus.clone(), 1);
//! router.add_dimmer(&mut modem, light, &Default::default()).unwrap();
//!
//! assert!(router.handle_publish(&mut modem, "insteon/010203/set", b"ON"));
//! assert_eq!(modem.take_outbound()[0].cmd1(), 0x11);
//! ```

pub mod bus;
pub mod config;
pub mod dimmer;
pub mod error;
pub mod mqtt;
pub mod template;
pub mod template_data;

pub use bus::{BusClient, MemoryBus, Published};
#[cfg(feature = "mqtt")]
pub use bus::MqttBus;
pub use config::{Config, DeviceConfig, DimmerConfig, ModemConfig, MqttConfig};
pub use dimmer::{DimmerBridge, InputCommand, InputKind};
pub use error::{BridgeError, BridgeResult};
pub use mqtt::MqttRouter;
pub use template::{Template, TemplateError};
