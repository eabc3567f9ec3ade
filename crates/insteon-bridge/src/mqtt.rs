//! Topic router.
//!
//! [`MqttRouter`] owns the bus handle and one [`DimmerBridge`] per bridged
//! device, and routes each inbound publish to the bridge that owns the
//! topic.

use std::collections::BTreeMap;
use std::rc::Rc;

use insteon_engine::{EngineError, Modem};
use insteon_message::Address;
use tracing::{debug, info};

use crate::bus::BusClient;
use crate::config::{Config, DimmerConfig};
use crate::dimmer::DimmerBridge;
use crate::error::BridgeResult;

/// Routes bus traffic to device bridges.
pub struct MqttRouter {
    bus: Rc<dyn BusClient>,
    qos: u8,
    bridges: BTreeMap<Address, DimmerBridge>,
}

impl MqttRouter {
    /// Create a router with no devices.
    pub fn new(bus: Rc<dyn BusClient>, qos: u8) -> Self {
        MqttRouter {
            bus,
            qos,
            bridges: BTreeMap::new(),
        }
    }

    /// Create a router bridging every device in `config`. The devices must
    /// already be in `modem`.
    pub fn from_config(config: &Config, modem: &mut Modem, bus: Rc<dyn BusClient>) -> BridgeResult<Self> {
        let mut router = MqttRouter::new(bus, config.mqtt.qos);
        for device in &config.devices {
            router.add_dimmer(modem, device.address, &config.dimmer)?;
        }
        Ok(router)
    }

    /// QoS used for subscriptions and publishes.
    pub fn qos(&self) -> u8 {
        self.qos
    }

    /// Bridge a dimmer already held by `modem`, replacing any earlier
    /// bridge for the same address.
    pub fn add_dimmer(
        &mut self,
        modem: &mut Modem,
        address: Address,
        config: &DimmerConfig,
    ) -> BridgeResult<()> {
        let name = modem
            .dimmer(address)
            .ok_or_else(|| EngineError::unknown_device(address))?
            .name()
            .to_string();
        let mut bridge = DimmerBridge::new(address, name)?;
        bridge.load_config(config, self.qos)?;
        bridge.connect(modem, Rc::clone(&self.bus))?;
        info!("[{}] bridged as '{}'", address, bridge.name());
        if let Some(mut old) = self.bridges.insert(address, bridge) {
            old.disconnect(modem);
        }
        Ok(())
    }

    /// Stop bridging a dimmer and drop its subscriptions.
    pub fn remove_dimmer(&mut self, modem: &mut Modem, address: Address) -> BridgeResult<bool> {
        let Some(mut bridge) = self.bridges.remove(&address) else {
            return Ok(false);
        };
        bridge.disconnect(modem);
        bridge.unsubscribe(self.bus.as_ref())?;
        Ok(true)
    }

    /// Bridge for a device.
    pub fn bridge(&self, address: Address) -> Option<&DimmerBridge> {
        self.bridges.get(&address)
    }

    /// Mutable bridge for a device, for reloading its templates.
    pub fn bridge_mut(&mut self, address: Address) -> Option<&mut DimmerBridge> {
        self.bridges.get_mut(&address)
    }

    /// All bridges in address order.
    pub fn bridges(&self) -> impl Iterator<Item = &DimmerBridge> {
        self.bridges.values()
    }

    /// Subscribe every bridge's input topics.
    pub fn subscribe_all(&self) -> BridgeResult<()> {
        for bridge in self.bridges.values() {
            bridge.subscribe(self.bus.as_ref(), self.qos)?;
        }
        Ok(())
    }

    /// Remove every bridge's subscriptions.
    pub fn unsubscribe_all(&self) -> BridgeResult<()> {
        for bridge in self.bridges.values() {
            bridge.unsubscribe(self.bus.as_ref())?;
        }
        Ok(())
    }

    /// Deliver an inbound publish. Returns false if no bridge owns the topic.
    pub fn handle_publish(&self, modem: &mut Modem, topic: &str, payload: &[u8]) -> bool {
        let handled = self
            .bridges
            .values()
            .any(|bridge| bridge.handle_message(modem, topic, payload));
        if !handled {
            debug!("no bridge for topic {}", topic);
        }
        handled
    }
}

impl std::fmt::Debug for MqttRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttRouter")
            .field("qos", &self.qos)
            .field("bridges", &self.bridges)
            .finish()
    }
}
