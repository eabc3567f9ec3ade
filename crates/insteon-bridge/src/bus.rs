//! Message bus seam.
//!
//! Bridges talk to the broker through [`BusClient`]. [`MemoryBus`] records
//! every call and is what the tests drive; `MqttBus` wraps a
//! `rumqttc::Client` when the `mqtt` feature is enabled.

use std::cell::RefCell;

use crate::error::BridgeResult;

/// Publish/subscribe operations a bridge needs from the broker.
pub trait BusClient {
    /// Subscribe to a topic.
    fn subscribe(&self, topic: &str, qos: u8) -> BridgeResult<()>;

    /// Remove a subscription.
    fn unsubscribe(&self, topic: &str) -> BridgeResult<()>;

    /// Publish a payload.
    fn publish(&self, topic: &str, payload: &str, qos: u8, retain: bool) -> BridgeResult<()>;
}

/// One recorded publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// Topic.
    pub topic: String,
    /// Payload text.
    pub payload: String,
    /// Quality of service.
    pub qos: u8,
    /// Retain flag.
    pub retain: bool,
}

impl Published {
    /// Build a record; handy for comparisons.
    pub fn new(topic: &str, payload: &str, qos: u8, retain: bool) -> Self {
        Published {
            topic: topic.to_string(),
            payload: payload.to_string(),
            qos,
            retain,
        }
    }
}

/// In-process bus that records traffic.
#[derive(Debug, Default)]
pub struct MemoryBus {
    subscribed: RefCell<Vec<(String, u8)>>,
    unsubscribed: RefCell<Vec<String>>,
    published: RefCell<Vec<Published>>,
}

impl MemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscriptions in call order.
    pub fn subscribed(&self) -> Vec<(String, u8)> {
        self.subscribed.borrow().clone()
    }

    /// Unsubscriptions in call order.
    pub fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.borrow().clone()
    }

    /// Publishes in call order.
    pub fn published(&self) -> Vec<Published> {
        self.published.borrow().clone()
    }

    /// Drain the recorded publishes.
    pub fn take_published(&self) -> Vec<Published> {
        std::mem::take(&mut *self.published.borrow_mut())
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.subscribed.borrow_mut().clear();
        self.unsubscribed.borrow_mut().clear();
        self.published.borrow_mut().clear();
    }
}

impl BusClient for MemoryBus {
    fn subscribe(&self, topic: &str, qos: u8) -> BridgeResult<()> {
        self.subscribed.borrow_mut().push((topic.to_string(), qos));
        Ok(())
    }

    fn unsubscribe(&self, topic: &str) -> BridgeResult<()> {
        self.unsubscribed.borrow_mut().push(topic.to_string());
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &str, qos: u8, retain: bool) -> BridgeResult<()> {
        self.published
            .borrow_mut()
            .push(Published::new(topic, payload, qos, retain));
        Ok(())
    }
}

#[cfg(feature = "mqtt")]
pub use self::mqtt_bus::MqttBus;

#[cfg(feature = "mqtt")]
mod mqtt_bus {
    use rumqttc::{Client, QoS};

    use super::BusClient;
    use crate::error::{BridgeError, BridgeResult};

    /// [`BusClient`] backed by a synchronous `rumqttc` client. The caller
    /// drives the matching `rumqttc::Connection`.
    pub struct MqttBus {
        client: Client,
    }

    impl MqttBus {
        /// Wrap a connected client.
        pub fn new(client: Client) -> Self {
            MqttBus { client }
        }
    }

    fn qos(level: u8) -> QoS {
        match level {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactlyOnce,
        }
    }

    impl BusClient for MqttBus {
        fn subscribe(&self, topic: &str, level: u8) -> BridgeResult<()> {
            self.client
                .subscribe(topic, qos(level))
                .map_err(|e| BridgeError::Bus(e.to_string()))
        }

        fn unsubscribe(&self, topic: &str) -> BridgeResult<()> {
            self.client
                .unsubscribe(topic)
                .map_err(|e| BridgeError::Bus(e.to_string()))
        }

        fn publish(&self, topic: &str, payload: &str, level: u8, retain: bool) -> BridgeResult<()> {
            self.client
                .publish(topic, qos(level), retain, payload.as_bytes().to_vec())
                .map_err(|e| BridgeError::Bus(e.to_string()))
        }
    }
}
