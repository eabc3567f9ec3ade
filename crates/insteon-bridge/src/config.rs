//! Bridge configuration.
//!
//! Loaded from YAML:
//!
//! ```yaml
//! modem:
//!   address: 44.85.11
//!   timeout_ms: 5000
//!   max_retries: 3
//! mqtt:
//!   broker: localhost
//!   port: 1883
//!   qos: 1
//! dimmer:
//!   state_topic: "insteon/{{address}}/state"
//!   manual_state_topic: ""
//! devices:
//!   - address: 01.02.03
//!     name: kitchen
//!     on_off_ramp_supported: true
//!     on_level: 128
//! ```
//!
//! Every section and key is optional except `modem.address`.

use std::collections::BTreeSet;
use std::path::Path;

use insteon_engine::{Dimmer, DimmerSettings, DispatchConfig, Modem};
use insteon_message::Address;
use serde::Deserialize;

use crate::error::{BridgeError, BridgeResult};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Modem identity and dispatch tuning.
    pub modem: ModemConfig,
    /// Broker connection.
    pub mqtt: MqttConfig,
    /// Dimmer topic and payload templates.
    pub dimmer: DimmerConfig,
    /// Devices to bridge.
    pub devices: Vec<DeviceConfig>,
}

/// Modem section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Modem address; required.
    pub address: Option<Address>,
    /// Reply timeout and retry limit.
    #[serde(flatten)]
    pub dispatch: DispatchConfig,
}

/// Broker section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host.
    pub broker: String,
    /// Broker port.
    pub port: u16,
    /// Client identifier.
    pub client_id: String,
    /// QoS for subscriptions and publishes.
    pub qos: u8,
}

impl Default for MqttConfig {
    fn default() -> Self {
        MqttConfig {
            broker: "localhost".to_string(),
            port: 1883,
            client_id: "insteon-bridge".to_string(),
            qos: 1,
        }
    }
}

/// Dimmer templates. Unset keys fall back to the built-in defaults; a
/// topic set to an empty string disables that channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DimmerConfig {
    /// Level state output topic.
    pub state_topic: Option<String>,
    /// Level state output payload.
    pub state_payload: Option<String>,
    /// Manual change output topic.
    pub manual_state_topic: Option<String>,
    /// Manual change output payload.
    pub manual_state_payload: Option<String>,
    /// On/off input topic.
    pub on_off_topic: Option<String>,
    /// On/off input payload.
    pub on_off_payload: Option<String>,
    /// Level input topic.
    pub level_topic: Option<String>,
    /// Level input payload.
    pub level_payload: Option<String>,
    /// Scene input topic.
    pub scene_topic: Option<String>,
    /// Scene input payload.
    pub scene_payload: Option<String>,
}

/// One bridged dimmer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceConfig {
    /// Device address.
    pub address: Address,
    /// Display name, available to templates.
    #[serde(default)]
    pub name: String,
    /// Ramp support and default on-level.
    #[serde(flatten)]
    pub settings: DimmerSettings,
}

impl Config {
    /// Parse and validate YAML text.
    pub fn from_yaml(text: &str) -> BridgeResult<Self> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.modem.address.is_none() {
            return Err(BridgeError::config("modem.address is required"));
        }
        if self.mqtt.qos > 2 {
            return Err(BridgeError::config(format!(
                "mqtt.qos must be 0, 1, or 2, got {}",
                self.mqtt.qos
            )));
        }
        let mut seen = BTreeSet::new();
        for device in &self.devices {
            if !seen.insert(device.address) {
                return Err(BridgeError::config(format!(
                    "device {} is listed twice",
                    device.address
                )));
            }
        }
        Ok(())
    }

    /// Build a modem holding every configured device.
    pub fn build_modem(&self) -> BridgeResult<Modem> {
        let address = self
            .modem
            .address
            .ok_or_else(|| BridgeError::config("modem.address is required"))?;
        let mut modem = Modem::new(address, self.modem.dispatch);
        for device in &self.devices {
            modem.add_device(Dimmer::new(device.address, &device.name, device.settings))?;
        }
        Ok(modem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
modem:
  address: 44.85.11
  timeout_ms: 2000
mqtt:
  qos: 2
dimmer:
  state_topic: "foo/{{address}}"
  manual_state_topic: ""
devices:
  - address: 01.02.03
    name: kitchen
    on_off_ramp_supported: true
    on_level: 128
  - address: 04.05.06
"#;

    #[test]
    fn test_parse_full() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.modem.address, Some(Address::new(0x44, 0x85, 0x11)));
        assert_eq!(config.modem.dispatch.timeout_ms, 2000);
        assert_eq!(config.modem.dispatch.max_retries, 3);
        assert_eq!(config.mqtt.qos, 2);
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.dimmer.state_topic.as_deref(), Some("foo/{{address}}"));
        assert_eq!(config.dimmer.manual_state_topic.as_deref(), Some(""));
        assert_eq!(config.dimmer.on_off_topic, None);

        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].name, "kitchen");
        assert!(config.devices[0].settings.on_off_ramp_supported);
        assert_eq!(config.devices[0].settings.on_level, 128);
        assert_eq!(config.devices[1].settings, DimmerSettings::default());
    }

    #[test]
    fn test_build_modem() {
        let modem = Config::from_yaml(YAML).unwrap().build_modem().unwrap();
        assert_eq!(modem.devices().count(), 2);
        assert_eq!(modem.dimmer(Address::new(1, 2, 3)).unwrap().on_level(), 128);
    }

    #[test]
    fn test_missing_modem_address() {
        let err = Config::from_yaml("devices: []").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_duplicate_device() {
        let yaml = "modem: { address: 44.85.11 }\ndevices:\n  - address: 01.02.03\n  - address: \"010203\"\n";
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn test_bad_qos_and_unknown_key() {
        assert!(Config::from_yaml("modem: { address: 44.85.11 }\nmqtt: { qos: 3 }").is_err());
        assert!(Config::from_yaml("modem: { address: 44.85.11 }\ndimmer: { bogus: x }").is_err());
    }
}
