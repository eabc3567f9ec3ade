//! Dimmer bridge.
//!
//! Publishes a dimmer's state changes and turns messages on its input
//! topics into dimmer intents, all through the configured templates.
//!
//! | Channel        | Direction | Default topic                 | Retained |
//! |----------------|-----------|-------------------------------|----------|
//! | `state`        | out       | `insteon/{{address}}/state`   | yes      |
//! | `manual_state` | out       | disabled                      | no       |
//! | `on_off`       | in        | `insteon/{{address}}/set`     |          |
//! | `level`        | in        | `insteon/{{address}}/level`   |          |
//! | `scene`        | in        | `insteon/{{address}}/scene`   |          |
//!
//! Input payload templates render to a JSON object with `cmd` ("on" or
//! "off") and optionally `level`, `mode`, `transition`, `fast`, `instant`,
//! `group`, and `reason`.

use std::cell::RefCell;
use std::rc::Rc;

use insteon_engine::{DimmerEvent, EngineError, Manual, Mode, ModeRequest, Modem, SignalError, SlotId};
use insteon_message::Address;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::bus::BusClient;
use crate::config::DimmerConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::template::Template;
use crate::template_data::{dimmer_data, input_data};

// ============================================================================
// Default templates
// ============================================================================

/// Topic the dimmer's level state is published on.
pub const DEFAULT_STATE_TOPIC: &str = "insteon/{{address}}/state";
/// Level state payload: on/off plus 0-255 brightness.
pub const DEFAULT_STATE_PAYLOAD: &str =
    r#"{ "state" : "{{on_str.lower()}}", "brightness" : {{level_255}} }"#;
/// Manual change payload. The manual channel has no default topic, so this
/// is only used once a topic is configured.
pub const DEFAULT_MANUAL_STATE_PAYLOAD: &str = r#"{ "manual" : "{{manual_str}}" }"#;
/// Topic accepting plain on/off commands.
pub const DEFAULT_ON_OFF_TOPIC: &str = "insteon/{{address}}/set";
/// Maps a raw `ON`/`OFF` payload to a command.
pub const DEFAULT_ON_OFF_PAYLOAD: &str = r#"{ "cmd" : "{{value.lower()}}" }"#;
/// Topic accepting JSON state and brightness commands.
pub const DEFAULT_LEVEL_TOPIC: &str = "insteon/{{address}}/level";
/// Maps `{"state": .., "brightness": ..}` to a command, full brightness when
/// none is given.
pub const DEFAULT_LEVEL_PAYLOAD: &str = concat!(
    r#"{ "cmd" : "{{json.state.lower()}}", "level" : "#,
    r#"{% if json.brightness is defined %}{{json.brightness}}{% else %}255{% endif %} }"#
);
/// Topic triggering the device's scene.
pub const DEFAULT_SCENE_TOPIC: &str = "insteon/{{address}}/scene";
/// Maps a raw `ON`/`OFF` payload to a scene command.
pub const DEFAULT_SCENE_PAYLOAD: &str = r#"{ "cmd" : "{{value.lower()}}" }"#;

/// Which intent an input topic drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// On/off, optionally with a level.
    OnOff,
    /// Level change.
    Level,
    /// Scene trigger.
    Scene,
}

// ============================================================================
// Channels
// ============================================================================

#[derive(Debug)]
struct Output {
    topic: Template,
    payload: Template,
}

#[derive(Debug)]
struct Input {
    topic: String,
    payload: Template,
}

/// Compiled channel map, shared with the signal subscriber so a reload is
/// seen by the next event.
#[derive(Debug, Default)]
struct Channels {
    qos: u8,
    state: Option<Output>,
    manual_state: Option<Output>,
    on_off: Option<Input>,
    level: Option<Input>,
    scene: Option<Input>,
}

fn enabled<'a>(topic: Option<&'a str>, default: &'a str) -> Option<&'a str> {
    let topic = topic.unwrap_or(default);
    (!topic.trim().is_empty()).then_some(topic)
}

fn output(
    topic: Option<&str>,
    default_topic: &str,
    payload: Option<&str>,
    default_payload: &str,
) -> BridgeResult<Option<Output>> {
    let Some(topic) = enabled(topic, default_topic) else {
        return Ok(None);
    };
    Ok(Some(Output {
        topic: Template::compile(topic)?,
        payload: Template::compile(payload.unwrap_or(default_payload))?,
    }))
}

fn input(
    ident: &Value,
    topic: Option<&str>,
    default_topic: &str,
    payload: Option<&str>,
    default_payload: &str,
) -> BridgeResult<Option<Input>> {
    let Some(topic) = enabled(topic, default_topic) else {
        return Ok(None);
    };
    Ok(Some(Input {
        topic: Template::compile(topic)?.render(ident)?,
        payload: Template::compile(payload.unwrap_or(default_payload))?,
    }))
}

impl Channels {
    fn compile(address: Address, name: &str, c: &DimmerConfig, qos: u8) -> BridgeResult<Self> {
        let ident = dimmer_data(address, name, None, None, None);
        Ok(Channels {
            qos,
            state: output(
                c.state_topic.as_deref(),
                DEFAULT_STATE_TOPIC,
                c.state_payload.as_deref(),
                DEFAULT_STATE_PAYLOAD,
            )?,
            manual_state: output(
                c.manual_state_topic.as_deref(),
                "",
                c.manual_state_payload.as_deref(),
                DEFAULT_MANUAL_STATE_PAYLOAD,
            )?,
            on_off: input(
                &ident,
                c.on_off_topic.as_deref(),
                DEFAULT_ON_OFF_TOPIC,
                c.on_off_payload.as_deref(),
                DEFAULT_ON_OFF_PAYLOAD,
            )?,
            level: input(
                &ident,
                c.level_topic.as_deref(),
                DEFAULT_LEVEL_TOPIC,
                c.level_payload.as_deref(),
                DEFAULT_LEVEL_PAYLOAD,
            )?,
            scene: input(
                &ident,
                c.scene_topic.as_deref(),
                DEFAULT_SCENE_TOPIC,
                c.scene_payload.as_deref(),
                DEFAULT_SCENE_PAYLOAD,
            )?,
        })
    }

    /// Inputs in subscription order.
    fn inputs(&self) -> impl Iterator<Item = (InputKind, &Input)> {
        [
            (InputKind::OnOff, &self.on_off),
            (InputKind::Level, &self.level),
            (InputKind::Scene, &self.scene),
        ]
        .into_iter()
        .filter_map(|(kind, input)| input.as_ref().map(|input| (kind, input)))
    }

    fn publish_event(
        &self,
        bus: &dyn BusClient,
        address: Address,
        name: &str,
        event: &DimmerEvent,
    ) -> BridgeResult<()> {
        let (output, data, retain) = match event {
            DimmerEvent::LevelChanged {
                level,
                mode,
                reason,
                ..
            } => (
                &self.state,
                dimmer_data(address, name, Some((*level, *mode)), None, Some(reason.as_str())),
                true,
            ),
            DimmerEvent::Manual { manual, reason, .. } => (
                &self.manual_state,
                dimmer_data(address, name, None, Some(*manual), Some(reason.as_str())),
                false,
            ),
        };
        let Some(output) = output else {
            return Ok(());
        };
        let topic = output.topic.render(&data)?;
        let payload = output.payload.render(&data)?;
        debug!("[{}] publish {} '{}'", address, topic, payload);
        bus.publish(&topic, &payload, self.qos, retain)
    }
}

// ============================================================================
// Inbound Commands
// ============================================================================

/// A rendered input payload, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct InputCommand {
    /// On or off.
    pub is_on: bool,
    /// Requested level.
    pub level: Option<u8>,
    /// Mode selection.
    pub req: ModeRequest,
    /// Scene group.
    pub group: Option<u8>,
    /// Caller-supplied reason.
    pub reason: String,
}

impl InputCommand {
    /// Parse the JSON text an input template rendered.
    pub fn parse(topic: &str, rendered: &str) -> BridgeResult<Self> {
        let value: Value = serde_json::from_str(rendered).map_err(|e| {
            BridgeError::payload(topic, format!("rendered payload '{rendered}' is not JSON: {e}"))
        })?;
        let Value::Object(fields) = value else {
            return Err(BridgeError::payload(topic, "rendered payload is not an object"));
        };
        let fields = Fields { topic, map: &fields };

        let is_on = match fields.text("cmd")?.map(|c| c.trim().to_ascii_lowercase()).as_deref() {
            Some("on") => true,
            Some("off") => false,
            Some(other) => {
                return Err(BridgeError::payload(topic, format!("invalid cmd '{other}'")));
            }
            None => return Err(BridgeError::payload(topic, "missing 'cmd'")),
        };

        let mode = match fields.text("mode")? {
            Some(mode) if !mode.trim().is_empty() => Some(
                mode.parse::<Mode>()
                    .map_err(|e| BridgeError::payload(topic, e.to_string()))?,
            ),
            _ => None,
        };

        Ok(InputCommand {
            is_on,
            level: fields.byte("level")?,
            req: ModeRequest {
                mode,
                fast: fields.flag("fast")?,
                instant: fields.flag("instant")?,
                transition: fields.number("transition")?,
            },
            group: fields.byte("group")?,
            reason: fields.text("reason")?.unwrap_or_default(),
        })
    }
}

struct Fields<'a> {
    topic: &'a str,
    map: &'a Map<String, Value>,
}

impl Fields<'_> {
    fn get(&self, key: &str) -> Option<&Value> {
        match self.map.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() && key != "reason" => None,
            Some(value) => Some(value),
        }
    }

    fn invalid(&self, key: &str, value: &Value) -> BridgeError {
        BridgeError::payload(self.topic, format!("invalid {key} {value}"))
    }

    fn text(&self, key: &str) -> BridgeResult<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(self.invalid(key, other)),
        }
    }

    fn number(&self, key: &str) -> BridgeResult<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(value @ Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| self.invalid(key, value)),
            Some(other) => Err(self.invalid(key, other)),
        }
    }

    fn byte(&self, key: &str) -> BridgeResult<Option<u8>> {
        match self.number(key)? {
            None => Ok(None),
            Some(n) if (0.0..=255.0).contains(&n) => Ok(Some(n.round() as u8)),
            Some(n) => Err(BridgeError::payload(
                self.topic,
                format!("{key} {n} is out of range 0-255"),
            )),
        }
    }

    fn flag(&self, key: &str) -> BridgeResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::Number(n)) => Ok(Some(n.as_f64() != Some(0.0))),
            Some(value @ Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                _ => Err(self.invalid(key, value)),
            },
            Some(other) => Err(self.invalid(key, other)),
        }
    }
}

// ============================================================================
// Bridge
// ============================================================================

/// Template bridge for one dimmer.
#[derive(Debug)]
pub struct DimmerBridge {
    address: Address,
    name: String,
    channels: Rc<RefCell<Channels>>,
    slot: Option<SlotId>,
}

impl DimmerBridge {
    /// Create a bridge using the default templates and QoS 0.
    pub fn new(address: Address, name: impl Into<String>) -> BridgeResult<Self> {
        let name = name.into();
        let channels = Channels::compile(address, &name, &DimmerConfig::default(), 0)?;
        Ok(DimmerBridge {
            address,
            name,
            channels: Rc::new(RefCell::new(channels)),
            slot: None,
        })
    }

    /// Device address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the channel map with the defaults overlaid by `config`. On
    /// error the previous map stays in place.
    pub fn load_config(&mut self, config: &DimmerConfig, qos: u8) -> BridgeResult<()> {
        let channels = Channels::compile(self.address, &self.name, config, qos)?;
        *self.channels.borrow_mut() = channels;
        Ok(())
    }

    /// Input topics in subscription order.
    pub fn input_topics(&self) -> Vec<(InputKind, String)> {
        self.channels
            .borrow()
            .inputs()
            .map(|(kind, input)| (kind, input.topic.clone()))
            .collect()
    }

    /// Subscribe to the on/off, level, and scene topics, in that order.
    pub fn subscribe(&self, bus: &dyn BusClient, qos: u8) -> BridgeResult<()> {
        for (_, topic) in self.input_topics() {
            bus.subscribe(&topic, qos)?;
        }
        Ok(())
    }

    /// Remove the subscriptions made by [`DimmerBridge::subscribe`].
    pub fn unsubscribe(&self, bus: &dyn BusClient) -> BridgeResult<()> {
        for (_, topic) in self.input_topics() {
            bus.unsubscribe(&topic)?;
        }
        Ok(())
    }

    /// Publish the dimmer's events on `bus`. Replaces an earlier connection.
    pub fn connect(&mut self, modem: &mut Modem, bus: Rc<dyn BusClient>) -> BridgeResult<()> {
        let dimmer = modem
            .dimmer_mut(self.address)
            .ok_or_else(|| EngineError::unknown_device(self.address))?;
        if let Some(slot) = self.slot.take() {
            dimmer.signal_mut().disconnect(slot);
        }

        let channels = Rc::clone(&self.channels);
        let address = self.address;
        let name = self.name.clone();
        let slot = dimmer.signal_mut().connect(move |event: &DimmerEvent| {
            channels
                .borrow()
                .publish_event(bus.as_ref(), address, &name, event)
                .map_err(|e| SignalError::new(e.to_string()))
        });
        self.slot = Some(slot);
        Ok(())
    }

    /// Stop publishing the dimmer's events.
    pub fn disconnect(&mut self, modem: &mut Modem) {
        if let Some(slot) = self.slot.take() {
            if let Some(dimmer) = modem.dimmer_mut(self.address) {
                dimmer.signal_mut().disconnect(slot);
            }
        }
    }

    /// Template data for this dimmer.
    pub fn template_data(
        &self,
        level: Option<(u8, Mode)>,
        manual: Option<Manual>,
        reason: Option<&str>,
    ) -> Value {
        dimmer_data(self.address, &self.name, level, manual, reason)
    }

    /// Handle a message if `topic` is one of this bridge's inputs. Returns
    /// false for foreign topics. Bad payloads are logged and dropped.
    pub fn handle_message(&self, modem: &mut Modem, topic: &str, payload: &[u8]) -> bool {
        let parsed = {
            let channels = self.channels.borrow();
            let Some((kind, input)) = channels.inputs().find(|(_, input)| input.topic == topic) else {
                return false;
            };
            (kind, render_input(input, topic, payload))
        };

        let (kind, command) = parsed;
        let result = command.and_then(|command| self.apply(modem, kind, &command));
        if let Err(err) = result {
            warn!("[{}] dropped message on {}: {}", self.address, topic, err);
        }
        true
    }

    fn apply(&self, modem: &mut Modem, kind: InputKind, command: &InputCommand) -> BridgeResult<()> {
        debug!("[{}] {:?} input {:?}", self.address, kind, command);
        match kind {
            InputKind::OnOff | InputKind::Level => modem.set(
                self.address,
                command.is_on,
                command.level,
                &command.req,
                &command.reason,
                None,
            )?,
            InputKind::Scene => modem.scene(
                self.address,
                command.is_on,
                command.group,
                &command.reason,
                None,
            )?,
        }
        Ok(())
    }
}

fn render_input(input: &Input, topic: &str, payload: &[u8]) -> BridgeResult<InputCommand> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| BridgeError::payload(topic, "payload is not UTF-8"))?;
    let rendered = input.payload.render(&input_data(text))?;
    InputCommand::parse(topic, &rendered)
}
