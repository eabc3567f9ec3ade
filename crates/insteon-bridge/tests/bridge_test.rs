//! Bridge tests
//!
//! Drive dimmers through the template bridge: subscriptions, state and
//! manual publishes, inbound payloads turned into wire commands, and a full
//! configuration loaded from YAML.

use std::rc::Rc;

use insteon_bridge::{
    BridgeError, Config, DimmerBridge, DimmerConfig, MemoryBus, MqttRouter, Published,
};
use insteon_engine::{Dimmer, DimmerSettings, DispatchConfig, Manual, Mode, Modem};
use insteon_message::{Address, Message, MessageType};
use serde_json::json;

const MODEM: Address = Address::new(0x44, 0x85, 0x11);
const LIGHT: Address = Address::new(0x01, 0x02, 0x03);
const NO_RAMP: Address = Address::new(0x04, 0x05, 0x06);

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    modem: Modem,
    bus: Rc<MemoryBus>,
    router: MqttRouter,
}

impl Harness {
    fn new(config: DimmerConfig, qos: u8) -> Self {
        let mut modem = Modem::new(MODEM, DispatchConfig::default());
        modem
            .add_device(Dimmer::new(
                LIGHT,
                "device name",
                DimmerSettings {
                    on_off_ramp_supported: true,
                    ..DimmerSettings::default()
                },
            ))
            .unwrap();
        modem
            .add_device(Dimmer::new(NO_RAMP, "no-ramp device", DimmerSettings::default()))
            .unwrap();

        let bus = Rc::new(MemoryBus::new());
        let mut router = MqttRouter::new(bus.clone(), qos);
        router.add_dimmer(&mut modem, LIGHT, &config).unwrap();
        router.add_dimmer(&mut modem, NO_RAMP, &config).unwrap();
        Harness { modem, bus, router }
    }

    fn publish(&mut self, topic: &str, payload: &str) -> bool {
        self.router
            .handle_publish(&mut self.modem, topic, payload.as_bytes())
    }

    fn sent(&mut self) -> Vec<Message> {
        self.modem.take_outbound()
    }

    /// Publish, expect exactly one frame, and return its command bytes.
    fn command(&mut self, topic: &str, payload: &str) -> (u8, u8) {
        assert!(self.publish(topic, payload), "{topic} not handled");
        let sent = self.sent();
        assert_eq!(sent.len(), 1, "{payload}");
        (sent[0].cmd1(), sent[0].cmd2())
    }

    fn ack(&mut self, device: Address, cmd1: u8, cmd2: u8) {
        self.modem.handle_message(&Message::standard(
            device,
            MODEM,
            MessageType::DirectAck,
            cmd1,
            cmd2,
        ));
    }

    /// Publish, ack the resulting frame, and return its command bytes.
    fn command_acked(&mut self, device: Address, topic: &str, payload: &str) -> (u8, u8) {
        let (cmd1, cmd2) = self.command(topic, payload);
        self.ack(device, cmd1, cmd2);
        (cmd1, cmd2)
    }

    fn broadcast(&mut self, cmd1: u8, cmd2: u8) {
        self.modem.handle_message(&Message::standard(
            LIGHT,
            Address::group(1),
            MessageType::AllLinkBroadcast,
            cmd1,
            cmd2,
        ));
    }

    fn pending_reason(&self, device: Address) -> String {
        self.modem.pending(device).next().unwrap().reason.clone()
    }

    fn last_published(&self) -> Published {
        self.bus.published().last().cloned().unwrap()
    }
}

fn config(pairs: &[(&str, &str)]) -> DimmerConfig {
    let mut map = serde_json::Map::new();
    for (key, value) in pairs {
        map.insert((*key).to_string(), json!(value));
    }
    serde_json::from_value(serde_json::Value::Object(map)).unwrap()
}

const TRANSITION_ON_OFF: &str = concat!(
    r#"{ "cmd" : "{{json.state.lower()}}""#,
    r#"{% if json.fast is defined %}, "fast" : {{json.fast}}{% endif %}"#,
    r#"{% if json.instant is defined %}, "instant" : {{json.instant}}{% endif %}"#,
    r#"{% if json.mode is defined %}, "mode" : "{{json.mode.lower()}}"{% endif %}"#,
    r#"{% if json.transition is defined %}, "transition" : {{json.transition}}{% endif %}"#,
    " }"
);

const TRANSITION_LEVEL: &str = concat!(
    r#"{ "cmd" : "{{json.state.lower()}}", "#,
    r#""level" : {% if json.level is defined %}{{json.level}}{% else %}255{% endif %}"#,
    r#"{% if json.fast is defined %}, "fast" : {{json.fast}}{% endif %}"#,
    r#"{% if json.instant is defined %}, "instant" : {{json.instant}}{% endif %}"#,
    r#"{% if json.mode is defined %}, "mode" : "{{json.mode.lower()}}"{% endif %}"#,
    r#"{% if json.transition is defined %}, "transition" : {{json.transition}}{% endif %}"#,
    " }"
);

fn transition_config() -> DimmerConfig {
    config(&[
        ("state_topic", "insteon/{{address}}/state"),
        ("state_payload", "{{on}} {{level_255}}"),
        ("on_off_topic", "insteon/{{address}}/set"),
        ("on_off_payload", TRANSITION_ON_OFF),
        ("level_topic", "insteon/{{address}}/level"),
        ("level_payload", TRANSITION_LEVEL),
    ])
}

// ============================================================================
// Subscriptions and Template Data
// ============================================================================

#[test]
fn test_pubsub_order() {
    let bus = MemoryBus::new();
    let bridge = DimmerBridge::new(LIGHT, "device name").unwrap();

    bridge.subscribe(&bus, 2).unwrap();
    assert_eq!(
        bus.subscribed(),
        vec![
            ("insteon/010203/set".to_string(), 2),
            ("insteon/010203/level".to_string(), 2),
            ("insteon/010203/scene".to_string(), 2),
        ]
    );

    bridge.unsubscribe(&bus).unwrap();
    assert_eq!(
        bus.unsubscribed(),
        vec![
            "insteon/010203/set".to_string(),
            "insteon/010203/level".to_string(),
            "insteon/010203/scene".to_string(),
        ]
    );
}

#[test]
fn test_router_subscribes_all_devices() {
    let h = Harness::new(DimmerConfig::default(), 1);
    h.router.subscribe_all().unwrap();
    let topics: Vec<String> = h.bus.subscribed().into_iter().map(|(t, _)| t).collect();
    assert_eq!(topics.len(), 6);
    assert_eq!(topics[0], "insteon/010203/set");
    assert_eq!(topics[3], "insteon/040506/set");

    h.router.unsubscribe_all().unwrap();
    assert_eq!(h.bus.unsubscribed(), topics);
}

#[test]
fn test_template_data() {
    let bridge = DimmerBridge::new(LIGHT, "device name").unwrap();
    assert_eq!(
        bridge.template_data(None, None, None),
        json!({"address": "010203", "name": "device name"})
    );

    let data = bridge.template_data(Some((0x55, Mode::Fast)), Some(Manual::Stop), Some("something"));
    assert_eq!(data["on"], json!(1));
    assert_eq!(data["on_str"], json!("on"));
    assert_eq!(data["level_255"], json!(85));
    assert_eq!(data["level_100"], json!(33));
    assert_eq!(data["mode"], json!("fast"));
    assert_eq!(data["fast"], json!(1));
    assert_eq!(data["instant"], json!(0));
    assert_eq!(data["manual_str"], json!("stop"));
    assert_eq!(data["manual"], json!(0));
    assert_eq!(data["manual_openhab"], json!(1));
    assert_eq!(data["reason"], json!("something"));

    let data = bridge.template_data(Some((0, Mode::Normal)), None, None);
    assert_eq!(data["on"], json!(0));
    assert_eq!(data["on_str"], json!("off"));
}

// ============================================================================
// Outbound State
// ============================================================================

#[test]
fn test_default_state_publish() {
    let mut h = Harness::new(DimmerConfig::default(), 0);

    h.modem
        .set(LIGHT, true, Some(0x12), &Default::default(), "", None)
        .unwrap();
    h.sent();
    h.ack(LIGHT, 0x11, 0x12);
    h.modem
        .set(LIGHT, false, None, &Default::default(), "", None)
        .unwrap();
    h.sent();
    h.ack(LIGHT, 0x13, 0x00);

    assert_eq!(
        h.bus.take_published(),
        vec![
            Published::new(
                "insteon/010203/state",
                r#"{ "state" : "on", "brightness" : 18 }"#,
                0,
                true
            ),
            Published::new(
                "insteon/010203/state",
                r#"{ "state" : "off", "brightness" : 0 }"#,
                0,
                true
            ),
        ]
    );

    // Manual changes have no default topic.
    h.broadcast(0x17, 0x00);
    h.broadcast(0x18, 0x00);
    assert!(h.bus.published().is_empty());
}

#[test]
fn test_configured_state_and_manual_publish() {
    let config = config(&[
        ("state_topic", "foo/{{address}}"),
        ("state_payload", "{{on}} {{level_255}}"),
        ("manual_state_topic", "bar/{{address}}"),
        ("manual_state_payload", "{{manual}} {{manual_str.upper()}}"),
    ]);
    let mut h = Harness::new(config, 3);

    h.broadcast(0x11, 0x00);
    h.broadcast(0x13, 0x00);
    assert_eq!(
        h.bus.take_published(),
        vec![
            Published::new("foo/010203", "1 255", 3, true),
            Published::new("foo/010203", "0 0", 3, true),
        ]
    );

    h.broadcast(0x17, 0x00);
    h.broadcast(0x18, 0x00);
    assert_eq!(
        h.bus.take_published(),
        vec![
            Published::new("bar/010203", "-1 DOWN", 3, false),
            Published::new("bar/010203", "0 STOP", 3, false),
        ]
    );
}

#[test]
fn test_state_carries_reason() {
    let config = config(&[("state_payload", "{{level_255}} {{reason}}")]);
    let mut h = Harness::new(config, 1);
    h.command_acked(LIGHT, "insteon/010203/set", "ON");
    assert_eq!(h.last_published().payload, "255 ");

    h.broadcast(0x13, 0x00);
    assert_eq!(h.last_published().payload, "0 device");
}

// ============================================================================
// Inbound Commands
// ============================================================================

#[test]
fn test_input_on_off_and_level() {
    let config = config(&[
        ("on_off_topic", "foo/{{address}}"),
        (
            "on_off_payload",
            r#"{ "cmd" : "{{json.on.lower()}}","mode" : "{{json.mode.lower()}}" }"#,
        ),
        ("level_topic", "bar/{{address}}"),
        (
            "level_payload",
            r#"{ "cmd" : "{{json.on.lower()}}","mode" : "{{json.mode.lower()}}","level" : {{json.level}} }"#,
        ),
    ]);
    let mut h = Harness::new(config, 2);
    let (on_off, level) = ("foo/010203", "bar/010203");

    assert_eq!(
        h.command_acked(LIGHT, on_off, r#"{ "on" : "OFF", "mode" : "NORMAL" }"#),
        (0x13, 0x00)
    );
    assert_eq!(
        h.command_acked(LIGHT, on_off, r#"{ "on" : "ON", "mode" : "FAST" }"#),
        (0x12, 0xFF)
    );
    assert_eq!(
        h.command_acked(LIGHT, level, r#"{ "on" : "OFF", "mode" : "NORMAL", "level" : 0 }"#),
        (0x13, 0x00)
    );
    assert_eq!(
        h.command_acked(LIGHT, level, r#"{ "on" : "ON", "mode" : "FAST", "level" : 67 }"#),
        (0x12, 0x43)
    );

    assert!(h.publish(on_off, "asdf"));
    assert!(h.publish(level, "asdf"));
    assert!(h.sent().is_empty());
}

#[test]
fn test_input_uses_default_on_level() {
    let config = config(&[
        ("on_off_topic", "foo/{{address}}"),
        (
            "on_off_payload",
            r#"{ "cmd" : "{{json.on.lower()}}","mode" : "{{json.mode.lower()}}" }"#,
        ),
        ("level_topic", "bar/{{address}}"),
        (
            "level_payload",
            concat!(
                r#"{ "cmd" : "{{json.on.lower()}}","mode" : "{{json.mode.lower()}}""#,
                r#"{% if json.level is defined %},"level" : {{json.level}}{% endif %} }"#
            ),
        ),
    ]);
    let mut h = Harness::new(config, 2);

    assert_eq!(h.modem.get_on_level(LIGHT).unwrap(), 255);
    h.modem.set_on_level(LIGHT, 128, "", None).unwrap();
    let sent = h.sent();
    assert_eq!((sent[0].cmd1(), sent[0].cmd2()), (0x2E, 0x00));
    assert_eq!(&sent[0].data().unwrap()[..3], &[0x01, 0x06, 128]);
    h.ack(LIGHT, 0x2E, 0x00);
    assert_eq!(h.modem.get_on_level(LIGHT).unwrap(), 128);

    let table: [(&str, &str, u8, u8); 11] = [
        ("OFF", "NORMAL", 0x13, 0x00),
        ("ON", "NORMAL", 0x11, 128),
        ("ON", "NORMAL", 0x11, 0xFF),
        ("ON", "NORMAL", 0x11, 128),
        ("OFF", "FAST", 0x14, 0x00),
        ("ON", "FAST", 0x12, 0xFF),
        ("ON", "FAST", 0x12, 0xFF),
        ("OFF", "INSTANT", 0x21, 0x00),
        ("ON", "INSTANT", 0x21, 128),
        ("ON", "INSTANT", 0x21, 0xFF),
        ("ON", "INSTANT", 0x21, 128),
    ];
    for topic in ["foo/010203", "bar/010203"] {
        for (on, mode, cmd1, cmd2) in table {
            let payload = format!(r#"{{ "on" : "{on}", "mode" : "{mode}" }}"#);
            assert_eq!(h.command_acked(LIGHT, topic, &payload), (cmd1, cmd2), "{topic} {payload}");
            assert_eq!(h.modem.dimmer(LIGHT).unwrap().level(), Some(cmd2));
        }
    }
}

#[test]
fn test_input_transition() {
    let mut h = Harness::new(transition_config(), 2);
    let (on_off, level) = ("insteon/010203/set", "insteon/010203/level");

    let cases = [
        (on_off, r#"{ "state" : "OFF", "mode" : "RAMP", "transition" : 32 }"#, (0x2F, 0x08), "0 0"),
        (on_off, r#"{ "state" : "ON", "mode" : "RAMP", "transition" : 90 }"#, (0x2E, 0xF5), "1 255"),
        (level, r#"{ "state" : "OFF", "transition" : 500 }"#, (0x2F, 0x00), "0 0"),
        (level, r#"{ "state" : "ON", "level" : "67", "transition" : 0.3 }"#, (0x2E, 0x4E), "1 79"),
        (level, r#"{ "state" : "OFF", "mode" : "RAMP" }"#, (0x2F, 0x0D), "0 0"),
        (level, r#"{ "state" : "ON", "mode" : "RAMP" }"#, (0x2E, 0xFD), "1 255"),
        // Transition is ignored for fast and instant.
        (level, r#"{ "state" : "OFF", "mode" : "FAST", "transition" : 500 }"#, (0x14, 0x00), "0 0"),
        (
            level,
            r#"{ "state" : "ON", "level" : "67", "mode" : "INSTANT", "transition" : 0.3 }"#,
            (0x21, 0x43),
            "1 67",
        ),
        (level, r#"{ "state" : "OFF", "fast" : 1, "transition" : 500 }"#, (0x14, 0x00), "0 0"),
        (
            level,
            r#"{ "state" : "ON", "level" : "67", "instant" : 1, "transition" : 0.3 }"#,
            (0x21, 0x43),
            "1 67",
        ),
    ];

    for (topic, payload, expected, state) in cases {
        assert_eq!(h.command_acked(LIGHT, topic, payload), expected, "{payload}");
        assert_eq!(
            h.last_published(),
            Published::new("insteon/010203/state", state, 2, true),
            "{payload}"
        );
    }
}

#[test]
fn test_input_transition_without_ramp_support() {
    let mut h = Harness::new(transition_config(), 2);
    let (on_off, level) = ("insteon/040506/set", "insteon/040506/level");

    let cases = [
        (on_off, r#"{ "state" : "OFF", "mode" : "RAMP", "transition" : 32 }"#, (0x13, 0x00)),
        (on_off, r#"{ "state" : "ON", "mode" : "RAMP", "transition" : 90 }"#, (0x11, 0xFF)),
        (level, r#"{ "state" : "OFF", "transition" : 500 }"#, (0x13, 0x00)),
        (level, r#"{ "state" : "ON", "level" : "67", "transition" : 0.3 }"#, (0x11, 0x43)),
        (level, r#"{ "state" : "OFF", "mode" : "RAMP" }"#, (0x13, 0x00)),
        (level, r#"{ "state" : "ON", "mode" : "RAMP" }"#, (0x11, 0xFF)),
    ];
    for (topic, payload, expected) in cases {
        assert_eq!(h.command_acked(NO_RAMP, topic, payload), expected, "{payload}");
    }
}

#[test]
fn test_input_reason_reaches_command() {
    let config = config(&[
        ("on_off_topic", "foo/{{address}}"),
        (
            "on_off_payload",
            r#"{ "cmd" : "{{json.on.lower()}}","mode" : "{{json.mode.lower()}}","reason" : "{{json.reason}}" }"#,
        ),
        ("level_topic", "bar/{{address}}"),
        (
            "level_payload",
            r#"{ "cmd" : "{{json.on.lower()}}","mode" : "{{json.mode.lower()}}","level" : {{json.level}},"reason" : "{{json.reason}}" }"#,
        ),
    ]);
    let mut h = Harness::new(config, 2);

    let cases = [
        ("foo/010203", r#"{ "on" : "OFF", "mode" : "NORMAL", "reason" : "abc" }"#, (0x13, 0x00), "abc"),
        ("foo/010203", r#"{ "on" : "ON", "mode" : "FAST", "reason" : "def" }"#, (0x12, 0xFF), "def"),
        (
            "bar/010203",
            r#"{ "on" : "OFF", "mode" : "NORMAL", "level" : 0, "reason" : "ghi" }"#,
            (0x13, 0x00),
            "ghi",
        ),
        (
            "bar/010203",
            r#"{ "on" : "ON", "mode" : "FAST", "level" : 67, "reason" : "jkl" }"#,
            (0x12, 0x43),
            "jkl",
        ),
    ];
    for (topic, payload, expected, reason) in cases {
        assert_eq!(h.command(topic, payload), expected);
        assert_eq!(h.pending_reason(LIGHT), reason);
        h.ack(LIGHT, expected.0, expected.1);
    }
}

#[test]
fn test_input_scene() {
    let config = config(&[
        ("scene_topic", "foo/{{address}}/scene"),
        (
            "scene_payload",
            r#"{ "cmd" : "{{json.on.lower()}}","reason" : "{% if json.reason is defined %}{{json.reason}}{% endif %}" }"#,
        ),
    ]);
    let mut h = Harness::new(config, 2);
    let topic = "foo/010203/scene";

    for (payload, on_off, reason) in [
        (r#"{ "on" : "OFF", "reason" : "ABC" }"#, 0x13, "ABC"),
        (r#"{ "on" : "ON" }"#, 0x11, ""),
    ] {
        assert!(h.publish(topic, payload));
        let sent = h.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].cmd1(), 0x30);
        assert_eq!(sent[0].data().unwrap()[0], 0x01);
        assert_eq!(sent[0].data().unwrap()[3], on_off);
        assert_eq!(h.pending_reason(LIGHT), reason);
        h.ack(LIGHT, 0x30, 0x00);
    }

    assert!(h.publish(topic, "asdf"));
    assert!(h.sent().is_empty());
}

#[test]
fn test_default_inputs() {
    let mut h = Harness::new(DimmerConfig::default(), 1);
    assert_eq!(h.command_acked(LIGHT, "insteon/010203/set", "OFF"), (0x13, 0x00));
    assert_eq!(
        h.command_acked(
            LIGHT,
            "insteon/010203/level",
            r#"{ "state" : "ON", "brightness" : 128 }"#
        ),
        (0x11, 128)
    );
    assert_eq!(
        h.command_acked(LIGHT, "insteon/010203/level", r#"{ "state" : "ON" }"#),
        (0x11, 0xFF)
    );
    assert_eq!(h.command_acked(LIGHT, "insteon/010203/scene", "on").0, 0x30);
}

#[test]
fn test_malformed_payloads_send_nothing() {
    let mut h = Harness::new(DimmerConfig::default(), 1);
    for (topic, payload) in [
        ("insteon/010203/set", "asdf"),
        ("insteon/010203/set", ""),
        ("insteon/010203/level", "asdf"),
        ("insteon/010203/level", r#"{ "state" : "ON", "brightness" : 300 }"#),
        ("insteon/010203/scene", "maybe"),
    ] {
        assert!(h.publish(topic, payload));
    }
    assert!(h.router.handle_publish(&mut h.modem, "insteon/010203/set", &[0xFF, 0xFE]));
    assert!(h.sent().is_empty());
    assert!(h.modem.protocol().dispatcher().is_idle());
}

#[test]
fn test_foreign_topic_is_not_handled() {
    let mut h = Harness::new(DimmerConfig::default(), 1);
    assert!(!h.publish("insteon/0a0b0c/set", "ON"));
    assert!(!h.publish("other/topic", "ON"));
    assert!(h.sent().is_empty());
}

// ============================================================================
// Configuration Lifecycle
// ============================================================================

#[test]
fn test_disabled_channel_is_not_subscribed() {
    let h = Harness::new(config(&[("scene_topic", ""), ("state_topic", "")]), 1);
    h.router.subscribe_all().unwrap();
    assert!(h.bus.subscribed().iter().all(|(t, _)| !t.ends_with("/scene")));
    assert_eq!(h.bus.subscribed().len(), 4);
}

#[test]
fn test_disabled_state_publishes_nothing() {
    let mut h = Harness::new(config(&[("state_topic", "")]), 1);
    h.command_acked(LIGHT, "insteon/010203/set", "ON");
    assert!(h.bus.published().is_empty());
}

#[test]
fn test_reload_replaces_templates() {
    let mut h = Harness::new(DimmerConfig::default(), 1);
    let reload = config(&[("on_off_topic", "new/{{name}}"), ("state_payload", "{{level_100}}")]);
    h.router
        .bridge_mut(LIGHT)
        .unwrap()
        .load_config(&reload, 1)
        .unwrap();

    assert!(!h.publish("insteon/010203/set", "ON"));
    assert_eq!(h.command_acked(LIGHT, "new/device name", "ON"), (0x11, 0xFF));
    assert_eq!(h.last_published().payload, "100");

    let broken = config(&[("state_payload", "{% if x %}")]);
    let err = h
        .router
        .bridge_mut(LIGHT)
        .unwrap()
        .load_config(&broken, 1)
        .unwrap_err();
    assert!(matches!(err, BridgeError::Template(_)));
    assert_eq!(h.command_acked(LIGHT, "new/device name", "OFF"), (0x13, 0x00));
    assert_eq!(h.last_published().payload, "0");
}

#[test]
fn test_remove_dimmer_stops_bridging() {
    let mut h = Harness::new(DimmerConfig::default(), 1);
    assert!(h.router.remove_dimmer(&mut h.modem, LIGHT).unwrap());
    assert!(!h.router.remove_dimmer(&mut h.modem, LIGHT).unwrap());
    assert_eq!(h.bus.unsubscribed().len(), 3);

    assert!(!h.publish("insteon/010203/set", "ON"));
    h.broadcast(0x11, 0x00);
    assert!(h.bus.published().is_empty());
}

#[test]
fn test_unknown_device_cannot_be_bridged() {
    let mut h = Harness::new(DimmerConfig::default(), 1);
    let err = h
        .router
        .add_dimmer(&mut h.modem, Address::new(9, 9, 9), &DimmerConfig::default())
        .unwrap_err();
    assert!(matches!(err, BridgeError::Engine(_)));
}

#[test]
fn test_yaml_config_end_to_end() {
    let yaml = r#"
modem:
  address: 44.85.11
mqtt:
  qos: 1
dimmer:
  state_payload: "{{on}} {{level_255}}"
  on_off_payload: >-
    { "cmd" : "{{json.state.lower()}}", "mode" : "{{json.mode}}",
      "transition" : {{json.transition}} }
devices:
  - address: 01.02.03
    name: kitchen
    on_off_ramp_supported: true
"#;
    let config = Config::from_yaml(yaml).unwrap();
    let mut modem = config.build_modem().unwrap();
    let bus = Rc::new(MemoryBus::new());
    let router = MqttRouter::from_config(&config, &mut modem, bus.clone()).unwrap();
    router.subscribe_all().unwrap();
    assert_eq!(bus.subscribed()[0], ("insteon/010203/set".to_string(), 1));

    let payload = br#"{"state":"ON","mode":"RAMP","transition":90}"#;
    assert!(router.handle_publish(&mut modem, "insteon/010203/set", payload));
    let sent = modem.take_outbound();
    assert_eq!(sent.len(), 1);
    assert_eq!((sent[0].cmd1(), sent[0].cmd2()), (0x2E, 0xF5));
    assert!(bus.published().is_empty());

    modem.handle_message(&Message::standard(LIGHT, MODEM, MessageType::DirectAck, 0x2E, 0xF5));
    assert_eq!(
        bus.published(),
        vec![Published::new("insteon/010203/state", "1 255", 1, true)]
    );
}
