//! Values exposed to payload templates.

use insteon_engine::{Manual, Mode};
use insteon_message::Address;
use serde_json::{Map, Value};

/// Data for rendering a dimmer's output templates.
///
/// Always carries `address` (hex, no dots) and `name`. A level adds `on`,
/// `on_str`, `level_255`, `level_100`, `mode`, and one 0/1 flag per mode
/// name. A manual change adds `manual_str`, `manual`, and
/// `manual_openhab`. `reason` is added when given.
pub fn dimmer_data(
    address: Address,
    name: &str,
    level: Option<(u8, Mode)>,
    manual: Option<Manual>,
    reason: Option<&str>,
) -> Value {
    let mut data = Map::new();
    data.insert("address".into(), Value::from(address.hex()));
    data.insert("name".into(), Value::from(name));

    if let Some((level, mode)) = level {
        let on = level > 0;
        data.insert("on".into(), Value::from(u8::from(on)));
        data.insert("on_str".into(), Value::from(if on { "on" } else { "off" }));
        data.insert("level_255".into(), Value::from(level));
        data.insert("level_100".into(), Value::from(percent(level)));
        data.insert("mode".into(), Value::from(mode.as_str()));
        for flag in Mode::ALL {
            data.insert(flag.as_str().into(), Value::from(u8::from(flag == mode)));
        }
    }

    if let Some(manual) = manual {
        data.insert("manual_str".into(), Value::from(manual.as_str()));
        data.insert("manual".into(), Value::from(manual.as_int()));
        data.insert("manual_openhab".into(), Value::from(manual.as_openhab()));
    }

    if let Some(reason) = reason {
        data.insert("reason".into(), Value::from(reason));
    }

    Value::Object(data)
}

/// Data for rendering an inbound payload template: the raw text as
/// `value` and, if it parses, the JSON document as `json`.
pub fn input_data(payload: &str) -> Value {
    let mut data = Map::new();
    data.insert("value".into(), Value::from(payload));
    if let Ok(json) = serde_json::from_str::<Value>(payload) {
        data.insert("json".into(), json);
    }
    Value::Object(data)
}

fn percent(level: u8) -> u8 {
    (f64::from(level) * 100.0 / 255.0).round() as u8
}
