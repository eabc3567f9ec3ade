//! Telemetry tests
//!
//! Run the modem under a local recorder and check that every emitted metric
//! is declared, carries its declared label keys, and counts what happened.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use insteon_engine::telemetry::{describe_metrics, metric_defs, MetricKind};
use insteon_engine::{Dimmer, DimmerSettings, DispatchConfig, Modem, ModeRequest};
use insteon_message::{Address, Message, MessageType};
use metrics::{
    Counter, CounterFn, Gauge, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder,
    SharedString, Unit,
};

const MODEM: Address = Address::new(0x44, 0x85, 0x11);
const LIGHT: Address = Address::new(0x01, 0x02, 0x03);
const LAMP: Address = Address::new(0x0a, 0x0b, 0x0c);

// ============================================================================
// Recorder
// ============================================================================

type Labels = Vec<(String, String)>;

#[derive(Default)]
struct Store {
    described: BTreeMap<String, MetricKind>,
    counters: BTreeMap<(String, Labels), u64>,
    histograms: BTreeMap<(String, Labels), usize>,
}

#[derive(Default, Clone)]
struct TestRecorder {
    store: Arc<Mutex<Store>>,
}

struct Handle {
    key: (String, Labels),
    store: Arc<Mutex<Store>>,
}

impl CounterFn for Handle {
    fn increment(&self, value: u64) {
        let mut store = self.store.lock().unwrap();
        *store.counters.entry(self.key.clone()).or_default() += value;
    }

    fn absolute(&self, value: u64) {
        let mut store = self.store.lock().unwrap();
        store.counters.insert(self.key.clone(), value);
    }
}

impl HistogramFn for Handle {
    fn record(&self, _value: f64) {
        let mut store = self.store.lock().unwrap();
        *store.histograms.entry(self.key.clone()).or_default() += 1;
    }
}

impl TestRecorder {
    fn handle(&self, key: &Key) -> Arc<Handle> {
        let labels = key
            .labels()
            .map(|l| (l.key().to_string(), l.value().to_string()))
            .collect();
        Arc::new(Handle {
            key: (key.name().to_string(), labels),
            store: Arc::clone(&self.store),
        })
    }

    fn describe(&self, key: KeyName, kind: MetricKind) {
        let mut store = self.store.lock().unwrap();
        store.described.insert(key.as_str().to_string(), kind);
    }

    fn counter(&self, name: &str, device: Address) -> u64 {
        let key = (name.to_string(), vec![("device".to_string(), device.to_string())]);
        let store = self.store.lock().unwrap();
        store.counters.get(&key).copied().unwrap_or(0)
    }
}

impl Recorder for TestRecorder {
    fn describe_counter(&self, key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        self.describe(key, MetricKind::Counter);
    }

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        self.describe(key, MetricKind::Histogram);
    }

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(self.handle(key))
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(self.handle(key))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn modem() -> Modem {
    let mut modem = Modem::new(MODEM, DispatchConfig::default());
    modem
        .add_device(Dimmer::new(LIGHT, "light", DimmerSettings::default()))
        .unwrap();
    modem
        .add_device(Dimmer::new(LAMP, "lamp", DimmerSettings::default()))
        .unwrap();
    modem
}

fn reply(from: Address, msg_type: MessageType, cmd1: u8, cmd2: u8) -> Message {
    Message::standard(from, MODEM, msg_type, cmd1, cmd2)
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_describe_registers_every_metric() {
    let recorder = TestRecorder::default();
    metrics::with_local_recorder(&recorder, describe_metrics);

    let store = recorder.store.lock().unwrap();
    assert_eq!(store.described.len(), metric_defs::ALL.len());
    for metric in metric_defs::ALL {
        assert_eq!(store.described.get(metric.name), Some(&metric.kind), "{}", metric.name);
    }
}

#[test]
fn test_dispatch_counts_with_declared_labels() {
    let recorder = TestRecorder::default();
    metrics::with_local_recorder(&recorder, || {
        let mut modem = modem();
        let req = ModeRequest::default();

        // Light: nak, resend, ack.
        modem.turn_on(LIGHT, Some(0x80), &req, "", None).unwrap();
        modem.handle_message(&reply(LIGHT, MessageType::DirectNak, 0x11, 0xFF));
        modem.handle_message(&reply(LIGHT, MessageType::DirectAck, 0x11, 0x80));

        // Lamp: timeout and resend, then removal cancels it.
        modem.turn_off(LAMP, &req, "", None).unwrap();
        modem.poll(Instant::now() + Duration::from_secs(60));
        modem.remove_device(LAMP);

        // A stray frame that is too short to decode.
        modem.handle_frame(&[0x00, 0x01]);
    });

    assert_eq!(recorder.counter(metric_defs::DISPATCH_SENT.name, LIGHT), 1);
    assert_eq!(recorder.counter(metric_defs::DISPATCH_NAKS.name, LIGHT), 1);
    assert_eq!(recorder.counter(metric_defs::DISPATCH_RETRIES.name, LIGHT), 1);
    assert_eq!(recorder.counter(metric_defs::DISPATCH_SENT.name, LAMP), 1);
    assert_eq!(recorder.counter(metric_defs::DISPATCH_TIMEOUTS.name, LAMP), 1);
    assert_eq!(recorder.counter(metric_defs::DISPATCH_RETRIES.name, LAMP), 1);
    assert_eq!(recorder.counter(metric_defs::DISPATCH_CANCELLED.name, LAMP), 1);

    let store = recorder.store.lock().unwrap();
    let dropped = (metric_defs::FRAMES_DROPPED.name.to_string(), Vec::new());
    assert_eq!(store.counters.get(&dropped), Some(&1));
    let latency = (
        metric_defs::DISPATCH_LATENCY.name.to_string(),
        vec![("device".to_string(), LIGHT.to_string())],
    );
    assert_eq!(store.histograms.get(&latency), Some(&1));

    let emitted = store.counters.keys().chain(store.histograms.keys());
    for (name, labels) in emitted {
        let metric = metric_defs::ALL
            .iter()
            .find(|m| m.name == name.as_str())
            .unwrap_or_else(|| panic!("undeclared metric {name}"));
        let keys: Vec<&str> = labels.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, metric.labels, "{name}");
    }
}
