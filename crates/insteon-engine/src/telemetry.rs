//! Metric declarations for the engine.
//!
//! All counters are recorded through the `metrics` facade and are no-ops
//! until the host installs a recorder. Call [`describe_metrics`] once at
//! startup to register descriptions.
//!
//! ```rust
//! use insteon_engine::telemetry::{metric_defs, MetricKind};
//!
//! assert_eq!(metric_defs::DISPATCH_SENT.name, "insteon.dispatch.sent");
//! assert_eq!(metric_defs::DISPATCH_SENT.kind, MetricKind::Counter);
//! ```

use metrics::{describe_counter, describe_histogram, Unit};

/// The kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A histogram for recording distributions.
    Histogram,
}

/// A metric declaration with its metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name.
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// Unit of measurement.
    pub unit: Option<Unit>,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Declare a counter.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Declare a histogram.
    pub const fn histogram(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Histogram,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Set the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Set the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Set the expected label keys.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Pair the declared label keys with `values`, in order. Extra values
    /// are ignored.
    ///
    /// ```rust
    /// use insteon_engine::telemetry::metric_defs;
    ///
    /// let labels = metric_defs::DISPATCH_SENT.labels_for(&["01.02.03".to_string()]);
    /// assert_eq!(labels, vec![("device", "01.02.03".to_string())]);
    /// ```
    pub fn labels_for(&self, values: &[String]) -> Vec<(&'static str, String)> {
        self.labels
            .iter()
            .zip(values)
            .map(|(key, value)| (*key, value.clone()))
            .collect()
    }

    /// Register this metric's description with the recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All engine metrics.
pub mod metric_defs {
    use super::Metric;
    use metrics::Unit;

    /// Label keys attached to per-device metrics.
    pub const DEVICE_LABELS: &[&str] = &["device"];

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Commands put on the wire, first attempts only.
    pub const DISPATCH_SENT: Metric = Metric::counter("insteon.dispatch.sent")
        .with_description("Direct commands sent to devices")
        .with_unit(Unit::Count)
        .with_labels(DEVICE_LABELS);

    /// Resends after a nak or timeout.
    pub const DISPATCH_RETRIES: Metric = Metric::counter("insteon.dispatch.retries")
        .with_description("Direct commands resent after a nak or timeout")
        .with_unit(Unit::Count)
        .with_labels(DEVICE_LABELS);

    /// Naks received for outstanding commands.
    pub const DISPATCH_NAKS: Metric = Metric::counter("insteon.dispatch.naks")
        .with_description("Negative acknowledgements received")
        .with_unit(Unit::Count)
        .with_labels(DEVICE_LABELS);

    /// Reply timeouts.
    pub const DISPATCH_TIMEOUTS: Metric = Metric::counter("insteon.dispatch.timeouts")
        .with_description("Outstanding commands that saw no reply in time")
        .with_unit(Unit::Count)
        .with_labels(DEVICE_LABELS);

    /// Commands failed because their device was removed.
    pub const DISPATCH_CANCELLED: Metric = Metric::counter("insteon.dispatch.cancelled")
        .with_description("Outstanding commands cancelled by device removal")
        .with_unit(Unit::Count)
        .with_labels(DEVICE_LABELS);

    /// Time from first send to ack.
    pub const DISPATCH_LATENCY: Metric = Metric::histogram("insteon.dispatch.latency_ms")
        .with_description("Time from first send to acknowledgement")
        .with_unit(Unit::Milliseconds)
        .with_labels(DEVICE_LABELS);

    // ========================================================================
    // Inbound
    // ========================================================================

    /// Inbound frames that failed to decode.
    pub const FRAMES_DROPPED: Metric = Metric::counter("insteon.frames.dropped")
        .with_description("Inbound frames dropped as malformed")
        .with_unit(Unit::Count);

    /// All declared metrics.
    pub const ALL: &[&Metric] = &[
        &DISPATCH_SENT,
        &DISPATCH_RETRIES,
        &DISPATCH_NAKS,
        &DISPATCH_TIMEOUTS,
        &DISPATCH_CANCELLED,
        &DISPATCH_LATENCY,
        &FRAMES_DROPPED,
    ];
}

/// Register descriptions for every engine metric.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
