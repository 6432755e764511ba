//! Metrics emitted by the panel runner.
//!
//! Metrics are declared as [`Metric`] constants so names and descriptions
//! live in one place. Call [`describe_metrics`] once at startup.
//!
//! ```rust
//! use lightpanel_runner::metrics::metric_defs;
//!
//! metrics::counter!(metric_defs::COMMANDS_SENT.name).increment(1);
//! ```

use metrics::{describe_counter, describe_gauge, Unit};

/// The kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
}

/// A metric declaration with its metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "lightpanel.commands.sent").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement.
    pub unit: Unit,
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: Unit::Count,
        }
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            description: "",
            unit: Unit::Count,
        }
    }

    /// Sets the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Registers the description with the installed recorder.
    pub fn describe(&self) {
        match self.kind {
            MetricKind::Counter => describe_counter!(self.name, self.unit, self.description),
            MetricKind::Gauge => describe_gauge!(self.name, self.unit, self.description),
        }
    }
}

/// All metrics used by the runner.
pub mod metric_defs {
    use super::Metric;

    /// Lines written to the panel.
    pub const COMMANDS_SENT: Metric = Metric::counter("lightpanel.commands.sent")
        .with_description("Command lines written to the panel");

    /// Acknowledgements matched against a pending command.
    pub const RESPONSES_MATCHED: Metric = Metric::counter("lightpanel.responses.matched")
        .with_description("Inbound lines that acknowledged the pending command");

    /// Lines received while no command was pending.
    pub const LINES_UNSOLICITED: Metric = Metric::counter("lightpanel.lines.unsolicited")
        .with_description("Inbound lines received while no command was pending");

    /// Lines dropped because they did not match the pending acknowledgement.
    pub const LINES_UNMATCHED: Metric = Metric::counter("lightpanel.lines.unmatched")
        .with_description("Inbound lines dropped while waiting for an acknowledgement");

    /// Operations refused by the state machine.
    pub const ERRORS: Metric = Metric::counter("lightpanel.errors")
        .with_description("Operations refused by the panel state machine");

    /// Current lifecycle state code.
    pub const STATE: Metric = Metric::gauge("lightpanel.state")
        .with_description("Current panel lifecycle state (1 disconnected, 3 connected, 99 disconnecting)");

    /// Every metric, for registration.
    pub const ALL: &[Metric] = &[
        COMMANDS_SENT,
        RESPONSES_MATCHED,
        LINES_UNSOLICITED,
        LINES_UNMATCHED,
        ERRORS,
        STATE,
    ];
}

/// Register descriptions for every runner metric.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Install the Prometheus exporter listening on `addr`.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(addr: std::net::SocketAddr) -> Result<(), crate::error::RunnerError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| crate::error::RunnerError::Metrics(e.to_string()))
}
