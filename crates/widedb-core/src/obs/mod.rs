//! Observability: execution telemetry and sink abstractions.
//!
//! Execution logic never touches counters directly; every event flows
//! through `MetricsEvent` into an optional `MetricsSink`.

pub mod metrics;
pub mod sink;

// re-exports
pub use metrics::{CounterSink, MetricsSnapshot};
pub use sink::{MetricsEvent, MetricsSink};
