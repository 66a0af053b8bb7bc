//! Metrics sink boundary.
//!
//! The executor reports through `MetricsEvent` only. A sink is installed
//! per engine; with none installed events are dropped.
use crate::db::{SessionErrorKind, statement::StatementKind};

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    ExecStart {
        kind: StatementKind,
    },
    ExecFinish {
        kind: StatementKind,
        rows: u64,
    },
    ExecFailed {
        kind: StatementKind,
        error: SessionErrorKind,
    },
    SchemaCreated {
        kind: StatementKind,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricsEvent);
}
