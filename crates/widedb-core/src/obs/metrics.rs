use crate::{
    db::{SessionErrorKind, statement::StatementKind},
    obs::sink::{MetricsEvent, MetricsSink},
};
use std::sync::atomic::{AtomicU64, Ordering};

///
/// MetricsSnapshot
/// Point-in-time copy of a `CounterSink`.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MetricsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub schema_statements: u64,
    pub finished: u64,
    pub failed: u64,
    pub unavailable: u64,
    pub rows_returned: u64,
    pub schema_created: u64,
}

///
/// CounterSink
///
/// Lock-free process-local counters.
///

#[derive(Debug, Default)]
pub struct CounterSink {
    reads: AtomicU64,
    writes: AtomicU64,
    schema_statements: AtomicU64,
    finished: AtomicU64,
    failed: AtomicU64,
    unavailable: AtomicU64,
    rows_returned: AtomicU64,
    schema_created: AtomicU64,
}

impl CounterSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        MetricsSnapshot {
            reads: load(&self.reads),
            writes: load(&self.writes),
            schema_statements: load(&self.schema_statements),
            finished: load(&self.finished),
            failed: load(&self.failed),
            unavailable: load(&self.unavailable),
            rows_returned: load(&self.rows_returned),
            schema_created: load(&self.schema_created),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.reads,
            &self.writes,
            &self.schema_statements,
            &self.finished,
            &self.failed,
            &self.unavailable,
            &self.rows_returned,
            &self.schema_created,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl MetricsSink for CounterSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::ExecStart { kind } => {
                if kind.is_read() {
                    bump(&self.reads, 1);
                } else if kind.is_schema() {
                    bump(&self.schema_statements, 1);
                } else if kind != StatementKind::Use {
                    bump(&self.writes, 1);
                }
            }
            MetricsEvent::ExecFinish { rows, .. } => {
                bump(&self.finished, 1);
                bump(&self.rows_returned, rows);
            }
            MetricsEvent::ExecFailed { error, .. } => {
                bump(&self.failed, 1);
                if error == SessionErrorKind::Unavailable {
                    bump(&self.unavailable, 1);
                }
            }
            MetricsEvent::SchemaCreated { .. } => bump(&self.schema_created, 1),
        }
    }
}
