mod error;

pub use error::{ConsistencyError, ReadError, WriteError};

use crate::{
    db::{
        Consistency, RowReader, RowSet, Session, SessionError, SessionErrorKind,
        statement::{Statement, StatementKind, TableRef},
    },
    error::Error,
    model::EntityDescriptor,
    obs::sink::{MetricsEvent, MetricsSink},
    traits::EntityValue,
    value::Value,
};
use std::{sync::Arc, time::Duration};

///
/// Executor
///
/// Runs statements against a borrowed session and normalizes every
/// outcome: rows become entities, session failures become typed errors.
/// Each call is independent; the executor holds no per-call state.
///

pub struct Executor<S: Session> {
    session: Arc<S>,
    debug: bool,
    timeout: Option<Duration>,
    sink: Option<Arc<dyn MetricsSink>>,
}

impl<S: Session> Executor<S> {
    #[must_use]
    pub const fn new(session: Arc<S>) -> Self {
        Self {
            session,
            debug: false,
            timeout: None,
            sink: None,
        }
    }

    /// Log every statement at `info` instead of `debug`.
    #[must_use]
    pub const fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Timeout attached to statements that carry none.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub const fn session(&self) -> &Arc<S> {
        &self.session
    }

    pub(crate) fn record(&self, event: MetricsEvent) {
        if let Some(sink) = &self.sink {
            sink.record(event);
        }
    }

    // ------------------------------------------------------------------
    // Session boundary
    // ------------------------------------------------------------------

    /// Execute one statement and report it. Failures are returned as the
    /// session produced them.
    pub fn run(&self, statement: Statement) -> Result<RowSet, SessionError> {
        let statement = if statement.timeout().is_none() {
            statement.with_timeout(self.timeout)
        } else {
            statement
        };
        let kind = statement.kind();

        if self.debug {
            tracing::info!(%kind, consistency = ?statement.consistency(), cql = %statement, "executing statement");
        } else {
            tracing::debug!(%kind, consistency = ?statement.consistency(), cql = %statement, "executing statement");
        }
        self.record(MetricsEvent::ExecStart { kind });

        let result = self.session.execute(&statement);
        self.finish(kind, &result);

        result
    }

    fn run_raw(&self, cql: &str) -> Result<RowSet, SessionError> {
        let kind = StatementKind::Raw;

        if self.debug {
            tracing::info!(%kind, cql, "executing raw statement");
        } else {
            tracing::debug!(%kind, cql, "executing raw statement");
        }
        self.record(MetricsEvent::ExecStart { kind });

        let result = self.session.execute_raw(cql);
        self.finish(kind, &result);

        result
    }

    fn finish(&self, kind: StatementKind, result: &Result<RowSet, SessionError>) {
        match result {
            Ok(rows) => self.record(MetricsEvent::ExecFinish {
                kind,
                rows: rows.len() as u64,
            }),
            Err(err) => {
                tracing::warn!(%kind, error = %err, "statement failed");
                self.record(MetricsEvent::ExecFailed {
                    kind,
                    error: err.kind,
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // Typed execution
    // ------------------------------------------------------------------

    /// Execute a write. Success carries no rows.
    pub fn write(&self, statement: Statement) -> Result<(), Error> {
        self.write_rows(statement).map(|_| ())
    }

    /// Execute a write and keep its rows; conditional writes report
    /// `[applied]` this way.
    pub fn write_rows(&self, statement: Statement) -> Result<RowSet, Error> {
        let context = Context::of(&statement);

        self.run(statement).map_err(|err| context.write_error(err))
    }

    /// Execute a read and return its raw rows.
    pub fn query(&self, statement: Statement) -> Result<RowSet, Error> {
        let context = Context::of(&statement);

        self.run(statement).map_err(|err| context.read_error(err))
    }

    /// Execute a read and map every row to a fresh entity.
    pub fn load<E: EntityValue>(
        &self,
        descriptor: &EntityDescriptor,
        statement: Statement,
    ) -> Result<Vec<E>, Error> {
        let rows = self.query(statement)?;

        rows.iter()
            .map(|row| E::from_row(&RowReader::new(row, descriptor)).map_err(Error::from))
            .collect()
    }

    /// Execute a `COUNT(*)` select.
    pub fn count(&self, statement: Statement) -> Result<u64, Error> {
        let table = statement.table().cloned();
        let rows = self.query(statement)?;

        rows.first()
            .and_then(|row| row.columns().first())
            .and_then(|(_, value)| match value {
                Value::BigInt(n) => u64::try_from(*n).ok(),
                Value::Int(n) => u64::try_from(*n).ok(),
                _ => None,
            })
            .ok_or_else(|| ReadError::MissingCount { table }.into())
    }

    /// Execute raw CQL expected to return rows.
    pub fn raw_query(&self, cql: &str) -> Result<RowSet, Error> {
        self.run_raw(cql)
            .map_err(|err| Context::raw().read_error(err))
    }

    /// Execute raw CQL for its side effects.
    pub fn raw_update(&self, cql: &str) -> Result<(), Error> {
        self.run_raw(cql)
            .map(|_| ())
            .map_err(|err| Context::raw().write_error(err))
    }
}

///
/// Context
/// Statement facts kept for error mapping after the statement is consumed.
///

struct Context {
    table: Option<TableRef>,
    kind: StatementKind,
    consistency: Option<Consistency>,
}

impl Context {
    fn of(statement: &Statement) -> Self {
        Self {
            table: statement.table().cloned(),
            kind: statement.kind(),
            consistency: statement.consistency(),
        }
    }

    const fn raw() -> Self {
        Self {
            table: None,
            kind: StatementKind::Raw,
            consistency: None,
        }
    }

    fn consistency_error(self, source: SessionError) -> Result<ConsistencyError, (Self, SessionError)> {
        if source.kind == SessionErrorKind::Unavailable {
            Ok(ConsistencyError {
                table: self.table,
                statement: self.kind,
                consistency: self.consistency,
                source,
            })
        } else {
            Err((self, source))
        }
    }

    fn write_error(self, source: SessionError) -> Error {
        match self.consistency_error(source) {
            Ok(err) => err.into(),
            Err((ctx, source)) => WriteError {
                table: ctx.table,
                statement: ctx.kind,
                source,
            }
            .into(),
        }
    }

    fn read_error(self, source: SessionError) -> Error {
        match self.consistency_error(source) {
            Ok(err) => err.into(),
            Err((ctx, source)) => ReadError::Query {
                table: ctx.table,
                statement: ctx.kind,
                source,
            }
            .into(),
        }
    }
}
