use crate::{
    db::{Consistency, SessionError, statement::{StatementKind, TableRef}},
    model::ColumnType,
};
use thiserror::Error as ThisError;

fn target(table: &Option<TableRef>) -> String {
    table
        .as_ref()
        .map_or_else(|| "session".to_string(), ToString::to_string)
}

fn level(consistency: &Option<Consistency>) -> String {
    consistency.map_or_else(|| "default".to_string(), |c| c.to_string())
}

///
/// WriteError
/// A write statement was rejected or failed at the store.
///

#[derive(Debug, ThisError)]
#[error("{statement} on {} failed: {source}", target(.table))]
pub struct WriteError {
    pub table: Option<TableRef>,
    pub statement: StatementKind,
    pub source: SessionError,
}

impl WriteError {
    #[must_use]
    pub fn keyspace(&self) -> Option<&str> {
        self.table.as_ref().map(TableRef::keyspace)
    }

    #[must_use]
    pub fn column_family(&self) -> Option<&str> {
        self.table.as_ref().map(TableRef::column_family)
    }
}

///
/// ReadError
///
/// A query failed, or a returned row could not be mapped back to its
/// entity.
///

#[derive(Debug, ThisError)]
pub enum ReadError {
    #[error("{statement} on {} failed: {source}", target(.table))]
    Query {
        table: Option<TableRef>,
        statement: StatementKind,
        source: SessionError,
    },

    #[error("column '{column}' on {table} is null and its field is not optional")]
    NullColumn { table: TableRef, column: String },

    #[error("column '{column}' on {table} holds {found}, expected {expected}")]
    Decode {
        table: TableRef,
        column: String,
        expected: ColumnType,
        found: &'static str,
    },

    #[error("entity '{entity}' has no field '{field}'")]
    UnknownField { entity: &'static str, field: String },

    #[error("count on {} returned no count column", target(.table))]
    MissingCount { table: Option<TableRef> },
}

///
/// ConsistencyError
///
/// Not enough live replicas acknowledged at the requested level.
/// Never retried by the engine.
///

#[derive(Debug, ThisError)]
#[error(
    "{statement} on {} could not reach consistency {}: {source}",
    target(.table),
    level(.consistency)
)]
pub struct ConsistencyError {
    pub table: Option<TableRef>,
    pub statement: StatementKind,
    pub consistency: Option<Consistency>,
    pub source: SessionError,
}
