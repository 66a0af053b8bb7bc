use crate::{
    config::ConfigError,
    db::{
        executor::{ConsistencyError, ReadError, WriteError},
        schema::SchemaError,
        statement::TableRef,
    },
    model::{ColumnType, MetadataError},
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Every failure surfaced by the public API.
/// Each variant is returned unmodified from the layer that produced it;
/// nothing in the engine retries.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgumentError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Metadata(_) => ErrorClass::Metadata,
            Self::Schema(_) => ErrorClass::Schema,
            Self::Write(_) => ErrorClass::Write,
            Self::Read(_) => ErrorClass::Read,
            Self::InvalidArgument(_) => ErrorClass::InvalidArgument,
            Self::Consistency(_) => ErrorClass::Consistency,
            Self::Config(_) => ErrorClass::Config,
        }
    }

    /// Local contract violations are raised before any statement is sent.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Metadata | ErrorClass::InvalidArgument | ErrorClass::Config
        )
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}: {self}", self.class())
    }
}

///
/// ErrorClass
/// Error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Metadata,
    Schema,
    Write,
    Read,
    InvalidArgument,
    Consistency,
    Config,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Metadata => "metadata",
            Self::Schema => "schema",
            Self::Write => "write",
            Self::Read => "read",
            Self::InvalidArgument => "invalid_argument",
            Self::Consistency => "consistency",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// InvalidArgumentError
///
/// A caller-supplied argument cannot be compiled into a statement.
///

#[derive(Debug, ThisError)]
pub enum InvalidArgumentError {
    #[error("{what} must not be null")]
    Null { what: &'static str },

    #[error("{what} must not be empty")]
    Empty { what: &'static str },

    #[error("column '{column}' on {table} expects {expected}, got {found}")]
    TypeMismatch {
        table: TableRef,
        column: String,
        expected: ColumnType,
        found: &'static str,
    },

    #[error("unknown column '{column}' on {table}")]
    UnknownColumn { table: TableRef, column: String },

    #[error("column '{column}' on {table} is part of the primary key and cannot be {action}")]
    PrimaryKeyColumn {
        table: TableRef,
        column: String,
        action: &'static str,
    },

    #[error("column '{column}' on {table} maps to a required field and cannot be deleted")]
    RequiredColumn { table: TableRef, column: String },

    #[error("entity '{entity}' declares no secondary index")]
    NoSecondaryIndex { entity: &'static str },

    #[error("column '{column}' on {table} is not a secondary index")]
    NotIndexed { table: TableRef, column: String },

    #[error("{statement} statement is incomplete: {reason}")]
    Incomplete {
        statement: &'static str,
        reason: &'static str,
    },

    #[error("batch member must be an insert, update, or delete, got {kind}")]
    InvalidBatchMember { kind: &'static str },
}
