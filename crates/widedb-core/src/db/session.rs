use crate::db::{RowSet, statement::Statement};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Session
///
/// Connected, authenticated path to the cluster.
///
/// The engine borrows a session and never serializes access to it;
/// implementations must be safe to share between threads. Timeouts on a
/// statement are passed through as-is and retry policy belongs to the
/// implementation.
///

pub trait Session: Send + Sync {
    /// Execute one compiled statement.
    fn execute(&self, statement: &Statement) -> Result<RowSet, SessionError>;

    /// Execute a raw CQL string.
    fn execute_raw(&self, cql: &str) -> Result<RowSet, SessionError>;
}

///
/// SessionError
///
/// Failure reported by the session. The engine maps it into its own
/// taxonomy by `kind`.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{kind}: {message}")]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn new(kind: SessionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Invalid, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::AlreadyExists, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Unavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Timeout, message)
    }
}

///
/// SessionErrorKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionErrorKind {
    /// The statement was rejected as malformed or unsupported.
    Invalid,
    /// A schema element created without `IF NOT EXISTS` already exists.
    AlreadyExists,
    /// Not enough live replicas for the requested consistency.
    Unavailable,
    Timeout,
    Other,
}

impl fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Invalid => "invalid",
            Self::AlreadyExists => "already_exists",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}
