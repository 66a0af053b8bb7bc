//! Core runtime for WideDB: entity traits, values, statement compilation,
//! execution against a column-family session, and the persistence facade.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod obs;
pub mod traits;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

pub use error::Error;

///
/// CONSTANTS
///

/// Keyspace that holds the store's schema tables.
pub const SYSTEM_SCHEMA_KEYSPACE: &str = "system_schema";

/// Replication factor used when a keyspace is created without one.
pub const DEFAULT_REPLICATION_FACTOR: u32 = 3;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No executors, sessions, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::Consistency,
        model::{EntityDescriptor, EntityModel, FieldModel},
        traits::{ColumnValue, EntityKind, EntitySchema, EntityValue, FieldValue, FieldValues},
        value::Value,
    };
}
