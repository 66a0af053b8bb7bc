//! Runtime data model definitions.
//!
//! An entity type *declares* its storage shape through [`EntityModel`];
//! the resolver turns that declaration into an immutable
//! [`EntityDescriptor`] that the compiler and executor work from.
//!
//! In general:
//! - `traits` define *what an entity can do*
//! - `model` defines *how it is stored*
mod entity;
mod field;
mod index;

pub use entity::{EntityDescriptor, EntityModel};
pub use field::{ColumnBinding, ColumnRole, ColumnType, FieldModel};
pub use index::IndexDescriptor;

use thiserror::Error as ThisError;

///
/// MetadataError
///
/// Malformed entity declaration. Raised at resolution time and never
/// cached, so a corrected declaration resolves on the next attempt.
///

#[derive(Debug, ThisError)]
pub enum MetadataError {
    #[error("entity '{entity}' declares no primary key")]
    MissingPrimaryKey { entity: &'static str },

    #[error("entity '{entity}' declares more than one primary key ('{first}', '{second}')")]
    DuplicatePrimaryKey {
        entity: &'static str,
        first: String,
        second: String,
    },

    #[error("entity '{entity}' maps column '{column}' more than once")]
    DuplicateColumn { entity: &'static str, column: String },

    #[error("entity '{entity}' has an empty {what} name")]
    EmptyName {
        entity: &'static str,
        what: &'static str,
    },

    #[error("entity '{entity}' primary key '{column}' cannot have collection type {column_type}")]
    CollectionPrimaryKey {
        entity: &'static str,
        column: String,
        column_type: ColumnType,
    },

    #[error("entity '{entity}' declares a secondary index on its primary key '{column}'")]
    IndexOnPrimaryKey { entity: &'static str, column: String },
}
