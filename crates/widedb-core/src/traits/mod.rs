mod field_value;

use crate::{
    db::{ReadError, RowReader},
    model::{ColumnType, EntityModel},
    value::Value,
};

// ============================================================================
// VALUE BOUNDARIES
// ============================================================================

///
/// FieldValue
///
/// Conversion boundary between Rust values and stored cells.
/// Anything that can appear as a bound statement argument implements it.
///

pub trait FieldValue {
    fn to_value(&self) -> Value;

    #[must_use]
    fn from_value(value: &Value) -> Option<Self>
    where
        Self: Sized;

    /// Value to use when the stored column is null.
    ///
    /// `None` means a null column cannot be represented by this type.
    #[must_use]
    fn from_null() -> Option<Self>
    where
        Self: Sized,
    {
        None
    }
}

///
/// ColumnValue
///
/// A field type with a fixed stored column type.
/// Required for every mapped entity field.
///

pub trait ColumnValue: FieldValue {
    fn column_type() -> ColumnType;
}

// ============================================================================
// ENTITY CONTRACTS
// ============================================================================

///
/// EntitySchema
///
/// Declared storage facts for an entity type.
/// `model()` is consulted once per engine and cached as a descriptor.
///

pub trait EntitySchema: 'static {
    const ENTITY_NAME: &'static str;

    fn model() -> EntityModel;
}

///
/// FieldValues
///
/// Field access by declared field name.
/// Returns `None` for names the entity does not declare.
///

pub trait FieldValues {
    fn get_value(&self, field: &str) -> Option<Value>;
}

///
/// EntityValue
///
/// A concrete entity that can be rebuilt from one stored row.
///

pub trait EntityValue: EntitySchema + FieldValues + Sized {
    fn from_row(row: &RowReader<'_>) -> Result<Self, ReadError>;
}

///
/// EntityKind
///
/// Full entity contract required by the persistence facade.
///

pub trait EntityKind: EntityValue + Send + Sync {}

impl<T> EntityKind for T where T: EntityValue + Send + Sync {}
