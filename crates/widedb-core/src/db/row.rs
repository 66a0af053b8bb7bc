use crate::{
    db::ReadError,
    model::EntityDescriptor,
    traits::FieldValue,
    value::Value,
};
use derive_more::{Deref, IntoIterator};

///
/// Row
/// One result row: ordered `(column, value)` pairs.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub const fn from_columns(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push((column.into(), value.into()));
        self
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn columns(&self) -> &[(String, Value)] {
        &self.columns
    }

    #[must_use]
    pub fn into_columns(self) -> Vec<(String, Value)> {
        self.columns
    }
}

///
/// RowSet
/// Materialized query result, in store order.
///

#[derive(Clone, Debug, Default, Deref, IntoIterator, PartialEq)]
#[into_iterator(owned, ref)]
pub struct RowSet(Vec<Row>);

impl RowSet {
    #[must_use]
    pub const fn new(rows: Vec<Row>) -> Self {
        Self(rows)
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.0
    }
}

impl From<Vec<Row>> for RowSet {
    fn from(rows: Vec<Row>) -> Self {
        Self(rows)
    }
}

///
/// RowReader
///
/// Field-level access to one row through an entity descriptor.
/// Handed to `EntityValue::from_row`.
///

pub struct RowReader<'a> {
    row: &'a Row,
    descriptor: &'a EntityDescriptor,
}

impl<'a> RowReader<'a> {
    #[must_use]
    pub const fn new(row: &'a Row, descriptor: &'a EntityDescriptor) -> Self {
        Self { row, descriptor }
    }

    #[must_use]
    pub const fn row(&self) -> &'a Row {
        self.row
    }

    /// Decode one declared field from its bound column.
    ///
    /// A missing or null column decodes through `FieldValue::from_null`.
    pub fn read<T: FieldValue>(&self, field: &str) -> Result<T, ReadError> {
        let binding = self
            .descriptor
            .binding_for_field(field)
            .ok_or_else(|| ReadError::UnknownField {
                entity: self.descriptor.entity_name(),
                field: field.to_string(),
            })?;
        let column = binding.column();

        match self.row.get(column) {
            None | Some(Value::Null) => T::from_null().ok_or_else(|| ReadError::NullColumn {
                table: self.descriptor.table().clone(),
                column: column.to_string(),
            }),
            Some(value) => T::from_value(value).ok_or_else(|| ReadError::Decode {
                table: self.descriptor.table().clone(),
                column: column.to_string(),
                expected: binding.column_type().clone(),
                found: value.kind_name(),
            }),
        }
    }
}
