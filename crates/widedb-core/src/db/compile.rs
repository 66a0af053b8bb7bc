//! Entity-to-statement compilation.
//!
//! Pure translation from a descriptor plus an entity instance or key into
//! `Statement` values. No I/O happens here and every argument is checked
//! against the descriptor before a statement is produced.

use crate::{
    db::statement::{
        Assignment, Delete, Insert, Projection, Relation, RelationOp, Select, Statement, TableRef,
        Update, Using,
    },
    error::InvalidArgumentError,
    model::{ColumnBinding, ColumnType, EntityDescriptor},
    traits::FieldValues,
    value::Value,
};

///
/// IndexRange
///
/// Bounds of a range read on one column. Bounds are used as given and
/// never reordered; `inclusive` applies to both ends.
///

#[derive(Clone, Debug, PartialEq)]
pub struct IndexRange {
    pub start: Value,
    pub end: Value,
    pub inclusive: bool,
}

impl IndexRange {
    pub fn inclusive(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            inclusive: true,
        }
    }

    pub fn exclusive(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            inclusive: false,
        }
    }

    const fn ops(&self) -> (RelationOp, RelationOp) {
        if self.inclusive {
            (RelationOp::Gte, RelationOp::Lte)
        } else {
            (RelationOp::Gt, RelationOp::Lt)
        }
    }
}

///
/// StatementCompiler
///

pub struct StatementCompiler<'a> {
    descriptor: &'a EntityDescriptor,
}

impl<'a> StatementCompiler<'a> {
    #[must_use]
    pub const fn new(descriptor: &'a EntityDescriptor) -> Self {
        Self { descriptor }
    }

    fn table(&self) -> TableRef {
        self.descriptor.table().clone()
    }

    fn key_column(&self) -> String {
        self.descriptor.primary_key().column().to_string()
    }

    // ------------------------------------------------------------------
    // Argument checks
    // ------------------------------------------------------------------

    /// Look up a column by column name or field name.
    pub fn column(&self, name: &str) -> Result<&'a ColumnBinding, InvalidArgumentError> {
        self.descriptor
            .binding(name)
            .ok_or_else(|| InvalidArgumentError::UnknownColumn {
                table: self.table(),
                column: name.to_string(),
            })
    }

    /// Convert a value into the representation of `binding`'s column.
    pub fn bind(
        &self,
        binding: &ColumnBinding,
        value: Value,
    ) -> Result<Value, InvalidArgumentError> {
        self.coerce(binding.column(), binding.column_type(), value)
    }

    fn coerce(
        &self,
        column: &str,
        column_type: &ColumnType,
        value: Value,
    ) -> Result<Value, InvalidArgumentError> {
        let found = value.kind_name();

        value
            .coerce_to(column_type)
            .ok_or_else(|| InvalidArgumentError::TypeMismatch {
                table: self.table(),
                column: column.to_string(),
                expected: column_type.clone(),
                found,
            })
    }

    /// Validate a primary-key argument.
    pub fn key(&self, key: Value) -> Result<Value, InvalidArgumentError> {
        if key.is_null() {
            return Err(InvalidArgumentError::Null { what: "primary key" });
        }

        self.bind(self.descriptor.primary_key(), key)
    }

    /// The primary-key value of an entity instance.
    pub fn key_of<E: FieldValues>(&self, entity: &E) -> Result<Value, InvalidArgumentError> {
        let field = self.descriptor.primary_key().field();

        self.key(entity.get_value(field).unwrap_or(Value::Null))
    }

    fn non_null(what: &'static str, value: Value) -> Result<Value, InvalidArgumentError> {
        if value.is_null() {
            Err(InvalidArgumentError::Null { what })
        } else {
            Ok(value)
        }
    }

    fn key_relation(&self, key: Value) -> Result<Relation, InvalidArgumentError> {
        Ok(Relation::eq(self.key_column(), self.key(key)?))
    }

    /// One `WHERE` term on any declared column. `In` takes a list value.
    pub fn relation(
        &self,
        column: &str,
        op: RelationOp,
        value: Value,
    ) -> Result<Relation, InvalidArgumentError> {
        let binding = self.column(column)?;
        let what = if binding.is_primary_key() {
            "primary key"
        } else {
            "relation value"
        };

        let value = match (op, value) {
            (RelationOp::In, Value::List(values) | Value::Set(values)) => {
                if values.is_empty() {
                    return Err(InvalidArgumentError::Empty { what: "IN list" });
                }
                Value::List(
                    values
                        .into_iter()
                        .map(|v| self.bind(binding, Self::non_null(what, v)?))
                        .collect::<Result<_, _>>()?,
                )
            }
            (RelationOp::In, other) => {
                return Err(InvalidArgumentError::TypeMismatch {
                    table: self.table(),
                    column: binding.column().to_string(),
                    expected: ColumnType::list(binding.column_type().clone()),
                    found: other.kind_name(),
                });
            }
            (_, value) => self.bind(binding, Self::non_null(what, value)?)?,
        };

        Ok(Relation::new(binding.column(), op, value))
    }

    fn regular_column(
        &self,
        name: &str,
        action: &'static str,
    ) -> Result<&'a ColumnBinding, InvalidArgumentError> {
        let binding = self.column(name)?;
        if binding.is_primary_key() {
            return Err(InvalidArgumentError::PrimaryKeyColumn {
                table: self.table(),
                column: binding.column().to_string(),
                action,
            });
        }

        Ok(binding)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Bind every column of an instance. Null columns are omitted so a
    /// write never creates tombstones.
    pub fn upsert<E: FieldValues>(&self, entity: &E) -> Result<Insert, InvalidArgumentError> {
        let mut values = Vec::with_capacity(self.descriptor.columns().len());

        for binding in self.descriptor.columns() {
            let value = entity.get_value(binding.field()).unwrap_or(Value::Null);
            let value = if binding.is_primary_key() {
                self.key(value)?
            } else {
                self.bind(binding, value)?
            };

            if !value.is_null() {
                values.push((binding.column().to_string(), value));
            }
        }

        Ok(Insert {
            table: self.table(),
            values,
            if_not_exists: false,
            using: Using::default(),
        })
    }

    /// An insert skeleton binding only the key; used by the insert builder.
    pub fn insert_for_key(&self, key: Value) -> Result<Insert, InvalidArgumentError> {
        Ok(Insert {
            table: self.table(),
            values: vec![(self.key_column(), self.key(key)?)],
            if_not_exists: false,
            using: Using::default(),
        })
    }

    /// An `UPDATE` with no assignments and no `WHERE` terms.
    #[must_use]
    pub fn update(&self) -> Update {
        Update {
            table: self.table(),
            assignments: Vec::new(),
            relations: Vec::new(),
            using: Using::default(),
        }
    }

    /// `UPDATE ... WHERE pk = ?` with no assignments yet.
    pub fn update_by_key(&self, key: Value) -> Result<Update, InvalidArgumentError> {
        let mut update = self.update();
        update.relations.push(self.key_relation(key)?);

        Ok(update)
    }

    pub fn assign_set(&self, column: &str, value: Value) -> Result<Assignment, InvalidArgumentError> {
        let binding = self.regular_column(column, "updated")?;

        Ok(Assignment::Set {
            column: binding.column().to_string(),
            value: self.bind(binding, value)?,
        })
    }

    /// `col = col + ?`. Lists and sets take a collection, maps take a map.
    pub fn assign_append(
        &self,
        column: &str,
        value: Value,
    ) -> Result<Assignment, InvalidArgumentError> {
        let binding = self.collection_column(column)?;
        let value = Self::non_null("appended value", value)?;

        Ok(Assignment::Append {
            column: binding.column().to_string(),
            value: self.bind(binding, value)?,
        })
    }

    /// `col = col - ?`. Maps take the set of keys to remove.
    pub fn assign_remove(
        &self,
        column: &str,
        value: Value,
    ) -> Result<Assignment, InvalidArgumentError> {
        let binding = self.collection_column(column)?;
        let value = Self::non_null("removed value", value)?;
        let value = match binding.column_type() {
            ColumnType::Map(key, _) => {
                self.coerce(binding.column(), &ColumnType::Set(key.clone()), value)?
            }
            _ => self.bind(binding, value)?,
        };

        Ok(Assignment::Remove {
            column: binding.column().to_string(),
            value,
        })
    }

    fn collection_column(&self, column: &str) -> Result<&'a ColumnBinding, InvalidArgumentError> {
        let binding = self.regular_column(column, "updated")?;
        if !binding.column_type().is_collection() {
            return Err(InvalidArgumentError::TypeMismatch {
                table: self.table(),
                column: binding.column().to_string(),
                expected: binding.column_type().clone(),
                found: "collection",
            });
        }

        Ok(binding)
    }

    /// A `DELETE` of `columns` (the whole row when empty) with no `WHERE`
    /// terms yet.
    pub fn delete_columns(&self, columns: &[&str]) -> Result<Delete, InvalidArgumentError> {
        let columns = columns
            .iter()
            .map(|name| {
                let binding = self.regular_column(name, "deleted")?;
                // a null here would leave a row that no longer maps back
                if !binding.is_nullable() {
                    return Err(InvalidArgumentError::RequiredColumn {
                        table: self.table(),
                        column: binding.column().to_string(),
                    });
                }

                Ok(binding.column().to_string())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Delete {
            table: self.table(),
            columns,
            relations: Vec::new(),
        })
    }

    /// Delete a whole row, or only `columns` of it when any are named.
    pub fn delete_by_key(
        &self,
        key: Value,
        columns: &[&str],
    ) -> Result<Delete, InvalidArgumentError> {
        let mut delete = self.delete_columns(columns)?;
        delete.relations.push(self.key_relation(key)?);

        Ok(delete)
    }

    pub fn delete<E: FieldValues>(&self, entity: &E) -> Result<Delete, InvalidArgumentError> {
        self.delete_by_key(self.key_of(entity)?, &[])
    }

    #[must_use]
    pub fn truncate(&self) -> Statement {
        Statement::truncate(self.table())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    #[must_use]
    pub fn select_all(&self) -> Select {
        Select::new(self.table())
    }

    #[must_use]
    pub fn count(&self) -> Select {
        let mut select = self.select_all();
        select.projection = Projection::Count;
        select
    }

    pub fn select_by_key(&self, key: Value) -> Result<Select, InvalidArgumentError> {
        let mut select = self.select_all();
        select.relations.push(self.key_relation(key)?);

        Ok(select)
    }

    /// One `pk IN (...)` select. Keys are bound in the order given.
    pub fn select_by_keys(&self, keys: Vec<Value>) -> Result<Select, InvalidArgumentError> {
        if keys.is_empty() {
            return Err(InvalidArgumentError::Empty { what: "key list" });
        }
        let keys = keys
            .into_iter()
            .map(|key| self.key(key))
            .collect::<Result<Vec<_>, _>>()?;

        let mut select = self.select_all();
        select.relations.push(Relation::in_list(self.key_column(), keys));

        Ok(select)
    }

    /// Resolve a secondary index by column name, or the default index.
    pub fn index_column(
        &self,
        column: Option<&str>,
    ) -> Result<&'a ColumnBinding, InvalidArgumentError> {
        let Some(name) = column else {
            let index = self.descriptor.default_index().ok_or(
                InvalidArgumentError::NoSecondaryIndex {
                    entity: self.descriptor.entity_name(),
                },
            )?;
            return self.column(index.column());
        };

        let binding = self.column(name)?;
        if !binding.is_indexed() {
            return Err(InvalidArgumentError::NotIndexed {
                table: self.table(),
                column: binding.column().to_string(),
            });
        }

        Ok(binding)
    }

    pub fn select_by_index(
        &self,
        column: Option<&str>,
        value: Value,
    ) -> Result<Select, InvalidArgumentError> {
        let binding = self.index_column(column)?;
        let value = Self::non_null("index value", value)?;

        let mut select = self.select_all();
        select
            .relations
            .push(Relation::eq(binding.column(), self.bind(binding, value)?));

        Ok(select)
    }

    /// Equality on the key and on one more column. Filtering is allowed
    /// when that column is not indexed.
    pub fn select_by_key_and_index(
        &self,
        key: Value,
        column: &str,
        value: Value,
    ) -> Result<Select, InvalidArgumentError> {
        let binding = self.regular_column(column, "used as an index column")?;
        let value = Self::non_null("index value", value)?;

        let mut select = self.select_by_key(key)?;
        select
            .relations
            .push(Relation::eq(binding.column(), self.bind(binding, value)?));
        select.allow_filtering = !binding.is_indexed();

        Ok(select)
    }

    /// `pk = ? AND col >= ? AND col <= ?` (or strict bounds).
    pub fn select_by_key_and_index_range(
        &self,
        key: Value,
        column: &str,
        range: IndexRange,
    ) -> Result<Select, InvalidArgumentError> {
        let binding = self.regular_column(column, "range-restricted")?;
        let (lower, upper) = range.ops();
        let start = self.bind(binding, Self::non_null("range start", range.start)?)?;
        let end = self.bind(binding, Self::non_null("range end", range.end)?)?;

        let mut select = self.select_by_key(key)?;
        select.relations.push(Relation::new(binding.column(), lower, start));
        select.relations.push(Relation::new(binding.column(), upper, end));
        select.allow_filtering = true;

        Ok(select)
    }
}
