use crate::{
    db::{
        Row, RowSet, SessionError,
        statement::{
            Assignment, CreateIndex, CreateTable, Delete, Insert, Projection, Relation,
            RelationOp, Select, Update,
        },
    },
    model::ColumnType,
    value::{OrderedValue, Value, canonical_cmp},
};
use std::{cmp::Ordering, collections::BTreeMap};

const FILTERING_REQUIRED: &str = "Cannot execute this query as it might involve data filtering \
     and thus may have unpredictable performance. If you want to execute this query despite the \
     performance unpredictability, use ALLOW FILTERING";

///
/// StoredRow
///
/// Cells of one partition. `marker` is set by inserts so a row written
/// with only its key stays visible; rows created by updates have none.
///

#[derive(Clone, Debug, Default)]
struct StoredRow {
    marker: bool,
    cells: BTreeMap<String, Value>,
}

impl StoredRow {
    fn is_live(&self) -> bool {
        self.marker || !self.cells.is_empty()
    }

    fn put(&mut self, column: &str, value: Value) {
        if value.is_null() || value.is_empty_collection() {
            self.cells.remove(column);
        } else {
            self.cells.insert(column.to_string(), value);
        }
    }
}

///
/// Table
///

#[derive(Debug)]
pub(super) struct Table {
    columns: Vec<(String, ColumnType)>,
    primary_key: String,
    /// index name -> column
    indexes: BTreeMap<String, String>,
    rows: BTreeMap<OrderedValue, StoredRow>,
}

impl Table {
    pub(super) fn new(create: &CreateTable) -> Result<Self, SessionError> {
        if !create
            .columns
            .iter()
            .any(|(column, _)| *column == create.primary_key)
        {
            return Err(SessionError::invalid(format!(
                "Unknown definition {} referenced in PRIMARY KEY",
                create.primary_key
            )));
        }

        Ok(Self {
            columns: create.columns.clone(),
            primary_key: create.primary_key.clone(),
            indexes: BTreeMap::new(),
            rows: BTreeMap::new(),
        })
    }

    pub(super) fn columns(&self) -> &[(String, ColumnType)] {
        &self.columns
    }

    pub(super) fn len(&self) -> usize {
        self.rows.values().filter(|row| row.is_live()).count()
    }

    pub(super) fn truncate(&mut self) {
        self.rows.clear();
    }

    /// `(index name, column)` pairs.
    pub(super) fn indexes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.indexes
            .iter()
            .map(|(name, column)| (name.as_str(), column.as_str()))
    }

    pub(super) fn has_index(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    fn is_indexed(&self, column: &str) -> bool {
        self.indexes.values().any(|indexed| indexed == column)
    }

    /// Returns `false` when the index already existed.
    pub(super) fn add_index(&mut self, create: &CreateIndex) -> Result<bool, SessionError> {
        self.column_type(&create.column)?;
        if create.column == self.primary_key {
            return Err(SessionError::invalid(format!(
                "Cannot create secondary index on partition key column {}",
                create.column
            )));
        }
        if self.indexes.contains_key(&create.name) {
            return Ok(false);
        }

        self.indexes
            .insert(create.name.clone(), create.column.clone());
        Ok(true)
    }

    fn column_type(&self, column: &str) -> Result<&ColumnType, SessionError> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, column_type)| column_type)
            .ok_or_else(|| SessionError::invalid(format!("Undefined column name {column}")))
    }

    fn coerce_as(column: &str, column_type: &ColumnType, value: Value) -> Result<Value, SessionError> {
        let found = value.kind_name();
        let value = match (value, column_type) {
            (Value::Int(v), ColumnType::Double) => Value::Double(f64::from(v)),
            #[allow(clippy::cast_precision_loss)]
            (Value::BigInt(v), ColumnType::Double) => Value::Double(v as f64),
            (value, _) => value,
        };

        value.coerce_to(column_type).ok_or_else(|| {
            SessionError::invalid(format!(
                "Invalid {found} value for column {column} of type {column_type}"
            ))
        })
    }

    fn coerce(&self, column: &str, value: Value) -> Result<Value, SessionError> {
        let column_type = self.column_type(column)?;

        Self::coerce_as(column, column_type, value)
    }

    fn cell<'a>(&self, key: &'a OrderedValue, row: &'a StoredRow, column: &str) -> Option<&'a Value> {
        if column == self.primary_key {
            Some(&key.0)
        } else {
            row.cells.get(column)
        }
    }

    // ------------------------------------------------------------------
    // Restrictions
    // ------------------------------------------------------------------

    /// Keys named by a write's `WHERE` clause. Writes must restrict the
    /// primary key, and only it, by `=` or `IN`.
    fn write_keys(&self, relations: &[Relation]) -> Result<Vec<OrderedValue>, SessionError> {
        let mut keys: Option<Vec<OrderedValue>> = None;

        for relation in relations {
            if relation.column != self.primary_key {
                self.column_type(&relation.column)?;
                return Err(SessionError::invalid(format!(
                    "Non PRIMARY KEY columns found in where clause: {}",
                    relation.column
                )));
            }

            let values = match (relation.op, &relation.value) {
                (RelationOp::Eq, value) => vec![value.clone()],
                (RelationOp::In, Value::List(values)) => values.clone(),
                _ => {
                    return Err(SessionError::invalid(
                        "Only EQ and IN relation are supported on the partition key",
                    ));
                }
            };
            let values = values
                .into_iter()
                .map(|v| self.coerce(&relation.column, v).map(OrderedValue))
                .collect::<Result<Vec<_>, _>>()?;

            if keys.replace(values).is_some() {
                return Err(SessionError::invalid(format!(
                    "{} cannot be restricted by more than one relation",
                    self.primary_key
                )));
            }
        }

        keys.ok_or_else(|| {
            SessionError::invalid(format!(
                "Some partition key parts are missing: {}",
                self.primary_key
            ))
        })
    }

    fn check_read_restrictions(&self, select: &Select) -> Result<(), SessionError> {
        let mut non_key = Vec::new();

        for relation in &select.relations {
            self.column_type(&relation.column)?;

            if relation.column == self.primary_key {
                if relation.op.is_range() {
                    return Err(SessionError::invalid(
                        "Only EQ and IN relation are supported on the partition key \
                         (unless you use the token() function)",
                    ));
                }
            } else {
                non_key.push(relation);
            }
        }

        let served_by_index = match non_key.as_slice() {
            [] => true,
            [only] => only.op == RelationOp::Eq && self.is_indexed(&only.column),
            _ => false,
        };
        if served_by_index || select.allow_filtering {
            Ok(())
        } else {
            Err(SessionError::invalid(FILTERING_REQUIRED))
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Upsert one row. With `IF NOT EXISTS` the result carries `[applied]`.
    pub(super) fn insert(&mut self, insert: &Insert) -> Result<RowSet, SessionError> {
        let mut key = None;
        let mut cells = Vec::with_capacity(insert.values.len());

        for (column, value) in &insert.values {
            let value = self.coerce(column, value.clone())?;
            if *column == self.primary_key {
                key = Some(value);
            } else {
                cells.push((column.as_str(), value));
            }
        }

        let key = match key {
            Some(key) if !key.is_null() => OrderedValue(key),
            _ => {
                return Err(SessionError::invalid(format!(
                    "Some partition key parts are missing: {}",
                    self.primary_key
                )));
            }
        };

        if insert.if_not_exists {
            let exists = self.rows.get(&key).is_some_and(StoredRow::is_live);
            if exists {
                return Ok(RowSet::new(vec![Row::new().with("[applied]", false)]));
            }
        }

        let row = self.rows.entry(key).or_default();
        row.marker = true;
        for (column, value) in cells {
            row.put(column, value);
        }

        if insert.if_not_exists {
            Ok(RowSet::new(vec![Row::new().with("[applied]", true)]))
        } else {
            Ok(RowSet::empty())
        }
    }

    pub(super) fn update(&mut self, update: &Update) -> Result<(), SessionError> {
        let keys = self.write_keys(&update.relations)?;

        let mut changes = Vec::with_capacity(update.assignments.len());
        for assignment in &update.assignments {
            let column = assignment.column();
            if column == self.primary_key {
                return Err(SessionError::invalid(format!(
                    "PRIMARY KEY part {column} found in SET part"
                )));
            }

            let column_type = self.column_type(column)?;
            let value = match (assignment, column_type) {
                (Assignment::Remove { value, .. }, ColumnType::Map(key, _)) => {
                    Self::coerce_as(column, &ColumnType::Set(key.clone()), value.clone())?
                }
                (Assignment::Set { value, .. }, _) => self.coerce(column, value.clone())?,
                (Assignment::Append { value, .. } | Assignment::Remove { value, .. }, t) => {
                    if !t.is_collection() {
                        return Err(SessionError::invalid(format!(
                            "Invalid operation for non collection column {column}"
                        )));
                    }
                    self.coerce(column, value.clone())?
                }
            };
            changes.push((assignment, value));
        }

        for key in keys {
            let row = self.rows.entry(key).or_default();

            for (assignment, value) in &changes {
                let column = assignment.column();
                let current = row.cells.get(column).cloned().unwrap_or(Value::Null);
                let next = match assignment {
                    Assignment::Set { .. } => value.clone(),
                    Assignment::Append { .. } => append(current, value.clone()),
                    Assignment::Remove { .. } => remove(current, value),
                };
                row.put(column, next);
            }
        }

        Ok(())
    }

    pub(super) fn delete(&mut self, delete: &Delete) -> Result<(), SessionError> {
        for column in &delete.columns {
            self.column_type(column)?;
            if *column == self.primary_key {
                return Err(SessionError::invalid(format!(
                    "Invalid identifier {column} for deletion (should not be a PRIMARY KEY part)"
                )));
            }
        }
        let keys = self.write_keys(&delete.relations)?;

        for key in keys {
            if delete.columns.is_empty() {
                self.rows.remove(&key);
                continue;
            }

            if let Some(row) = self.rows.get_mut(&key) {
                for column in &delete.columns {
                    row.cells.remove(column);
                }
                if !row.is_live() {
                    self.rows.remove(&key);
                }
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub(super) fn select(&self, select: &Select) -> Result<RowSet, SessionError> {
        self.check_read_restrictions(select)?;

        let relations = select
            .relations
            .iter()
            .map(|relation| {
                let value = match (&relation.op, &relation.value) {
                    (RelationOp::In, Value::List(values)) => Value::List(
                        values
                            .iter()
                            .map(|v| self.coerce(&relation.column, v.clone()))
                            .collect::<Result<_, _>>()?,
                    ),
                    (_, value) => self.coerce(&relation.column, value.clone())?,
                };
                Ok(Relation::new(relation.column.clone(), relation.op, value))
            })
            .collect::<Result<Vec<_>, SessionError>>()?;

        let matching = self.rows.iter().filter(|(key, row)| {
            row.is_live()
                && relations.iter().all(|relation| {
                    self.cell(key, row, &relation.column)
                        .is_some_and(|cell| relation.matches(cell))
                })
        });

        let columns: Vec<&str> = match &select.projection {
            Projection::Count => {
                let count = i64::try_from(matching.count()).unwrap_or(i64::MAX);
                return Ok(RowSet::new(vec![Row::new().with("count", count)]));
            }
            Projection::All => std::iter::once(self.primary_key.as_str())
                .chain(
                    self.columns
                        .iter()
                        .map(|(name, _)| name.as_str())
                        .filter(|name| *name != self.primary_key),
                )
                .collect(),
            Projection::Columns(columns) => {
                for column in columns {
                    self.column_type(column)?;
                }
                columns.iter().map(String::as_str).collect()
            }
        };

        let limit = select
            .limit
            .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
        let rows = matching
            .take(limit)
            .map(|(key, row)| {
                let cells = columns
                    .iter()
                    .map(|column| {
                        let value = self.cell(key, row, column).cloned().unwrap_or(Value::Null);
                        ((*column).to_string(), value)
                    })
                    .collect();
                Row::from_columns(cells)
            })
            .collect();

        Ok(RowSet::new(rows))
    }
}

fn append(current: Value, added: Value) -> Value {
    match (current, added) {
        (Value::List(mut items), Value::List(more)) => {
            items.extend(more);
            Value::List(items)
        }
        (Value::Set(items), Value::Set(more)) => Value::set_from(items.into_iter().chain(more)),
        (Value::Map(entries), Value::Map(more)) => {
            Value::map_from(entries.into_iter().chain(more))
        }
        (_, added) => added,
    }
}

fn remove(current: Value, removed: &Value) -> Value {
    let contains = |items: &[Value], v: &Value| {
        items
            .iter()
            .any(|candidate| canonical_cmp(candidate, v) == Ordering::Equal)
    };

    match (current, removed) {
        (Value::List(items), Value::List(gone) | Value::Set(gone)) => {
            Value::List(items.into_iter().filter(|v| !contains(gone, v)).collect())
        }
        (Value::Set(items), Value::Set(gone) | Value::List(gone)) => {
            Value::Set(items.into_iter().filter(|v| !contains(gone, v)).collect())
        }
        (Value::Map(entries), Value::Set(gone) | Value::List(gone)) => Value::Map(
            entries
                .into_iter()
                .filter(|(k, _)| !contains(gone, k))
                .collect(),
        ),
        (current, _) => current,
    }
}
