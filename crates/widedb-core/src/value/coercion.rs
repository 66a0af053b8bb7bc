use crate::{model::ColumnType, value::Value};

///
/// Column coercion
///
/// Values bound into statements are converted to the representation of
/// their target column. Only lossless conversions are accepted:
///
/// - `int` ↔ `bigint` when the value fits
/// - `bigint` → `timestamp` (milliseconds)
/// - `list` → `set` (normalized)
/// - element-wise conversion inside collections
///

impl Value {
    /// Whether the value can be bound to a column of `column_type` unchanged.
    #[must_use]
    pub fn conforms_to(&self, column_type: &ColumnType) -> bool {
        match (self, column_type) {
            (Self::Null, _)
            | (Self::Bool(_), ColumnType::Boolean)
            | (Self::Int(_), ColumnType::Int)
            | (Self::BigInt(_), ColumnType::BigInt)
            | (Self::Double(_), ColumnType::Double)
            | (Self::Text(_), ColumnType::Text)
            | (Self::Blob(_), ColumnType::Blob)
            | (Self::Timestamp(_), ColumnType::Timestamp) => true,
            (Self::List(items), ColumnType::List(item)) | (Self::Set(items), ColumnType::Set(item)) => {
                items.iter().all(|v| !v.is_null() && v.conforms_to(item))
            }
            (Self::Map(entries), ColumnType::Map(key, value)) => entries
                .iter()
                .all(|(k, v)| !k.is_null() && k.conforms_to(key) && v.conforms_to(value)),
            _ => false,
        }
    }

    /// Convert into the representation stored by `column_type`.
    ///
    /// Returns `None` when no lossless conversion exists.
    #[must_use]
    pub fn coerce_to(self, column_type: &ColumnType) -> Option<Self> {
        if self.conforms_to(column_type) {
            return Some(self);
        }

        match (self, column_type) {
            (Self::Int(v), ColumnType::BigInt) => Some(Self::BigInt(i64::from(v))),
            (Self::BigInt(v), ColumnType::Int) => i32::try_from(v).ok().map(Self::Int),
            (Self::BigInt(v), ColumnType::Timestamp) => Some(Self::Timestamp(v)),
            (Self::Int(v), ColumnType::Timestamp) => Some(Self::Timestamp(i64::from(v))),
            (Self::List(items), ColumnType::List(item)) => {
                coerce_items(items, item).map(Self::List)
            }
            (Self::List(items) | Self::Set(items), ColumnType::Set(item)) => {
                coerce_items(items, item).map(Self::set_from)
            }
            (Self::Map(entries), ColumnType::Map(key, value)) => {
                let entries = entries
                    .into_iter()
                    .map(|(k, v)| {
                        if k.is_null() {
                            return None;
                        }
                        Some((k.coerce_to(key)?, v.coerce_to(value)?))
                    })
                    .collect::<Option<Vec<_>>>()?;

                Some(Self::map_from(entries))
            }
            _ => None,
        }
    }
}

fn coerce_items(items: Vec<Value>, item: &ColumnType) -> Option<Vec<Value>> {
    items
        .into_iter()
        .map(|v| if v.is_null() { None } else { v.coerce_to(item) })
        .collect()
}
