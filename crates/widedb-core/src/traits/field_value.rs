use crate::{
    model::ColumnType,
    traits::{ColumnValue, FieldValue},
    value::{Blob, Value},
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    hash::Hash,
};
use time::OffsetDateTime;

// Integer fields narrower than 32 bits are stored as `int`.
macro_rules! impl_int_field_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Int(i32::from(*self))
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::Int(v) => Self::try_from(*v).ok(),
                        Value::BigInt(v) => Self::try_from(*v).ok(),
                        _ => None,
                    }
                }
            }

            impl ColumnValue for $ty {
                fn column_type() -> ColumnType {
                    ColumnType::Int
                }
            }
        )*
    };
}

impl_int_field_value!(i8, i16, i32, u8, u16);

impl FieldValue for i64 {
    fn to_value(&self) -> Value {
        Value::BigInt(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::BigInt(v) | Value::Timestamp(v) => Some(*v),
            Value::Int(v) => Some(Self::from(*v)),
            _ => None,
        }
    }
}

impl ColumnValue for i64 {
    fn column_type() -> ColumnType {
        ColumnType::BigInt
    }
}

impl FieldValue for u32 {
    fn to_value(&self) -> Value {
        Value::BigInt(i64::from(*self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::BigInt(v) => Self::try_from(*v).ok(),
            Value::Int(v) => Self::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl ColumnValue for u32 {
    fn column_type() -> ColumnType {
        ColumnType::BigInt
    }
}

impl FieldValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl ColumnValue for bool {
    fn column_type() -> ColumnType {
        ColumnType::Boolean
    }
}

impl FieldValue for f64 {
    fn to_value(&self) -> Value {
        Value::Double(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Double(v) => Some(*v),
            Value::Int(v) => Some(Self::from(*v)),
            _ => None,
        }
    }
}

impl ColumnValue for f64 {
    fn column_type() -> ColumnType {
        ColumnType::Double
    }
}

impl FieldValue for &str {
    fn to_value(&self) -> Value {
        Value::Text((*self).to_string())
    }

    fn from_value(_value: &Value) -> Option<Self> {
        None
    }
}

impl FieldValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl ColumnValue for String {
    fn column_type() -> ColumnType {
        ColumnType::Text
    }
}

impl FieldValue for Blob {
    fn to_value(&self) -> Value {
        Value::Blob(self.0.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Blob(bytes) => Some(Self(bytes.clone())),
            _ => None,
        }
    }
}

impl ColumnValue for Blob {
    fn column_type() -> ColumnType {
        ColumnType::Blob
    }
}

// Timestamps are stored with millisecond precision.
impl FieldValue for OffsetDateTime {
    fn to_value(&self) -> Value {
        let millis = self.unix_timestamp_nanos() / 1_000_000;

        Value::Timestamp(i64::try_from(millis).unwrap_or(i64::MAX))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Timestamp(millis) => {
                Self::from_unix_timestamp_nanos(i128::from(*millis) * 1_000_000).ok()
            }
            _ => None,
        }
    }
}

impl ColumnValue for OffsetDateTime {
    fn column_type() -> ColumnType {
        ColumnType::Timestamp
    }
}

impl FieldValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }

    fn from_null() -> Option<Self> {
        Some(Self::Null)
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            return Some(None);
        }

        T::from_value(value).map(Some)
    }

    fn from_null() -> Option<Self> {
        Some(None)
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    fn column_type() -> ColumnType {
        T::column_type()
    }
}

// Collections: the store returns null for an empty collection, so every
// collection type reads a null column as empty.

fn collect_items<T: FieldValue, C: FromIterator<T>>(value: &Value) -> Option<C> {
    match value {
        Value::List(items) | Value::Set(items) => items.iter().map(T::from_value).collect(),
        _ => None,
    }
}

fn collect_entries<K: FieldValue, V: FieldValue, C: FromIterator<(K, V)>>(
    value: &Value,
) -> Option<C> {
    match value {
        Value::Map(entries) => entries
            .iter()
            .map(|(k, v)| Some((K::from_value(k)?, V::from_value(v)?)))
            .collect(),
        _ => None,
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        collect_items(value)
    }

    fn from_null() -> Option<Self> {
        Some(Self::new())
    }
}

impl<T: ColumnValue> ColumnValue for Vec<T> {
    fn column_type() -> ColumnType {
        ColumnType::list(T::column_type())
    }
}

impl<T: FieldValue + Ord> FieldValue for BTreeSet<T> {
    fn to_value(&self) -> Value {
        Value::set_from(self.iter().map(FieldValue::to_value))
    }

    fn from_value(value: &Value) -> Option<Self> {
        collect_items(value)
    }

    fn from_null() -> Option<Self> {
        Some(Self::new())
    }
}

impl<T: ColumnValue + Ord> ColumnValue for BTreeSet<T> {
    fn column_type() -> ColumnType {
        ColumnType::set(T::column_type())
    }
}

impl<T: FieldValue + Eq + Hash> FieldValue for HashSet<T> {
    fn to_value(&self) -> Value {
        Value::set_from(self.iter().map(FieldValue::to_value))
    }

    fn from_value(value: &Value) -> Option<Self> {
        collect_items(value)
    }

    fn from_null() -> Option<Self> {
        Some(Self::new())
    }
}

impl<T: ColumnValue + Eq + Hash> ColumnValue for HashSet<T> {
    fn column_type() -> ColumnType {
        ColumnType::set(T::column_type())
    }
}

impl<K: FieldValue + Ord, V: FieldValue> FieldValue for BTreeMap<K, V> {
    fn to_value(&self) -> Value {
        Value::map_from(self.iter().map(|(k, v)| (k.to_value(), v.to_value())))
    }

    fn from_value(value: &Value) -> Option<Self> {
        collect_entries(value)
    }

    fn from_null() -> Option<Self> {
        Some(Self::new())
    }
}

impl<K: ColumnValue + Ord, V: ColumnValue> ColumnValue for BTreeMap<K, V> {
    fn column_type() -> ColumnType {
        ColumnType::map(K::column_type(), V::column_type())
    }
}

impl<K: FieldValue + Eq + Hash, V: FieldValue> FieldValue for HashMap<K, V> {
    fn to_value(&self) -> Value {
        Value::map_from(self.iter().map(|(k, v)| (k.to_value(), v.to_value())))
    }

    fn from_value(value: &Value) -> Option<Self> {
        collect_entries(value)
    }

    fn from_null() -> Option<Self> {
        Some(Self::new())
    }
}

impl<K: ColumnValue + Eq + Hash, V: ColumnValue> ColumnValue for HashMap<K, V> {
    fn column_type() -> ColumnType {
        ColumnType::map(K::column_type(), V::column_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_maps_none_to_null() {
        let none: Option<i32> = None;

        assert_eq!(none.to_value(), Value::Null);
        assert_eq!(Option::<i32>::from_value(&Value::Null), Some(None));
        assert_eq!(Option::<i32>::from_value(&Value::Int(3)), Some(Some(3)));
        assert_eq!(Option::<i32>::column_type(), ColumnType::Int);
    }

    #[test]
    fn collections_read_null_as_empty() {
        assert_eq!(Vec::<String>::from_null(), Some(Vec::new()));
        assert_eq!(BTreeSet::<i32>::from_null(), Some(BTreeSet::new()));
        assert_eq!(String::from_null(), None, "scalars have no null form");
    }

    #[test]
    fn hash_set_is_normalized_into_a_sorted_set() {
        let tags: HashSet<String> = ["b", "a"].into_iter().map(String::from).collect();

        assert_eq!(
            tags.to_value(),
            Value::Set(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(
            HashSet::<String>::column_type().to_string(),
            "set<text>"
        );
    }

    #[test]
    fn narrow_integers_reject_out_of_range_cells() {
        assert_eq!(u8::from_value(&Value::Int(300)), None);
        assert_eq!(i16::from_value(&Value::Int(-2)), Some(-2));
    }

    #[test]
    fn timestamps_round_trip_with_millisecond_precision() {
        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp");

        assert_eq!(at.to_value(), Value::Timestamp(1_700_000_000_000));
        assert_eq!(OffsetDateTime::from_value(&at.to_value()), Some(at));
    }
}
