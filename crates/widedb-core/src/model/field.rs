use crate::traits::{ColumnValue, FieldValue};
use std::fmt::{self, Display};

///
/// ColumnType
///
/// Stored column type, rendered as its CQL name.
/// Collections nested inside collections render as `frozen<...>`.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ColumnType {
    Boolean,
    Int,
    BigInt,
    Double,
    Text,
    Blob,
    Timestamp,
    List(Box<Self>),
    Set(Box<Self>),
    Map(Box<Self>, Box<Self>),
}

impl ColumnType {
    #[must_use]
    pub fn list(item: Self) -> Self {
        Self::List(Box::new(item))
    }

    #[must_use]
    pub fn set(item: Self) -> Self {
        Self::Set(Box::new(item))
    }

    #[must_use]
    pub fn map(key: Self, value: Self) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::Set(_) | Self::Map(..))
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_collection() {
            write!(f, "frozen<{self}>")
        } else {
            write!(f, "{self}")
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => f.write_str("boolean"),
            Self::Int => f.write_str("int"),
            Self::BigInt => f.write_str("bigint"),
            Self::Double => f.write_str("double"),
            Self::Text => f.write_str("text"),
            Self::Blob => f.write_str("blob"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::List(item) => {
                f.write_str("list<")?;
                item.fmt_nested(f)?;
                f.write_str(">")
            }
            Self::Set(item) => {
                f.write_str("set<")?;
                item.fmt_nested(f)?;
                f.write_str(">")
            }
            Self::Map(key, value) => {
                f.write_str("map<")?;
                key.fmt_nested(f)?;
                f.write_str(", ")?;
                value.fmt_nested(f)?;
                f.write_str(">")
            }
        }
    }
}

///
/// FieldModel
///
/// One field as declared by the entity type.
/// The column name defaults to the field name. A nullable field reads a
/// null column as a value, so its column may be deleted on its own.
///

#[derive(Clone, Debug)]
pub struct FieldModel {
    pub field: &'static str,
    pub column: Option<&'static str>,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub indexed: bool,
    pub nullable: bool,
}

impl FieldModel {
    #[must_use]
    pub const fn new(field: &'static str, column_type: ColumnType) -> Self {
        Self {
            field,
            column: None,
            column_type,
            primary_key: false,
            indexed: false,
            nullable: false,
        }
    }

    /// Column type and nullability taken from the field's Rust type.
    #[must_use]
    pub fn of<T: ColumnValue>(field: &'static str) -> Self {
        let mut model = Self::new(field, T::column_type());
        model.nullable = <T as FieldValue>::from_null().is_some();

        model
    }

    #[must_use]
    pub fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn column_name(&self) -> &'static str {
        self.column.unwrap_or(self.field)
    }
}

///
/// ColumnRole
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnRole {
    PrimaryKey,
    Regular,
}

///
/// ColumnBinding
///
/// Resolved mapping of one entity field to one stored column.
/// Owned by its `EntityDescriptor`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnBinding {
    field: &'static str,
    column: String,
    column_type: ColumnType,
    role: ColumnRole,
    indexed: bool,
    nullable: bool,
}

impl ColumnBinding {
    pub(crate) fn from_model(model: &FieldModel) -> Self {
        Self {
            field: model.field,
            column: model.column_name().to_string(),
            column_type: model.column_type.clone(),
            role: if model.primary_key {
                ColumnRole::PrimaryKey
            } else {
                ColumnRole::Regular
            },
            indexed: model.indexed,
            nullable: model.nullable,
        }
    }

    #[must_use]
    pub const fn field(&self) -> &'static str {
        self.field
    }

    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    #[must_use]
    pub const fn column_type(&self) -> &ColumnType {
        &self.column_type
    }

    #[must_use]
    pub const fn role(&self) -> ColumnRole {
        self.role
    }

    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        matches!(self.role, ColumnRole::PrimaryKey)
    }

    #[must_use]
    pub const fn is_indexed(&self) -> bool {
        self.indexed
    }

    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_types_render_frozen_when_nested() {
        let ty = ColumnType::map(ColumnType::Text, ColumnType::list(ColumnType::Int));

        assert_eq!(ty.to_string(), "map<text, frozen<list<int>>>");
        assert_eq!(ColumnType::set(ColumnType::Text).to_string(), "set<text>");
    }

    #[test]
    fn column_name_defaults_to_field_name() {
        let plain = FieldModel::new("age", ColumnType::Int);
        let renamed = FieldModel::new("age", ColumnType::Int).column("user_age");

        assert_eq!(plain.column_name(), "age");
        assert_eq!(renamed.column_name(), "user_age");
    }

    #[test]
    fn nullability_follows_the_rust_type() {
        let required = FieldModel::of::<i32>("age");
        let optional = FieldModel::of::<Option<String>>("nickname");
        let list = FieldModel::of::<Vec<String>>("tags");

        assert!(!required.nullable);
        assert!(optional.nullable);
        assert!(list.nullable, "an empty collection reads back from null");
        assert_eq!(optional.column_type, ColumnType::Text);
    }
}
