use crate::{
    db::statement::TableRef,
    model::{ColumnBinding, FieldModel, IndexDescriptor, MetadataError},
};
use std::collections::HashSet;

///
/// EntityModel
///
/// Declarative storage description supplied by an entity type.
/// Resolved once into an [`EntityDescriptor`].
///

#[derive(Clone, Debug)]
pub struct EntityModel {
    /// Stable entity name (for diagnostics).
    pub entity_name: &'static str,
    /// Keyspace override; `None` uses the engine default.
    pub keyspace: Option<&'static str>,
    pub column_family: &'static str,
    /// Ordered field list (authoritative for column order).
    pub fields: Vec<FieldModel>,
}

impl EntityModel {
    #[must_use]
    pub const fn new(entity_name: &'static str, column_family: &'static str) -> Self {
        Self {
            entity_name,
            keyspace: None,
            column_family,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn keyspace(mut self, keyspace: &'static str) -> Self {
        self.keyspace = Some(keyspace);
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldModel) -> Self {
        self.fields.push(field);
        self
    }
}

///
/// EntityDescriptor
///
/// Immutable storage metadata for one entity type: target table,
/// ordered column bindings, the primary key, and secondary indexes.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntityDescriptor {
    entity_name: &'static str,
    table: TableRef,
    columns: Vec<ColumnBinding>,
    primary_key: usize,
    indexes: Vec<IndexDescriptor>,
}

impl EntityDescriptor {
    /// Validate a declaration and build its descriptor.
    pub fn resolve(model: &EntityModel, default_keyspace: &str) -> Result<Self, MetadataError> {
        let entity = model.entity_name;

        if entity.is_empty() {
            return Err(MetadataError::EmptyName {
                entity,
                what: "entity",
            });
        }
        if model.column_family.is_empty() {
            return Err(MetadataError::EmptyName {
                entity,
                what: "column family",
            });
        }

        let keyspace = model.keyspace.unwrap_or(default_keyspace);
        if keyspace.is_empty() {
            return Err(MetadataError::EmptyName {
                entity,
                what: "keyspace",
            });
        }

        let mut seen = HashSet::with_capacity(model.fields.len());
        let mut primary_key: Option<usize> = None;
        let mut columns = Vec::with_capacity(model.fields.len());

        for (position, field) in model.fields.iter().enumerate() {
            let binding = ColumnBinding::from_model(field);

            if binding.column().is_empty() {
                return Err(MetadataError::EmptyName {
                    entity,
                    what: "column",
                });
            }
            if !seen.insert(binding.column().to_string()) {
                return Err(MetadataError::DuplicateColumn {
                    entity,
                    column: binding.column().to_string(),
                });
            }

            if binding.is_primary_key() {
                if let Some(first) = primary_key {
                    let first: &ColumnBinding = &columns[first];
                    return Err(MetadataError::DuplicatePrimaryKey {
                        entity,
                        first: first.column().to_string(),
                        second: binding.column().to_string(),
                    });
                }
                validate_primary_key(entity, &binding)?;
                primary_key = Some(position);
            }

            columns.push(binding);
        }

        let primary_key = primary_key.ok_or(MetadataError::MissingPrimaryKey { entity })?;
        let indexes = columns
            .iter()
            .filter(|binding| binding.is_indexed())
            .map(|binding| IndexDescriptor::new(model.column_family, binding.column()))
            .collect();

        Ok(Self {
            entity_name: entity,
            table: TableRef::new(keyspace, model.column_family),
            columns,
            primary_key,
            indexes,
        })
    }

    #[must_use]
    pub const fn entity_name(&self) -> &'static str {
        self.entity_name
    }

    #[must_use]
    pub const fn table(&self) -> &TableRef {
        &self.table
    }

    #[must_use]
    pub fn keyspace(&self) -> &str {
        self.table.keyspace()
    }

    #[must_use]
    pub fn column_family(&self) -> &str {
        self.table.column_family()
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnBinding] {
        &self.columns
    }

    #[must_use]
    pub fn primary_key(&self) -> &ColumnBinding {
        &self.columns[self.primary_key]
    }

    #[must_use]
    pub fn indexes(&self) -> &[IndexDescriptor] {
        &self.indexes
    }

    /// The first declared secondary index, used when a caller names none.
    #[must_use]
    pub fn default_index(&self) -> Option<&IndexDescriptor> {
        self.indexes.first()
    }

    /// Look up a binding by column name, falling back to the field name.
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<&ColumnBinding> {
        self.columns
            .iter()
            .find(|binding| binding.column() == name)
            .or_else(|| self.binding_for_field(name))
    }

    #[must_use]
    pub fn binding_for_field(&self, field: &str) -> Option<&ColumnBinding> {
        self.columns.iter().find(|binding| binding.field() == field)
    }
}

fn validate_primary_key(entity: &'static str, binding: &ColumnBinding) -> Result<(), MetadataError> {
    if binding.column_type().is_collection() {
        return Err(MetadataError::CollectionPrimaryKey {
            entity,
            column: binding.column().to_string(),
            column_type: binding.column_type().clone(),
        });
    }
    if binding.is_indexed() {
        return Err(MetadataError::IndexOnPrimaryKey {
            entity,
            column: binding.column().to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnType;

    fn user_model() -> EntityModel {
        EntityModel::new("User", "users")
            .field(FieldModel::new("id", ColumnType::Text).primary_key())
            .field(FieldModel::new("age", ColumnType::Int).indexed())
            .field(FieldModel::new("nickname", ColumnType::Text).column("nick"))
    }

    #[test]
    fn resolve_builds_table_columns_and_indexes() {
        let descriptor = EntityDescriptor::resolve(&user_model(), "app")
            .expect("well-formed model should resolve");

        assert_eq!(descriptor.table().to_string(), "app.users");
        assert_eq!(descriptor.primary_key().column(), "id");
        assert_eq!(descriptor.columns().len(), 3);
        assert_eq!(descriptor.indexes().len(), 1);
        assert_eq!(descriptor.indexes()[0].name(), "users_age_idx");
        assert_eq!(
            descriptor.binding("nickname").map(ColumnBinding::column),
            Some("nick"),
            "field names should fall back to their bound column"
        );
    }

    #[test]
    fn keyspace_override_wins_over_default() {
        let model = user_model().keyspace("audit");
        let descriptor =
            EntityDescriptor::resolve(&model, "app").expect("override model should resolve");

        assert_eq!(descriptor.keyspace(), "audit");
    }

    #[test]
    fn resolve_is_deterministic() {
        let first = EntityDescriptor::resolve(&user_model(), "app").expect("first resolve");
        let second = EntityDescriptor::resolve(&user_model(), "app").expect("second resolve");

        assert_eq!(first, second);
    }

    #[test]
    fn missing_primary_key_is_rejected() {
        let model = EntityModel::new("Orphan", "orphans")
            .field(FieldModel::new("name", ColumnType::Text));

        let err = EntityDescriptor::resolve(&model, "app").expect_err("no key should fail");
        assert!(matches!(
            err,
            MetadataError::MissingPrimaryKey { entity: "Orphan" }
        ));
    }

    #[test]
    fn duplicate_primary_key_is_rejected() {
        let model = EntityModel::new("Twin", "twins")
            .field(FieldModel::new("a", ColumnType::Text).primary_key())
            .field(FieldModel::new("b", ColumnType::Text).primary_key());

        let err = EntityDescriptor::resolve(&model, "app").expect_err("two keys should fail");
        match err {
            MetadataError::DuplicatePrimaryKey { first, second, .. } => {
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn duplicate_column_is_rejected() {
        let model = EntityModel::new("Clash", "clashes")
            .field(FieldModel::new("id", ColumnType::Text).primary_key())
            .field(FieldModel::new("a", ColumnType::Text).column("x"))
            .field(FieldModel::new("b", ColumnType::Text).column("x"));

        let err = EntityDescriptor::resolve(&model, "app").expect_err("column clash should fail");
        assert!(matches!(err, MetadataError::DuplicateColumn { .. }));
    }

    #[test]
    fn collection_primary_key_is_rejected() {
        let model = EntityModel::new("Bag", "bags")
            .field(FieldModel::new("id", ColumnType::list(ColumnType::Int)).primary_key());

        let err = EntityDescriptor::resolve(&model, "app").expect_err("list key should fail");
        assert!(matches!(err, MetadataError::CollectionPrimaryKey { .. }));
    }

    #[test]
    fn empty_names_are_rejected() {
        let no_table = EntityModel::new("Blank", "")
            .field(FieldModel::new("id", ColumnType::Text).primary_key());
        let err = EntityDescriptor::resolve(&no_table, "app").expect_err("empty table");
        assert!(matches!(
            err,
            MetadataError::EmptyName {
                what: "column family",
                ..
            }
        ));

        let err = EntityDescriptor::resolve(&user_model(), "").expect_err("empty keyspace");
        assert!(matches!(
            err,
            MetadataError::EmptyName {
                what: "keyspace",
                ..
            }
        ));
    }
}
