//! Fixture entities and session helpers shared by unit tests.

use crate::{
    db::{
        ReadError, RowReader,
        compile::StatementCompiler,
        executor::Executor,
        memory::MemorySession,
        schema::SchemaGuard,
        statement::Statement,
    },
    model::{ColumnType, EntityDescriptor, EntityModel, FieldModel},
    traits::{EntitySchema, EntityValue, FieldValue, FieldValues},
    value::Value,
};
use std::sync::Arc;

///
/// User
///

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) age: i32,
    pub(crate) nickname: Option<String>,
    pub(crate) tags: Vec<String>,
}

impl User {
    pub(crate) fn new(id: &str, age: i32) -> Self {
        Self {
            id: id.to_string(),
            age,
            ..Self::default()
        }
    }
}

impl EntitySchema for User {
    const ENTITY_NAME: &'static str = "User";

    fn model() -> EntityModel {
        EntityModel::new(Self::ENTITY_NAME, "users")
            .field(FieldModel::new("id", ColumnType::Text).primary_key())
            .field(FieldModel::new("age", ColumnType::Int).indexed())
            .field(
                FieldModel::new("nickname", ColumnType::Text)
                    .column("nick")
                    .nullable(),
            )
            .field(FieldModel::new("tags", ColumnType::list(ColumnType::Text)).nullable())
    }
}

impl FieldValues for User {
    fn get_value(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(self.id.to_value()),
            "age" => Some(self.age.to_value()),
            "nickname" => Some(self.nickname.to_value()),
            "tags" => Some(self.tags.to_value()),
            _ => None,
        }
    }
}

impl EntityValue for User {
    fn from_row(row: &RowReader<'_>) -> Result<Self, ReadError> {
        Ok(Self {
            id: row.read("id")?,
            age: row.read("age")?,
            nickname: row.read("nickname")?,
            tags: row.read("tags")?,
        })
    }
}

///
/// NoKey
/// Declares no primary key; never resolves.
///

#[derive(Debug)]
pub(crate) struct NoKey;

impl EntitySchema for NoKey {
    const ENTITY_NAME: &'static str = "NoKey";

    fn model() -> EntityModel {
        EntityModel::new(Self::ENTITY_NAME, "no_key")
            .field(FieldModel::new("name", ColumnType::Text))
    }
}

impl FieldValues for NoKey {
    fn get_value(&self, _field: &str) -> Option<Value> {
        None
    }
}

impl EntityValue for NoKey {
    fn from_row(_row: &RowReader<'_>) -> Result<Self, ReadError> {
        Ok(Self)
    }
}

pub(crate) fn user_descriptor() -> EntityDescriptor {
    EntityDescriptor::resolve(&User::model(), "app").expect("user model should resolve")
}

/// An executor over an empty session.
pub(crate) fn user_executor() -> (Arc<MemorySession>, Executor<MemorySession>) {
    let session = Arc::new(MemorySession::new());
    let executor = Executor::new(Arc::clone(&session));

    (session, executor)
}

/// An executor over a session holding `app.users` with the given rows.
pub(crate) fn seeded_user_executor(
    users: &[(&str, i32)],
) -> (Arc<MemorySession>, Executor<MemorySession>) {
    let (session, executor) = user_executor();
    let descriptor = user_descriptor();

    let guard = SchemaGuard::new(&executor);
    guard
        .ensure_keyspace("app", None)
        .expect("keyspace should be created");
    guard
        .ensure_column_family(&descriptor)
        .expect("users table should be created");

    let compiler = StatementCompiler::new(&descriptor);
    for (id, age) in users {
        let insert = compiler
            .upsert(&User::new(id, *age))
            .expect("fixture user should compile");
        executor
            .write(Statement::new(insert))
            .expect("fixture user should be written");
    }

    (session, executor)
}
