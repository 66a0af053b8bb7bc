use super::{Pending, start, step};
use crate::{
    db::{
        Consistency, Persistence, Session,
        compile::StatementCompiler,
        statement::{Assignment, RelationOp, Statement, Update},
    },
    error::{Error, InvalidArgumentError},
    model::EntityDescriptor,
    traits::{EntityKind, FieldValue},
    value::Value,
};
use std::{marker::PhantomData, sync::Arc};

///
/// UpdateBuilder
///
/// Needs at least one assignment and one `WHERE` term before it can run.
/// Primary-key columns cannot be assigned.
///

pub struct UpdateBuilder<'p, S: Session, E: EntityKind> {
    persistence: &'p Persistence<S>,
    pending: Pending<Update>,
    consistency: Option<Consistency>,
    _marker: PhantomData<E>,
}

impl<'p, S: Session, E: EntityKind> UpdateBuilder<'p, S, E> {
    pub(crate) fn new(
        persistence: &'p Persistence<S>,
        descriptor: Result<Arc<EntityDescriptor>, Error>,
        key: Option<Value>,
    ) -> Self {
        Self {
            persistence,
            pending: start(descriptor, |compiler| match key {
                Some(key) => compiler.update_by_key(key),
                None => Ok(compiler.update()),
            }),
            consistency: None,
            _marker: PhantomData,
        }
    }

    fn assign(
        mut self,
        assignment: impl FnOnce(&StatementCompiler<'_>) -> Result<Assignment, InvalidArgumentError>,
    ) -> Self {
        self.pending = step(self.pending, |compiler, update| {
            update.assignments.push(assignment(compiler)?);
            Ok(())
        });
        self
    }

    /// `column = value`
    #[must_use]
    pub fn set(self, column: &str, value: impl FieldValue) -> Self {
        let value = value.to_value();

        self.assign(|compiler| compiler.assign_set(column, value))
    }

    /// `column = column + value` on a collection column.
    #[must_use]
    pub fn add(self, column: &str, value: impl FieldValue) -> Self {
        let value = value.to_value();

        self.assign(|compiler| compiler.assign_append(column, value))
    }

    /// `column = column - value` on a collection column. For maps, pass
    /// the keys to remove.
    #[must_use]
    pub fn remove(self, column: &str, value: impl FieldValue) -> Self {
        let value = value.to_value();

        self.assign(|compiler| compiler.assign_remove(column, value))
    }

    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl FieldValue) -> Self {
        let value = value.to_value();

        self.pending = step(self.pending, |compiler, update| {
            update
                .relations
                .push(compiler.relation(column, RelationOp::Eq, value)?);
            Ok(())
        });
        self
    }

    #[must_use]
    pub fn ttl(mut self, seconds: u32) -> Self {
        self.pending = step(self.pending, |_, update| {
            update.using.ttl = Some(seconds);
            Ok(())
        });
        self
    }

    #[must_use]
    pub const fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = Some(consistency);
        self
    }

    pub fn into_statement(self) -> Result<Statement, Error> {
        let (_, update) = self.pending?.into_parts();

        if update.assignments.is_empty() {
            return Err(InvalidArgumentError::Incomplete {
                statement: "update",
                reason: "no column is assigned",
            }
            .into());
        }
        if update.relations.is_empty() {
            return Err(InvalidArgumentError::Incomplete {
                statement: "update",
                reason: "no WHERE relation",
            }
            .into());
        }

        Ok(Statement::new(update).with_consistency(self.consistency))
    }

    pub fn execute(self) -> Result<(), Error> {
        let persistence = self.persistence;

        persistence.executor().write(self.into_statement()?)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        db::{MemorySession, Persistence},
        error::{Error, InvalidArgumentError},
        test_support::User,
    };
    use std::sync::Arc;

    fn persistence() -> Persistence<MemorySession> {
        let persistence = Persistence::new(Arc::new(MemorySession::new()), "app")
            .expect("persistence should start");
        persistence
            .insert(&User {
                tags: vec!["a".into(), "b".into()],
                ..User::new("u1", 30)
            })
            .expect("fixture user should be written");

        persistence
    }

    fn load(persistence: &Persistence<MemorySession>) -> User {
        persistence
            .find_by_key::<User>("u1")
            .expect("find should succeed")
            .expect("row should exist")
    }

    #[test]
    fn set_and_collection_changes() {
        let persistence = persistence();

        persistence
            .update_builder_for::<User>("u1")
            .set("age", 31)
            .add("tags", vec!["c"])
            .remove("tags", vec!["a"])
            .execute()
            .expect("update should succeed");

        let user = load(&persistence);
        assert_eq!(user.age, 31);
        assert_eq!(user.tags, ["b", "c"]);
    }

    #[test]
    fn where_eq_targets_the_key() {
        let persistence = persistence();

        persistence
            .update_builder::<User>()
            .set("nickname", "al")
            .where_eq("id", "u1")
            .execute()
            .expect("update should succeed");

        assert_eq!(load(&persistence).nickname.as_deref(), Some("al"));
    }

    #[test]
    fn incomplete_updates_are_rejected() {
        let persistence = persistence();

        let err = persistence
            .update_builder_for::<User>("u1")
            .execute()
            .expect_err("no assignment");
        assert!(matches!(
            err,
            Error::InvalidArgument(InvalidArgumentError::Incomplete { .. })
        ));

        let err = persistence
            .update_builder::<User>()
            .set("age", 1)
            .execute()
            .expect_err("no WHERE relation");
        assert!(matches!(
            err,
            Error::InvalidArgument(InvalidArgumentError::Incomplete { .. })
        ));
    }

    #[test]
    fn key_columns_cannot_be_assigned() {
        let persistence = persistence();

        let err = persistence
            .update_builder_for::<User>("u1")
            .set("id", "u2")
            .execute()
            .expect_err("primary key is immutable");

        assert!(matches!(
            err,
            Error::InvalidArgument(InvalidArgumentError::PrimaryKeyColumn { .. })
        ));
    }
}
