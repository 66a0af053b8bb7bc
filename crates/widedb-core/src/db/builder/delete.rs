use super::{Pending, start, step};
use crate::{
    db::{
        Consistency, Persistence, Session,
        statement::{Delete, RelationOp, Statement},
    },
    error::{Error, InvalidArgumentError},
    model::EntityDescriptor,
    traits::{EntityKind, FieldValue},
    value::Value,
};
use std::{marker::PhantomData, sync::Arc};

///
/// DeleteBuilder
///
/// Deletes whole rows, or only the named columns of them.
///

pub struct DeleteBuilder<'p, S: Session, E: EntityKind> {
    persistence: &'p Persistence<S>,
    pending: Pending<Delete>,
    consistency: Option<Consistency>,
    _marker: PhantomData<E>,
}

impl<'p, S: Session, E: EntityKind> DeleteBuilder<'p, S, E> {
    pub(crate) fn new(
        persistence: &'p Persistence<S>,
        descriptor: Result<Arc<EntityDescriptor>, Error>,
        columns: &[&str],
        key: Option<Value>,
    ) -> Self {
        Self {
            persistence,
            pending: start(descriptor, |compiler| match key {
                Some(key) => compiler.delete_by_key(key, columns),
                None => compiler.delete_columns(columns),
            }),
            consistency: None,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl FieldValue) -> Self {
        let value = value.to_value();

        self.pending = step(self.pending, |compiler, delete| {
            delete
                .relations
                .push(compiler.relation(column, RelationOp::Eq, value)?);
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
        let (_, delete) = self.pending?.into_parts();
        if delete.relations.is_empty() {
            return Err(InvalidArgumentError::Incomplete {
                statement: "delete",
                reason: "no WHERE relation",
            }
            .into());
        }

        Ok(Statement::new(delete).with_consistency(self.consistency))
    }

    pub fn execute(self) -> Result<(), Error> {
        let persistence = self.persistence;

        persistence.executor().write(self.into_statement()?)
    }
}
