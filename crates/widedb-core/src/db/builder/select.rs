use super::{Pending, start, step};
use crate::{
    db::{
        Consistency, Persistence, Session,
        statement::{Projection, RelationOp, Select, Statement},
    },
    error::Error,
    model::EntityDescriptor,
    traits::{EntityKind, FieldValue},
    value::Value,
};
use std::{marker::PhantomData, sync::Arc};

///
/// SelectBuilder
///
/// Relations are joined with `AND`. Columns may be named by column or by
/// field. Restrictions the store rejects (such as filtering on a
/// non-indexed column without `allow_filtering`) surface as a `ReadError`
/// from the terminal call.
///

pub struct SelectBuilder<'p, S: Session, E: EntityKind> {
    persistence: &'p Persistence<S>,
    pending: Pending<Select>,
    consistency: Option<Consistency>,
    _marker: PhantomData<E>,
}

impl<'p, S: Session, E: EntityKind> SelectBuilder<'p, S, E> {
    pub(crate) fn new(
        persistence: &'p Persistence<S>,
        descriptor: Result<Arc<EntityDescriptor>, Error>,
    ) -> Self {
        Self {
            persistence,
            pending: start(descriptor, |compiler| Ok(compiler.select_all())),
            consistency: None,
            _marker: PhantomData,
        }
    }

    fn relation(mut self, column: &str, op: RelationOp, value: Value) -> Self {
        self.pending = step(self.pending, |compiler, select| {
            select.relations.push(compiler.relation(column, op, value)?);
            Ok(())
        });
        self
    }

    #[must_use]
    pub fn eq(self, column: &str, value: impl FieldValue) -> Self {
        self.relation(column, RelationOp::Eq, value.to_value())
    }

    #[must_use]
    pub fn in_list<V: FieldValue>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(|v| v.to_value()).collect();

        self.relation(column, RelationOp::In, Value::List(values))
    }

    #[must_use]
    pub fn gt(self, column: &str, value: impl FieldValue) -> Self {
        self.relation(column, RelationOp::Gt, value.to_value())
    }

    #[must_use]
    pub fn gte(self, column: &str, value: impl FieldValue) -> Self {
        self.relation(column, RelationOp::Gte, value.to_value())
    }

    #[must_use]
    pub fn lt(self, column: &str, value: impl FieldValue) -> Self {
        self.relation(column, RelationOp::Lt, value.to_value())
    }

    #[must_use]
    pub fn lte(self, column: &str, value: impl FieldValue) -> Self {
        self.relation(column, RelationOp::Lte, value.to_value())
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.pending = step(self.pending, |_, select| {
            select.limit = Some(limit);
            Ok(())
        });
        self
    }

    #[must_use]
    pub fn allow_filtering(mut self) -> Self {
        self.pending = step(self.pending, |_, select| {
            select.allow_filtering = true;
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
        let (_, select) = self.pending?.into_parts();

        Ok(Statement::new(select).with_consistency(self.consistency))
    }

    // ------------------------------------------------------------------
    // Terminals
    // ------------------------------------------------------------------

    pub fn execute(self) -> Result<Vec<E>, Error> {
        let (descriptor, select) = self.pending?.into_parts();
        let statement = Statement::new(select).with_consistency(self.consistency);

        self.persistence.executor().load(&descriptor, statement)
    }

    /// The first matching row; adds `LIMIT 1`.
    pub fn first(self) -> Result<Option<E>, Error> {
        let found = self.limit(1).execute()?;

        Ok(found.into_iter().next())
    }

    /// `COUNT(*)` over the same relations. Any limit is dropped.
    pub fn count(self) -> Result<u64, Error> {
        let (_, mut select) = self.pending?.into_parts();
        select.projection = Projection::Count;
        select.limit = None;

        self.persistence
            .executor()
            .count(Statement::new(select).with_consistency(self.consistency))
    }
}
