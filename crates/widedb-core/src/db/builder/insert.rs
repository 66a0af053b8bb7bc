use super::{Pending, start, step};
use crate::{
    db::{
        Consistency, Persistence, Session,
        statement::{Insert, Statement},
    },
    error::Error,
    model::EntityDescriptor,
    traits::{EntityKind, FieldValue},
    value::Value,
};
use std::{marker::PhantomData, sync::Arc};

///
/// InsertBuilder
///
/// Writes the named columns of one row. Setting a column to null drops
/// it from the statement rather than writing a tombstone.
///

pub struct InsertBuilder<'p, S: Session, E: EntityKind> {
    persistence: &'p Persistence<S>,
    pending: Pending<Insert>,
    consistency: Option<Consistency>,
    _marker: PhantomData<E>,
}

impl<'p, S: Session, E: EntityKind> InsertBuilder<'p, S, E> {
    pub(crate) fn for_key(
        persistence: &'p Persistence<S>,
        descriptor: Result<Arc<EntityDescriptor>, Error>,
        key: Value,
    ) -> Self {
        Self {
            persistence,
            pending: start(descriptor, |compiler| compiler.insert_for_key(key)),
            consistency: None,
            _marker: PhantomData,
        }
    }

    pub(crate) fn from_entity(
        persistence: &'p Persistence<S>,
        descriptor: Result<Arc<EntityDescriptor>, Error>,
        entity: &E,
    ) -> Self {
        Self {
            persistence,
            pending: start(descriptor, |compiler| compiler.upsert(entity)),
            consistency: None,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn value(mut self, column: &str, value: impl FieldValue) -> Self {
        let value = value.to_value();

        self.pending = step(self.pending, |compiler, insert| {
            let binding = compiler.column(column)?;
            let value = if binding.is_primary_key() {
                compiler.key(value)?
            } else {
                compiler.bind(binding, value)?
            };

            insert.values.retain(|(name, _)| name != binding.column());
            if !value.is_null() {
                insert.values.push((binding.column().to_string(), value));
            }
            Ok(())
        });
        self
    }

    /// Expire the written cells after `seconds`.
    #[must_use]
    pub fn ttl(mut self, seconds: u32) -> Self {
        self.pending = step(self.pending, |_, insert| {
            insert.using.ttl = Some(seconds);
            Ok(())
        });
        self
    }

    /// Write timestamp in microseconds since the epoch.
    #[must_use]
    pub fn timestamp(mut self, micros: i64) -> Self {
        self.pending = step(self.pending, |_, insert| {
            insert.using.timestamp = Some(micros);
            Ok(())
        });
        self
    }

    #[must_use]
    pub fn if_not_exists(mut self) -> Self {
        self.pending = step(self.pending, |_, insert| {
            insert.if_not_exists = true;
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
        let (_, insert) = self.pending?.into_parts();

        Ok(Statement::new(insert).with_consistency(self.consistency))
    }

    /// Returns whether the row was written. Only an `IF NOT EXISTS`
    /// insert can report `false`.
    pub fn execute(self) -> Result<bool, Error> {
        let persistence = self.persistence;
        let rows = persistence
            .executor()
            .write_rows(self.into_statement()?)?;

        let applied = rows
            .first()
            .and_then(|row| row.get("[applied]"))
            .is_none_or(|value| matches!(value, Value::Bool(true)));

        Ok(applied)
    }
}
