use crate::{
    db::{
        Consistency, Persistence, Session,
        compile::StatementCompiler,
        statement::{Batch, BatchKind, Statement, StatementBody},
    },
    error::{Error, InvalidArgumentError},
    traits::{EntityKind, FieldValue},
};

///
/// BatchBuilder
///
/// Collects writes, possibly for several entity types, and submits them
/// as one batch. A batch is not a transaction: if it fails, statements
/// ahead of the failing one may already be applied. Member consistency
/// levels are replaced by the batch's own.
///

pub struct BatchBuilder<'p, S: Session> {
    persistence: &'p Persistence<S>,
    pending: Result<Vec<Statement>, Error>,
    kind: BatchKind,
    consistency: Option<Consistency>,
}

impl<'p, S: Session> BatchBuilder<'p, S> {
    pub(crate) const fn new(persistence: &'p Persistence<S>) -> Self {
        Self {
            persistence,
            pending: Ok(Vec::new()),
            kind: BatchKind::Logged,
            consistency: None,
        }
    }

    fn push<E: EntityKind>(
        mut self,
        f: impl FnOnce(&StatementCompiler<'_>) -> Result<Statement, InvalidArgumentError>,
    ) -> Self {
        let persistence = self.persistence;

        self.pending = self.pending.and_then(|mut statements| {
            let descriptor = persistence.prepare::<E>()?;
            statements.push(f(&StatementCompiler::new(&descriptor))?);
            Ok(statements)
        });
        self
    }

    /// Upsert `entity`.
    #[must_use]
    pub fn insert<E: EntityKind>(self, entity: &E) -> Self {
        self.push::<E>(|compiler| compiler.upsert(entity).map(Statement::new))
    }

    /// Upsert `entity`; same statement as [`Self::insert`].
    #[must_use]
    pub fn update<E: EntityKind>(self, entity: &E) -> Self {
        self.push::<E>(|compiler| compiler.upsert(entity).map(Statement::new))
    }

    #[must_use]
    pub fn delete<E: EntityKind>(self, entity: &E) -> Self {
        self.push::<E>(|compiler| compiler.delete(entity).map(Statement::new))
    }

    #[must_use]
    pub fn delete_by_key<E: EntityKind>(self, key: impl FieldValue) -> Self {
        let key = key.to_value();

        self.push::<E>(|compiler| compiler.delete_by_key(key, &[]).map(Statement::new))
    }

    /// Add a statement built elsewhere, such as by another builder's
    /// `into_statement`. Only inserts, updates and deletes are accepted.
    #[must_use]
    pub fn statement(mut self, statement: Result<Statement, Error>) -> Self {
        self.pending = self.pending.and_then(|mut statements| {
            let statement = statement?;
            let is_write = matches!(
                statement.body(),
                StatementBody::Insert(_) | StatementBody::Update(_) | StatementBody::Delete(_)
            );
            if !is_write {
                return Err(InvalidArgumentError::InvalidBatchMember {
                    kind: statement.kind().as_str(),
                }
                .into());
            }

            statements.push(statement.with_consistency(None));
            Ok(statements)
        });
        self
    }

    #[must_use]
    pub const fn unlogged(mut self) -> Self {
        self.kind = BatchKind::Unlogged;
        self
    }

    #[must_use]
    pub const fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = Some(consistency);
        self
    }

    /// Submit the batch. An empty batch sends nothing.
    pub fn execute(self) -> Result<(), Error> {
        let statements = self.pending?;
        if statements.is_empty() {
            return Ok(());
        }

        let batch = Batch {
            kind: self.kind,
            statements,
        };
        self.persistence
            .executor()
            .write(Statement::new(batch).with_consistency(self.consistency))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        db::{MemorySession, Persistence, SessionErrorKind, TableRef, WriteError},
        error::{Error, InvalidArgumentError},
        test_support::User,
    };
    use std::sync::Arc;

    fn persistence() -> (Arc<MemorySession>, Persistence<MemorySession>) {
        let session = Arc::new(MemorySession::new());
        let persistence =
            Persistence::new(Arc::clone(&session), "app").expect("persistence should start");

        (session, persistence)
    }

    fn users() -> TableRef {
        TableRef::new("app", "users")
    }

    #[test]
    fn mixed_writes_in_one_batch() {
        let (session, persistence) = persistence();
        persistence
            .insert(&User::new("old", 1))
            .expect("insert should succeed");
        session.clear_executed();

        persistence
            .batch()
            .insert(&User::new("a", 1))
            .update(&User::new("b", 2))
            .delete_by_key::<User>("old")
            .execute()
            .expect("batch should succeed");

        assert_eq!(session.row_count(&users()), Some(2));
        let executed = session.executed();
        assert_eq!(executed.len(), 1);
        assert!(executed[0].starts_with("BEGIN BATCH INSERT INTO app.users"));
        assert!(executed[0].ends_with("APPLY BATCH"));
    }

    #[test]
    fn empty_batch_sends_nothing() {
        let (session, persistence) = persistence();
        session.clear_executed();

        persistence
            .batch()
            .execute()
            .expect("empty batch should succeed");

        assert!(session.executed().is_empty());
    }

    #[test]
    fn failure_midway_keeps_earlier_members() {
        let (session, persistence) = persistence();
        persistence
            .ensure_column_family::<User>()
            .expect("table should exist");

        // an UPDATE without a key relation is rejected by the store
        let keyless = persistence
            .update_builder::<User>()
            .set("age", 5)
            .where_eq("age", 1)
            .into_statement();

        let err = persistence
            .batch()
            .insert(&User::new("a", 1))
            .statement(keyless)
            .insert(&User::new("b", 2))
            .execute()
            .expect_err("second member should fail");

        let Error::Write(WriteError { source, .. }) = err else {
            panic!("expected a write error");
        };
        assert_eq!(source.kind, SessionErrorKind::Invalid);
        assert_eq!(session.row_count(&users()), Some(1));
    }

    #[test]
    fn non_write_members_are_rejected() {
        let (_session, persistence) = persistence();

        let select = persistence.select::<User>().into_statement();
        let err = persistence
            .batch()
            .statement(select)
            .execute()
            .expect_err("select cannot join a batch");

        assert!(matches!(
            err,
            Error::InvalidArgument(InvalidArgumentError::InvalidBatchMember { kind: "select" })
        ));
    }

    #[test]
    fn unlogged_batches_render_their_kind() {
        let (session, persistence) = persistence();
        persistence
            .ensure_column_family::<User>()
            .expect("table should exist");
        session.clear_executed();

        persistence
            .batch()
            .insert(&User::new("a", 1))
            .unlogged()
            .execute()
            .expect("unlogged batch should succeed");

        assert!(session.executed()[0].starts_with("BEGIN UNLOGGED BATCH"));
    }
}
