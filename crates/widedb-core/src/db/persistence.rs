//! Public operation surface: resolve, ensure schema, compile, execute.

use crate::{
    config::PersistenceConfig,
    db::{
        BatchBuilder, Consistency, DeleteBuilder, InsertBuilder, RowSet, SelectBuilder, Session,
        UpdateBuilder,
        compile::{IndexRange, StatementCompiler},
        executor::Executor,
        registry::DescriptorCache,
        schema::{Replication, SchemaAction, SchemaGuard},
        statement::{Batch, BatchKind, Statement, TableRef},
    },
    error::{Error, InvalidArgumentError},
    model::EntityDescriptor,
    obs::sink::MetricsSink,
    traits::{EntityKind, EntitySchema, FieldValue},
    value::{OrderedValue, Value},
};
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::Arc,
    time::Duration,
};

///
/// PersistenceBuilder
///

pub struct PersistenceBuilder<S: Session> {
    session: Arc<S>,
    keyspace: String,
    replication: Replication,
    debug: bool,
    timeout: Option<Duration>,
    sink: Option<Arc<dyn MetricsSink>>,
}

impl<S: Session> PersistenceBuilder<S> {
    /// Placement for keyspaces the engine creates.
    #[must_use]
    pub fn replication(mut self, replication: Replication) -> Self {
        self.replication = replication;
        self
    }

    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Ensure the default keyspace exists, then `USE` it.
    pub fn build(self) -> Result<Persistence<S>, Error> {
        if self.keyspace.trim().is_empty() {
            return Err(InvalidArgumentError::Empty {
                what: "default keyspace",
            }
            .into());
        }

        let mut executor = Executor::new(self.session).with_timeout(self.timeout);
        if self.debug {
            executor = executor.debug();
        }
        if let Some(sink) = self.sink {
            executor = executor.with_sink(sink);
        }

        SchemaGuard::new(&executor).ensure_keyspace(&self.keyspace, Some(&self.replication))?;
        executor.write(Statement::use_keyspace(self.keyspace.clone()))?;

        Ok(Persistence {
            executor,
            descriptors: DescriptorCache::new(self.keyspace),
            replication: self.replication,
            ensured: RwLock::new(HashSet::new()),
        })
    }
}

///
/// Persistence
///
/// Entity-level persistence over one session and one default keyspace.
///
/// The first operation touching a column family creates its keyspace,
/// table and secondary indexes if they are missing; later operations on
/// the same table skip the check. `insert` and `update` are aliases of
/// `upsert`: the store has a single write policy and never checks for an
/// existing row. Null fields are not written, so an upsert never clears a
/// column; use `delete_columns` for that.
///
/// The `_many` operations submit one logged batch. Batches are not
/// transactions; on failure some members may already be applied.
///

pub struct Persistence<S: Session> {
    executor: Executor<S>,
    descriptors: DescriptorCache,
    replication: Replication,
    ensured: RwLock<HashSet<TableRef>>,
}

impl<S: Session> Persistence<S> {
    #[must_use]
    pub fn builder(session: Arc<S>, keyspace: impl Into<String>) -> PersistenceBuilder<S> {
        PersistenceBuilder {
            session,
            keyspace: keyspace.into(),
            replication: Replication::default(),
            debug: false,
            timeout: None,
            sink: None,
        }
    }

    /// Connect with default replication and no timeout.
    pub fn new(session: Arc<S>, keyspace: impl Into<String>) -> Result<Self, Error> {
        Self::builder(session, keyspace).build()
    }

    pub fn from_config(session: Arc<S>, config: &PersistenceConfig) -> Result<Self, Error> {
        config.validate()?;

        Self::builder(session, config.keyspace.clone())
            .replication(config.replication.to_replication()?)
            .debug(config.debug)
            .request_timeout(config.request_timeout())
            .build()
    }

    #[must_use]
    pub const fn executor(&self) -> &Executor<S> {
        &self.executor
    }

    #[must_use]
    pub fn default_keyspace(&self) -> &str {
        self.descriptors.default_keyspace()
    }

    #[must_use]
    pub const fn descriptors(&self) -> &DescriptorCache {
        &self.descriptors
    }

    /// Resolve `E` and make sure its table exists.
    pub(crate) fn prepare<E: EntitySchema>(&self) -> Result<Arc<EntityDescriptor>, Error> {
        let descriptor = self.descriptors.resolve::<E>()?;
        if self.ensured.read().contains(descriptor.table()) {
            return Ok(descriptor);
        }

        let guard = SchemaGuard::new(&self.executor);
        guard.ensure_keyspace(descriptor.keyspace(), Some(&self.replication))?;
        guard.ensure_column_family(&descriptor)?;
        self.ensured.write().insert(descriptor.table().clone());

        Ok(descriptor)
    }

    //
    // Raw statements
    //

    /// Run raw CQL and return its rows.
    pub fn execute(&self, cql: &str) -> Result<RowSet, Error> {
        self.executor.raw_query(cql)
    }

    /// Run raw CQL for its side effects.
    pub fn execute_update(&self, cql: &str) -> Result<(), Error> {
        self.executor.raw_update(cql)
    }

    /// Run an already built statement. Reads return their rows, writes
    /// return an empty set.
    pub fn execute_statement(&self, statement: Statement) -> Result<RowSet, Error> {
        if statement.kind().is_read() {
            self.executor.query(statement)
        } else {
            self.executor.write(statement).map(|()| RowSet::empty())
        }
    }

    //
    // Schema
    //

    /// Create a keyspace with the engine's replication if it is missing.
    pub fn ensure_keyspace(&self, name: &str) -> Result<SchemaAction, Error> {
        if name.trim().is_empty() {
            return Err(InvalidArgumentError::Empty { what: "keyspace" }.into());
        }

        Ok(SchemaGuard::new(&self.executor).ensure_keyspace(name, Some(&self.replication))?)
    }

    /// Create `E`'s table and indexes if they are missing. Always checks
    /// the store, regardless of earlier operations.
    pub fn ensure_column_family<E: EntitySchema>(&self) -> Result<SchemaAction, Error> {
        let descriptor = self.descriptors.resolve::<E>()?;
        let guard = SchemaGuard::new(&self.executor);

        guard.ensure_keyspace(descriptor.keyspace(), Some(&self.replication))?;
        let action = guard.ensure_column_family(&descriptor)?;
        self.ensured.write().insert(descriptor.table().clone());

        Ok(action)
    }

    //
    // Writes
    //

    pub fn upsert<E: EntityKind>(&self, entity: &E) -> Result<(), Error> {
        self.upsert_inner(entity, None)
    }

    pub fn upsert_with<E: EntityKind>(
        &self,
        entity: &E,
        consistency: Consistency,
    ) -> Result<(), Error> {
        self.upsert_inner(entity, Some(consistency))
    }

    pub fn upsert_many<E: EntityKind>(&self, entities: &[E]) -> Result<(), Error> {
        self.upsert_many_inner(entities, None)
    }

    pub fn upsert_many_with<E: EntityKind>(
        &self,
        entities: &[E],
        consistency: Consistency,
    ) -> Result<(), Error> {
        self.upsert_many_inner(entities, Some(consistency))
    }

    /// Alias of [`Self::upsert`].
    pub fn insert<E: EntityKind>(&self, entity: &E) -> Result<(), Error> {
        self.upsert_inner(entity, None)
    }

    pub fn insert_with<E: EntityKind>(
        &self,
        entity: &E,
        consistency: Consistency,
    ) -> Result<(), Error> {
        self.upsert_inner(entity, Some(consistency))
    }

    pub fn insert_many<E: EntityKind>(&self, entities: &[E]) -> Result<(), Error> {
        self.upsert_many_inner(entities, None)
    }

    pub fn insert_many_with<E: EntityKind>(
        &self,
        entities: &[E],
        consistency: Consistency,
    ) -> Result<(), Error> {
        self.upsert_many_inner(entities, Some(consistency))
    }

    /// Alias of [`Self::upsert`].
    pub fn update<E: EntityKind>(&self, entity: &E) -> Result<(), Error> {
        self.upsert_inner(entity, None)
    }

    pub fn update_with<E: EntityKind>(
        &self,
        entity: &E,
        consistency: Consistency,
    ) -> Result<(), Error> {
        self.upsert_inner(entity, Some(consistency))
    }

    pub fn update_many<E: EntityKind>(&self, entities: &[E]) -> Result<(), Error> {
        self.upsert_many_inner(entities, None)
    }

    pub fn update_many_with<E: EntityKind>(
        &self,
        entities: &[E],
        consistency: Consistency,
    ) -> Result<(), Error> {
        self.upsert_many_inner(entities, Some(consistency))
    }

    fn upsert_inner<E: EntityKind>(
        &self,
        entity: &E,
        consistency: Option<Consistency>,
    ) -> Result<(), Error> {
        let descriptor = self.prepare::<E>()?;
        let insert = StatementCompiler::new(&descriptor).upsert(entity)?;

        self.executor
            .write(Statement::new(insert).with_consistency(consistency))
    }

    fn upsert_many_inner<E: EntityKind>(
        &self,
        entities: &[E],
        consistency: Option<Consistency>,
    ) -> Result<(), Error> {
        let descriptor = self.prepare::<E>()?;
        let compiler = StatementCompiler::new(&descriptor);
        let statements = entities
            .iter()
            .map(|entity| compiler.upsert(entity).map(Statement::new))
            .collect::<Result<Vec<_>, _>>()?;

        self.write_batch(statements, consistency)
    }

    pub fn delete<E: EntityKind>(&self, entity: &E) -> Result<(), Error> {
        self.delete_inner(entity, None)
    }

    pub fn delete_with<E: EntityKind>(
        &self,
        entity: &E,
        consistency: Consistency,
    ) -> Result<(), Error> {
        self.delete_inner(entity, Some(consistency))
    }

    fn delete_inner<E: EntityKind>(
        &self,
        entity: &E,
        consistency: Option<Consistency>,
    ) -> Result<(), Error> {
        let descriptor = self.prepare::<E>()?;
        let delete = StatementCompiler::new(&descriptor).delete(entity)?;

        self.executor
            .write(Statement::new(delete).with_consistency(consistency))
    }

    pub fn delete_many<E: EntityKind>(&self, entities: &[E]) -> Result<(), Error> {
        self.delete_many_inner(entities, None)
    }

    pub fn delete_many_with<E: EntityKind>(
        &self,
        entities: &[E],
        consistency: Consistency,
    ) -> Result<(), Error> {
        self.delete_many_inner(entities, Some(consistency))
    }

    fn delete_many_inner<E: EntityKind>(
        &self,
        entities: &[E],
        consistency: Option<Consistency>,
    ) -> Result<(), Error> {
        let descriptor = self.prepare::<E>()?;
        let compiler = StatementCompiler::new(&descriptor);
        let statements = entities
            .iter()
            .map(|entity| compiler.delete(entity).map(Statement::new))
            .collect::<Result<Vec<_>, _>>()?;

        self.write_batch(statements, consistency)
    }

    pub fn delete_by_key<E: EntityKind>(&self, key: impl FieldValue) -> Result<(), Error> {
        self.delete_columns_inner::<E>(key.to_value(), &[], None)
    }

    pub fn delete_by_key_with<E: EntityKind>(
        &self,
        key: impl FieldValue,
        consistency: Consistency,
    ) -> Result<(), Error> {
        self.delete_columns_inner::<E>(key.to_value(), &[], Some(consistency))
    }

    /// Null out `columns` of one row; the row itself stays.
    pub fn delete_columns<E: EntityKind>(
        &self,
        key: impl FieldValue,
        columns: &[&str],
    ) -> Result<(), Error> {
        if columns.is_empty() {
            return Err(InvalidArgumentError::Empty { what: "column list" }.into());
        }

        self.delete_columns_inner::<E>(key.to_value(), columns, None)
    }

    pub fn delete_columns_with<E: EntityKind>(
        &self,
        key: impl FieldValue,
        columns: &[&str],
        consistency: Consistency,
    ) -> Result<(), Error> {
        if columns.is_empty() {
            return Err(InvalidArgumentError::Empty { what: "column list" }.into());
        }

        self.delete_columns_inner::<E>(key.to_value(), columns, Some(consistency))
    }

    fn delete_columns_inner<E: EntityKind>(
        &self,
        key: Value,
        columns: &[&str],
        consistency: Option<Consistency>,
    ) -> Result<(), Error> {
        let descriptor = self.prepare::<E>()?;
        let delete = StatementCompiler::new(&descriptor).delete_by_key(key, columns)?;

        self.executor
            .write(Statement::new(delete).with_consistency(consistency))
    }

    /// Truncate `E`'s table.
    pub fn remove_all<E: EntityKind>(&self) -> Result<(), Error> {
        let descriptor = self.prepare::<E>()?;

        self.executor
            .write(StatementCompiler::new(&descriptor).truncate())
    }

    fn write_batch(
        &self,
        statements: Vec<Statement>,
        consistency: Option<Consistency>,
    ) -> Result<(), Error> {
        if statements.is_empty() {
            return Ok(());
        }

        let batch = Batch {
            kind: BatchKind::Logged,
            statements,
        };
        self.executor
            .write(Statement::new(batch).with_consistency(consistency))
    }

    //
    // Reads
    //

    pub fn find_all<E: EntityKind>(&self) -> Result<Vec<E>, Error> {
        self.find_all_inner(None)
    }

    pub fn find_all_with<E: EntityKind>(&self, consistency: Consistency) -> Result<Vec<E>, Error> {
        self.find_all_inner(Some(consistency))
    }

    fn find_all_inner<E: EntityKind>(
        &self,
        consistency: Option<Consistency>,
    ) -> Result<Vec<E>, Error> {
        let descriptor = self.prepare::<E>()?;
        let select = StatementCompiler::new(&descriptor).select_all();

        self.executor.load(
            &descriptor,
            Statement::new(select).with_consistency(consistency),
        )
    }

    pub fn find_by_key<E: EntityKind>(&self, key: impl FieldValue) -> Result<Option<E>, Error> {
        self.find_by_key_inner(key.to_value(), None)
    }

    pub fn find_by_key_with<E: EntityKind>(
        &self,
        key: impl FieldValue,
        consistency: Consistency,
    ) -> Result<Option<E>, Error> {
        self.find_by_key_inner(key.to_value(), Some(consistency))
    }

    fn find_by_key_inner<E: EntityKind>(
        &self,
        key: Value,
        consistency: Option<Consistency>,
    ) -> Result<Option<E>, Error> {
        let descriptor = self.prepare::<E>()?;
        let select = StatementCompiler::new(&descriptor).select_by_key(key)?;

        let entities: Vec<E> = self.executor.load(
            &descriptor,
            Statement::new(select).with_consistency(consistency),
        )?;

        Ok(entities.into_iter().next())
    }

    /// Load several rows with one `IN` select.
    ///
    /// Results follow the order of `keys`. Repeated keys yield one entity
    /// and keys with no row are skipped. An empty key list returns an
    /// empty result without contacting the store.
    pub fn find_by_keys<E, K>(&self, keys: impl IntoIterator<Item = K>) -> Result<Vec<E>, Error>
    where
        E: EntityKind,
        K: FieldValue,
    {
        self.find_by_keys_inner(keys.into_iter().map(|k| k.to_value()).collect(), None)
    }

    pub fn find_by_keys_with<E, K>(
        &self,
        keys: impl IntoIterator<Item = K>,
        consistency: Consistency,
    ) -> Result<Vec<E>, Error>
    where
        E: EntityKind,
        K: FieldValue,
    {
        self.find_by_keys_inner(
            keys.into_iter().map(|k| k.to_value()).collect(),
            Some(consistency),
        )
    }

    fn find_by_keys_inner<E: EntityKind>(
        &self,
        keys: Vec<Value>,
        consistency: Option<Consistency>,
    ) -> Result<Vec<E>, Error> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let descriptor = self.prepare::<E>()?;
        let compiler = StatementCompiler::new(&descriptor);

        // bind first so that equal keys of different Rust types collapse
        let mut seen = BTreeSet::new();
        let mut ordered = Vec::with_capacity(keys.len());
        for key in keys {
            let key = compiler.key(key)?;
            if seen.insert(OrderedValue(key.clone())) {
                ordered.push(key);
            }
        }

        let select = compiler.select_by_keys(ordered.clone())?;
        let entities: Vec<E> = self.executor.load(
            &descriptor,
            Statement::new(select).with_consistency(consistency),
        )?;

        let mut by_key = BTreeMap::new();
        for entity in entities {
            by_key.insert(OrderedValue(compiler.key_of(&entity)?), entity);
        }

        Ok(ordered
            .into_iter()
            .filter_map(|key| by_key.remove(&OrderedValue(key)))
            .collect())
    }

    /// Equality on a secondary-indexed column.
    pub fn find_by_index<E: EntityKind>(
        &self,
        column: &str,
        value: impl FieldValue,
    ) -> Result<Vec<E>, Error> {
        self.find_by_index_inner(Some(column), value.to_value(), None)
    }

    pub fn find_by_index_with<E: EntityKind>(
        &self,
        column: &str,
        value: impl FieldValue,
        consistency: Consistency,
    ) -> Result<Vec<E>, Error> {
        self.find_by_index_inner(Some(column), value.to_value(), Some(consistency))
    }

    /// Equality on the first index `E` declares.
    pub fn find_by_default_index<E: EntityKind>(
        &self,
        value: impl FieldValue,
    ) -> Result<Vec<E>, Error> {
        self.find_by_index_inner(None, value.to_value(), None)
    }

    pub fn find_by_default_index_with<E: EntityKind>(
        &self,
        value: impl FieldValue,
        consistency: Consistency,
    ) -> Result<Vec<E>, Error> {
        self.find_by_index_inner(None, value.to_value(), Some(consistency))
    }

    fn find_by_index_inner<E: EntityKind>(
        &self,
        column: Option<&str>,
        value: Value,
        consistency: Option<Consistency>,
    ) -> Result<Vec<E>, Error> {
        let descriptor = self.prepare::<E>()?;
        let select = StatementCompiler::new(&descriptor).select_by_index(column, value)?;

        self.executor.load(
            &descriptor,
            Statement::new(select).with_consistency(consistency),
        )
    }

    /// Equality on the key and on one more column.
    pub fn find_by_key_and_index<E: EntityKind>(
        &self,
        key: impl FieldValue,
        column: &str,
        value: impl FieldValue,
    ) -> Result<Vec<E>, Error> {
        self.find_by_key_and_index_inner(key.to_value(), column, value.to_value(), None)
    }

    pub fn find_by_key_and_index_with<E: EntityKind>(
        &self,
        key: impl FieldValue,
        column: &str,
        value: impl FieldValue,
        consistency: Consistency,
    ) -> Result<Vec<E>, Error> {
        self.find_by_key_and_index_inner(
            key.to_value(),
            column,
            value.to_value(),
            Some(consistency),
        )
    }

    fn find_by_key_and_index_inner<E: EntityKind>(
        &self,
        key: Value,
        column: &str,
        value: Value,
        consistency: Option<Consistency>,
    ) -> Result<Vec<E>, Error> {
        let descriptor = self.prepare::<E>()?;
        let select =
            StatementCompiler::new(&descriptor).select_by_key_and_index(key, column, value)?;

        self.executor.load(
            &descriptor,
            Statement::new(select).with_consistency(consistency),
        )
    }

    /// The key's row if `column` falls within `range`.
    pub fn find_by_key_and_index_range<E: EntityKind>(
        &self,
        key: impl FieldValue,
        column: &str,
        range: IndexRange,
    ) -> Result<Vec<E>, Error> {
        self.find_by_key_and_index_range_inner(key.to_value(), column, range, None)
    }

    pub fn find_by_key_and_index_range_with<E: EntityKind>(
        &self,
        key: impl FieldValue,
        column: &str,
        range: IndexRange,
        consistency: Consistency,
    ) -> Result<Vec<E>, Error> {
        self.find_by_key_and_index_range_inner(key.to_value(), column, range, Some(consistency))
    }

    fn find_by_key_and_index_range_inner<E: EntityKind>(
        &self,
        key: Value,
        column: &str,
        range: IndexRange,
        consistency: Option<Consistency>,
    ) -> Result<Vec<E>, Error> {
        let descriptor = self.prepare::<E>()?;
        let select = StatementCompiler::new(&descriptor)
            .select_by_key_and_index_range(key, column, range)?;

        self.executor.load(
            &descriptor,
            Statement::new(select).with_consistency(consistency),
        )
    }

    pub fn count<E: EntityKind>(&self) -> Result<u64, Error> {
        self.count_inner::<E>(None)
    }

    pub fn count_with<E: EntityKind>(&self, consistency: Consistency) -> Result<u64, Error> {
        self.count_inner::<E>(Some(consistency))
    }

    fn count_inner<E: EntityKind>(&self, consistency: Option<Consistency>) -> Result<u64, Error> {
        let descriptor = self.prepare::<E>()?;
        let select = StatementCompiler::new(&descriptor).count();

        self.executor
            .count(Statement::new(select).with_consistency(consistency))
    }

    //
    // Builders
    //

    /// Select rows of `E` with hand-picked relations.
    pub fn select<E: EntityKind>(&self) -> SelectBuilder<'_, S, E> {
        SelectBuilder::new(self, self.prepare::<E>())
    }

    /// Insert into `E`'s row at `key`, one column at a time.
    pub fn insert_builder<E: EntityKind>(&self, key: impl FieldValue) -> InsertBuilder<'_, S, E> {
        InsertBuilder::for_key(self, self.prepare::<E>(), key.to_value())
    }

    /// Insert starting from every non-null column of `entity`.
    pub fn insert_builder_from<E: EntityKind>(&self, entity: &E) -> InsertBuilder<'_, S, E> {
        InsertBuilder::from_entity(self, self.prepare::<E>(), entity)
    }

    /// Update with caller-supplied `WHERE` terms.
    pub fn update_builder<E: EntityKind>(&self) -> UpdateBuilder<'_, S, E> {
        UpdateBuilder::new(self, self.prepare::<E>(), None)
    }

    pub fn update_builder_for<E: EntityKind>(
        &self,
        key: impl FieldValue,
    ) -> UpdateBuilder<'_, S, E> {
        UpdateBuilder::new(self, self.prepare::<E>(), Some(key.to_value()))
    }

    /// Delete whole rows, or the named columns of them.
    pub fn delete_builder<E: EntityKind>(&self, columns: &[&str]) -> DeleteBuilder<'_, S, E> {
        DeleteBuilder::new(self, self.prepare::<E>(), columns, None)
    }

    pub fn delete_builder_for<E: EntityKind>(
        &self,
        columns: &[&str],
        key: impl FieldValue,
    ) -> DeleteBuilder<'_, S, E> {
        DeleteBuilder::new(self, self.prepare::<E>(), columns, Some(key.to_value()))
    }

    /// Collect writes over any entity types into one batch.
    #[must_use]
    pub const fn batch(&self) -> BatchBuilder<'_, S> {
        BatchBuilder::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{MemorySession, SessionErrorKind, schema::ReplicaStrategy, statement::CreateTable},
        error::ErrorClass,
        model::MetadataError,
        obs::metrics::CounterSink,
        test_support::{NoKey, User},
    };

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
    fn construction_creates_and_uses_the_default_keyspace() {
        let (session, _persistence) = persistence();

        assert_eq!(session.keyspace_replication("app"), Some(Replication::simple(3)));
        assert_eq!(session.current_keyspace().as_deref(), Some("app"));
        assert_eq!(session.executed().last().map(String::as_str), Some("USE app"));
    }

    #[test]
    fn first_touch_creates_the_table_once() {
        let (session, persistence) = persistence();

        persistence
            .insert(&User::new("u1", 30))
            .expect("insert should succeed");
        assert!(session.has_table(&users()));
        assert!(session.has_index(&users(), "users_age_idx"));

        session.clear_executed();
        persistence
            .insert(&User::new("u2", 31))
            .expect("second insert should succeed");

        let executed = session.executed();
        assert_eq!(executed.len(), 1, "no schema lookups after first touch");
        assert!(executed[0].starts_with("INSERT INTO app.users"));
    }

    #[test]
    fn index_missing_from_an_existing_table_is_rebuilt() {
        let (session, persistence) = persistence();
        let descriptor = persistence
            .descriptors()
            .resolve::<User>()
            .expect("user should resolve");
        persistence
            .executor()
            .write(Statement::new(CreateTable {
                table: users(),
                columns: descriptor
                    .columns()
                    .iter()
                    .map(|b| (b.column().to_string(), b.column_type().clone()))
                    .collect(),
                primary_key: "id".into(),
                if_not_exists: true,
            }))
            .expect("bare table should be created");
        assert!(!session.has_index(&users(), "users_age_idx"));

        let action = persistence
            .ensure_column_family::<User>()
            .expect("ensure should succeed");
        persistence
            .insert(&User::new("u1", 30))
            .expect("insert should succeed");
        let found: Vec<User> = persistence
            .find_by_default_index(30)
            .expect("index read should succeed");

        assert_eq!(action, SchemaAction::Created);
        assert!(session.has_index(&users(), "users_age_idx"));
        assert_eq!(found, vec![User::new("u1", 30)]);
    }

    #[test]
    fn user_lifecycle() {
        let (_session, persistence) = persistence();
        let mut user = User::new("u1", 30);

        persistence.insert(&user).expect("insert should succeed");
        let found: Option<User> = persistence.find_by_key("u1").expect("find should succeed");
        assert_eq!(found, Some(user.clone()));

        user.age = 31;
        persistence.update(&user).expect("update should succeed");
        let found: Option<User> = persistence.find_by_key("u1").expect("find should succeed");
        assert_eq!(found.map(|u| u.age), Some(31));

        persistence.delete(&user).expect("delete should succeed");
        let found: Option<User> = persistence.find_by_key("u1").expect("find should succeed");
        assert_eq!(found, None);
    }

    #[test]
    fn count_reflects_inserts_minus_deletes() {
        let (_session, persistence) = persistence();
        let users: Vec<User> = (0..5).map(|i| User::new(&format!("u{i}"), 20 + i)).collect();

        persistence
            .insert_many(&users)
            .expect("batch insert should succeed");
        persistence
            .delete_many(&users[..2])
            .expect("batch delete should succeed");
        persistence
            .delete_by_key::<User>("missing")
            .expect("deleting an absent key is not an error");

        assert_eq!(persistence.count::<User>().expect("count should succeed"), 3);
    }

    #[test]
    fn find_by_keys_follows_caller_order() {
        let (session, persistence) = persistence();
        for (id, age) in [("a", 1), ("b", 2), ("c", 3)] {
            persistence
                .insert(&User::new(id, age))
                .expect("insert should succeed");
        }

        session.clear_executed();
        let found: Vec<User> = persistence
            .find_by_keys(["c", "missing", "a", "c"])
            .expect("find_by_keys should succeed");

        let ids: Vec<&str> = found.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
        assert_eq!(
            session.executed(),
            vec!["SELECT * FROM app.users WHERE id IN (?, ?, ?)".to_string()]
        );
    }

    #[test]
    fn find_by_keys_with_no_keys_skips_the_store() {
        let (session, persistence) = persistence();
        session.clear_executed();

        let found: Vec<User> = persistence
            .find_by_keys(Vec::<String>::new())
            .expect("empty key list should succeed");

        assert!(found.is_empty());
        assert!(session.executed().is_empty());
    }

    #[test]
    fn index_and_range_reads() {
        let (_session, persistence) = persistence();
        for (id, age) in [("a", 30), ("b", 30), ("c", 40)] {
            persistence
                .insert(&User::new(id, age))
                .expect("insert should succeed");
        }

        let by_index: Vec<User> = persistence
            .find_by_default_index(30)
            .expect("default index read should succeed");
        assert_eq!(by_index.len(), 2);

        let in_range: Vec<User> = persistence
            .find_by_key_and_index_range("c", "age", IndexRange::inclusive(35, 40))
            .expect("inclusive range should succeed");
        assert_eq!(in_range.len(), 1);

        let excluded: Vec<User> = persistence
            .find_by_key_and_index_range("c", "age", IndexRange::exclusive(35, 40))
            .expect("exclusive range should succeed");
        assert!(excluded.is_empty());

        let err = persistence
            .find_by_index::<User>("nick", "x")
            .expect_err("non-indexed column should be rejected");
        assert_eq!(err.class(), ErrorClass::InvalidArgument);
    }

    #[test]
    fn delete_columns_keeps_the_row() {
        let (_session, persistence) = persistence();
        let user = User {
            nickname: Some("al".into()),
            ..User::new("u1", 30)
        };
        persistence.insert(&user).expect("insert should succeed");

        persistence
            .delete_columns::<User>("u1", &["nickname"])
            .expect("column delete should succeed");

        let found: Option<User> = persistence.find_by_key("u1").expect("find should succeed");
        assert_eq!(found.map(|u| u.nickname), Some(None));
    }

    #[test]
    fn delete_columns_refuses_required_columns() {
        let (session, persistence) = persistence();
        persistence
            .insert(&User::new("u1", 30))
            .expect("insert should succeed");
        session.clear_executed();

        let err = persistence
            .delete_columns::<User>("u1", &["age"])
            .expect_err("age maps to a plain i32");

        assert!(matches!(
            err,
            Error::InvalidArgument(InvalidArgumentError::RequiredColumn { .. })
        ));
        assert!(session.executed().is_empty());
        let found: Option<User> = persistence.find_by_key("u1").expect("row should stay readable");
        assert_eq!(found, Some(User::new("u1", 30)));
    }

    #[test]
    fn unsatisfiable_consistency_is_a_consistency_error() {
        let (session, persistence) = persistence();
        persistence
            .insert(&User::new("u1", 30))
            .expect("insert should succeed");
        session.set_live_replicas(1);

        let err = persistence
            .insert_with(&User::new("u2", 30), Consistency::Quorum)
            .expect_err("quorum of three needs two replicas");

        assert_eq!(err.class(), ErrorClass::Consistency);
        let Error::Consistency(err) = err else {
            panic!("expected a consistency error");
        };
        assert_eq!(err.source.kind, SessionErrorKind::Unavailable);
    }

    #[test]
    fn metadata_failures_never_reach_the_store() {
        let (session, persistence) = persistence();
        session.clear_executed();

        let err = persistence
            .find_all::<NoKey>()
            .expect_err("entity without a key should fail");

        assert!(matches!(
            err,
            Error::Metadata(MetadataError::MissingPrimaryKey { .. })
        ));
        assert!(session.executed().is_empty());
    }

    #[test]
    fn config_drives_replication_and_debug() {
        let config = PersistenceConfig::from_toml_str(
            r#"
                keyspace = "events"
                debug = true

                [replication]
                strategy = "NetworkTopologyStrategy"
                factor = 2
                datacenter = "dc1"
            "#,
        )
        .expect("config should parse");
        let session = Arc::new(MemorySession::new());

        Persistence::from_config(Arc::clone(&session), &config).expect("persistence should start");

        let replication = session
            .keyspace_replication("events")
            .expect("keyspace should exist");
        assert_eq!(
            replication.strategy,
            ReplicaStrategy::NetworkTopology {
                datacenter: "dc1".into()
            }
        );
    }

    #[test]
    fn metrics_sink_sees_every_statement() {
        let sink = Arc::new(CounterSink::new());
        let session = Arc::new(MemorySession::new());
        let persistence = Persistence::builder(Arc::clone(&session), "app")
            .metrics_sink(sink.clone())
            .build()
            .expect("persistence should start");

        persistence
            .insert(&User::new("u1", 30))
            .expect("insert should succeed");
        let snapshot = sink.snapshot();

        assert_eq!(
            usize::try_from(snapshot.finished).expect("count should fit"),
            session.executed().len()
        );
        assert!(snapshot.schema_created >= 3, "keyspace, table, index");
    }

    #[test]
    fn raw_statements_run_in_the_default_keyspace() {
        let (_session, persistence) = persistence();
        persistence
            .ensure_column_family::<User>()
            .expect("ensure should succeed");

        persistence
            .execute_update("INSERT INTO users (id, age) VALUES ('u9', 9)")
            .expect("raw insert should succeed");
        let rows = persistence
            .execute("SELECT id FROM users WHERE id = 'u9'")
            .expect("raw select should succeed");

        assert_eq!(rows.len(), 1);
        assert_eq!(
            persistence
                .ensure_column_family::<User>()
                .expect("second ensure should succeed"),
            SchemaAction::Existing
        );
    }

    #[test]
    fn remove_all_truncates() {
        let (_session, persistence) = persistence();
        persistence
            .insert_many(&[User::new("a", 1), User::new("b", 2)])
            .expect("insert should succeed");

        persistence.remove_all::<User>().expect("truncate should succeed");

        assert_eq!(persistence.count::<User>().expect("count should succeed"), 0);
    }
}
