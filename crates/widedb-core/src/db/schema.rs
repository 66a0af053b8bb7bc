use crate::{
    DEFAULT_REPLICATION_FACTOR, SYSTEM_SCHEMA_KEYSPACE,
    db::{
        Session, SessionError,
        executor::Executor,
        statement::{
            CreateIndex, CreateKeyspace, CreateTable, Projection, Relation, Select, Statement,
            TableRef,
        },
    },
    model::EntityDescriptor,
    obs::sink::MetricsEvent,
    value::Value,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// SchemaError
///
/// A live existence check or a create statement failed.
/// The descriptor cache is never touched on this path.
///

#[derive(Debug, ThisError)]
pub enum SchemaError {
    #[error("schema lookup for {what} failed: {source}")]
    Lookup { what: String, source: SessionError },

    #[error("creating {what} failed: {source}")]
    Create { what: String, source: SessionError },
}

///
/// ReplicaStrategy
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum ReplicaStrategy {
    #[default]
    Simple,
    NetworkTopology {
        datacenter: String,
    },
    /// Any other placement class, passed through by name.
    Other(String),
}

impl ReplicaStrategy {
    #[must_use]
    pub fn class_name(&self) -> &str {
        match self {
            Self::Simple => "SimpleStrategy",
            Self::NetworkTopology { .. } => "NetworkTopologyStrategy",
            Self::Other(class) => class,
        }
    }
}

///
/// Replication
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Replication {
    pub strategy: ReplicaStrategy,
    pub factor: u32,
}

impl Replication {
    #[must_use]
    pub const fn simple(factor: u32) -> Self {
        Self {
            strategy: ReplicaStrategy::Simple,
            factor,
        }
    }

    pub fn network_topology(datacenter: impl Into<String>, factor: u32) -> Self {
        Self {
            strategy: ReplicaStrategy::NetworkTopology {
                datacenter: datacenter.into(),
            },
            factor,
        }
    }

    /// The `replication = {...}` map literal.
    #[must_use]
    pub fn to_cql_map(&self) -> String {
        let class = escape(self.strategy.class_name());

        match &self.strategy {
            ReplicaStrategy::NetworkTopology { datacenter } => {
                format!("{{'class': '{class}', '{}': {}}}", escape(datacenter), self.factor)
            }
            ReplicaStrategy::Simple | ReplicaStrategy::Other(_) => {
                format!("{{'class': '{class}', 'replication_factor': {}}}", self.factor)
            }
        }
    }
}

impl Default for Replication {
    fn default() -> Self {
        Self::simple(DEFAULT_REPLICATION_FACTOR)
    }
}

fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

///
/// SchemaAction
/// What an ensure call did.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchemaAction {
    Existing,
    Created,
}

impl fmt::Display for SchemaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Existing => "existing",
            Self::Created => "created",
        })
    }
}

///
/// SchemaGuard
///
/// Existence checks and idempotent creation of keyspaces and column
/// families. Every check is a live lookup in the system schema tables;
/// nothing is cached here. Creation always uses `IF NOT EXISTS`, so racing
/// callers converge on one outcome. Nothing is ever dropped or altered.
///

pub struct SchemaGuard<'a, S: Session> {
    executor: &'a Executor<S>,
}

impl<'a, S: Session> SchemaGuard<'a, S> {
    #[must_use]
    pub const fn new(executor: &'a Executor<S>) -> Self {
        Self { executor }
    }

    pub fn keyspace_exists(&self, name: &str) -> Result<bool, SchemaError> {
        let mut select = Select::new(TableRef::new(SYSTEM_SCHEMA_KEYSPACE, "keyspaces"));
        select.projection = Projection::Columns(vec!["keyspace_name".into()]);
        select.relations = vec![Relation::eq("keyspace_name", Value::from(name))];

        self.lookup(select, || format!("keyspace '{name}'"))
    }

    pub fn table_exists(&self, table: &TableRef) -> Result<bool, SchemaError> {
        let mut select = Select::new(TableRef::new(SYSTEM_SCHEMA_KEYSPACE, "tables"));
        select.projection = Projection::Columns(vec!["table_name".into()]);
        select.relations = vec![
            Relation::eq("keyspace_name", Value::from(table.keyspace())),
            Relation::eq("table_name", Value::from(table.column_family())),
        ];

        self.lookup(select, || format!("column family {table}"))
    }

    pub fn index_exists(&self, table: &TableRef, name: &str) -> Result<bool, SchemaError> {
        let mut select = Select::new(TableRef::new(SYSTEM_SCHEMA_KEYSPACE, "indexes"));
        select.projection = Projection::Columns(vec!["index_name".into()]);
        select.relations = vec![
            Relation::eq("keyspace_name", Value::from(table.keyspace())),
            Relation::eq("table_name", Value::from(table.column_family())),
            Relation::eq("index_name", Value::from(name)),
        ];

        self.lookup(select, || format!("index {name} on {table}"))
    }

    /// Create the keyspace if it does not exist.
    /// `None` uses `SimpleStrategy` with the default factor.
    pub fn ensure_keyspace(
        &self,
        name: &str,
        replication: Option<&Replication>,
    ) -> Result<SchemaAction, SchemaError> {
        if self.keyspace_exists(name)? {
            return Ok(SchemaAction::Existing);
        }

        let replication = replication.cloned().unwrap_or_default();
        tracing::info!(
            keyspace = name,
            strategy = replication.strategy.class_name(),
            factor = replication.factor,
            "creating keyspace"
        );

        let statement = Statement::new(CreateKeyspace {
            name: name.to_string(),
            replication,
            if_not_exists: true,
        });
        self.create(statement, || format!("keyspace '{name}'"))?;

        Ok(SchemaAction::Created)
    }

    /// Create the column family if it is missing, then any of its
    /// secondary indexes that are missing. An existing table is checked
    /// index by index, so an index lost to an interrupted creation is
    /// rebuilt. The keyspace must already exist.
    pub fn ensure_column_family(
        &self,
        descriptor: &EntityDescriptor,
    ) -> Result<SchemaAction, SchemaError> {
        let table = descriptor.table();
        let fresh = !self.table_exists(table)?;
        let mut action = SchemaAction::Existing;

        if fresh {
            tracing::info!(
                table = %table,
                entity = descriptor.entity_name(),
                indexes = descriptor.indexes().len(),
                "creating column family"
            );

            let create = CreateTable {
                table: table.clone(),
                columns: descriptor
                    .columns()
                    .iter()
                    .map(|binding| (binding.column().to_string(), binding.column_type().clone()))
                    .collect(),
                primary_key: descriptor.primary_key().column().to_string(),
                if_not_exists: true,
            };
            self.create(Statement::new(create), || format!("column family {table}"))?;
            action = SchemaAction::Created;
        }

        for index in descriptor.indexes() {
            // a fresh table has none of its indexes yet
            if !fresh {
                if self.index_exists(table, index.name())? {
                    continue;
                }
                tracing::info!(table = %table, index = index.name(), "creating missing index");
            }

            let create = CreateIndex {
                table: table.clone(),
                name: index.name().to_string(),
                column: index.column().to_string(),
                if_not_exists: true,
            };
            self.create(Statement::new(create), || {
                format!("index {} on {table}", index.name())
            })?;
            action = SchemaAction::Created;
        }

        Ok(action)
    }

    fn lookup(&self, select: Select, what: impl FnOnce() -> String) -> Result<bool, SchemaError> {
        self.executor
            .run(Statement::new(select))
            .map(|rows| !rows.is_empty())
            .map_err(|source| SchemaError::Lookup {
                what: what(),
                source,
            })
    }

    fn create(&self, statement: Statement, what: impl FnOnce() -> String) -> Result<(), SchemaError> {
        let kind = statement.kind();

        self.executor
            .run(statement)
            .map_err(|source| SchemaError::Create {
                what: what(),
                source,
            })?;
        self.executor.record(MetricsEvent::SchemaCreated { kind });

        Ok(())
    }
}
