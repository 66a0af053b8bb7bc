//! Process-local column-family store behind the `Session` trait.
//!
//! Used to run the engine embedded and to test it end to end. Keyspaces,
//! tables and secondary indexes behave like their cluster counterparts as
//! far as statement validation goes; replicas are simulated by a single
//! live-replica count checked against each statement's consistency.

mod parse;
mod table;

use crate::{
    SYSTEM_SCHEMA_KEYSPACE,
    db::{
        Row, RowSet, Session, SessionError,
        schema::Replication,
        statement::{
            Batch, BatchKind, CreateIndex, CreateKeyspace, CreateTable, Projection, Select,
            Statement, StatementBody, TableRef,
        },
    },
    value::Value,
};
use parking_lot::{Mutex, RwLock};
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU32, Ordering},
};
use table::Table;

///
/// Keyspace
///

#[derive(Debug)]
struct Keyspace {
    replication: Replication,
    tables: BTreeMap<String, Table>,
}

///
/// State
///

#[derive(Debug, Default)]
struct State {
    keyspaces: BTreeMap<String, Keyspace>,
    current: Option<String>,
}

impl State {
    fn keyspace(&self, name: &str) -> Result<&Keyspace, SessionError> {
        self.keyspaces
            .get(name)
            .ok_or_else(|| SessionError::invalid(format!("Keyspace '{name}' does not exist")))
    }

    fn keyspace_mut(&mut self, name: &str) -> Result<&mut Keyspace, SessionError> {
        self.keyspaces
            .get_mut(name)
            .ok_or_else(|| SessionError::invalid(format!("Keyspace '{name}' does not exist")))
    }

    fn table(&self, table: &TableRef) -> Result<&Table, SessionError> {
        self.keyspace(table.keyspace())?
            .tables
            .get(table.column_family())
            .ok_or_else(|| SessionError::invalid(format!("unconfigured table {table}")))
    }

    fn table_mut(&mut self, table: &TableRef) -> Result<&mut Table, SessionError> {
        self.keyspace_mut(table.keyspace())?
            .tables
            .get_mut(table.column_family())
            .ok_or_else(|| SessionError::invalid(format!("unconfigured table {table}")))
    }
}

///
/// MemorySession
///
/// Thread-safe: all state sits behind one `RwLock`, so each statement
/// (and each batch member) applies atomically with respect to others.
/// `USING TTL` and `USING TIMESTAMP` are accepted and ignored.
///

#[derive(Debug)]
pub struct MemorySession {
    state: RwLock<State>,
    live_replicas: AtomicU32,
    executed: Mutex<Vec<String>>,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySession {
    /// A session where every replica is live.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            live_replicas: AtomicU32::new(u32::MAX),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Simulate a cluster where only `live` replicas of each keyspace
    /// respond.
    pub fn set_live_replicas(&self, live: u32) {
        self.live_replicas.store(live, Ordering::Relaxed);
    }

    /// CQL text of every statement received, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    pub fn clear_executed(&self) {
        self.executed.lock().clear();
    }

    #[must_use]
    pub fn keyspace_replication(&self, name: &str) -> Option<Replication> {
        self.state
            .read()
            .keyspaces
            .get(name)
            .map(|keyspace| keyspace.replication.clone())
    }

    #[must_use]
    pub fn has_table(&self, table: &TableRef) -> bool {
        self.state.read().table(table).is_ok()
    }

    #[must_use]
    pub fn has_index(&self, table: &TableRef, name: &str) -> bool {
        self.state
            .read()
            .table(table)
            .is_ok_and(|t| t.has_index(name))
    }

    /// Live rows in a table, or `None` if the table does not exist.
    #[must_use]
    pub fn row_count(&self, table: &TableRef) -> Option<usize> {
        self.state.read().table(table).ok().map(Table::len)
    }

    #[must_use]
    pub fn current_keyspace(&self) -> Option<String> {
        self.state.read().current.clone()
    }

    // ------------------------------------------------------------------
    // Consistency
    // ------------------------------------------------------------------

    fn check_consistency(&self, statement: &Statement, state: &State) -> Result<(), SessionError> {
        let Some(level) = statement.consistency() else {
            return Ok(());
        };
        if statement.kind().is_read() && !level.is_readable() {
            return Err(SessionError::invalid(format!(
                "{level} ConsistencyLevel is only supported for writes"
            )));
        }

        // a batch must satisfy the level in every keyspace it touches
        let tables: Vec<&TableRef> = match statement.body() {
            StatementBody::Batch(batch) => {
                batch.statements.iter().filter_map(Statement::table).collect()
            }
            _ => statement.table().into_iter().collect(),
        };

        let live = self.live_replicas.load(Ordering::Relaxed);
        for table in tables {
            let Some(keyspace) = state.keyspaces.get(table.keyspace()) else {
                continue;
            };

            let factor = keyspace.replication.factor;
            let alive = live.min(factor);
            let required = level.required_replicas(factor);
            if required > alive {
                return Err(SessionError::unavailable(format!(
                    "Cannot achieve consistency level {level}: required {required}, alive {alive}"
                )));
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    fn apply(&self, statement: &Statement) -> Result<RowSet, SessionError> {
        let mut state = self.state.write();
        self.check_consistency(statement, &state)?;

        apply_body(&mut state, statement.body())
    }
}

fn apply_body(state: &mut State, body: &StatementBody) -> Result<RowSet, SessionError> {
    match body {
        StatementBody::Select(select) => select_rows(state, select),
        StatementBody::Insert(insert) => state.table_mut(&insert.table)?.insert(insert),
        StatementBody::Update(update) => {
            state.table_mut(&update.table)?.update(update)?;
            Ok(RowSet::empty())
        }
        StatementBody::Delete(delete) => {
            state.table_mut(&delete.table)?.delete(delete)?;
            Ok(RowSet::empty())
        }
        StatementBody::Batch(batch) => apply_batch(state, batch),
        StatementBody::Truncate(table) => {
            state.table_mut(table)?.truncate();
            Ok(RowSet::empty())
        }
        StatementBody::CreateKeyspace(create) => create_keyspace(state, create),
        StatementBody::CreateTable(create) => create_table(state, create),
        StatementBody::CreateIndex(create) => create_index(state, create),
        StatementBody::Use(keyspace) => {
            state.keyspace(keyspace)?;
            state.current = Some(keyspace.clone());
            Ok(RowSet::empty())
        }
    }
}

// Members apply in order; a failing member leaves earlier ones applied.
fn apply_batch(state: &mut State, batch: &Batch) -> Result<RowSet, SessionError> {
    for statement in &batch.statements {
        match statement.body() {
            StatementBody::Insert(insert) if insert.if_not_exists && batch.kind == BatchKind::Unlogged => {
                return Err(SessionError::invalid(
                    "Conditional statements are not supported in unlogged batches",
                ));
            }
            StatementBody::Insert(_) | StatementBody::Update(_) | StatementBody::Delete(_) => {
                apply_body(state, statement.body())?;
            }
            _ => {
                return Err(SessionError::invalid(format!(
                    "Invalid statement in batch: only UPDATE, INSERT and DELETE statements are allowed, got {}",
                    statement.kind()
                )));
            }
        }
    }

    Ok(RowSet::empty())
}

fn create_keyspace(state: &mut State, create: &CreateKeyspace) -> Result<RowSet, SessionError> {
    if state.keyspaces.contains_key(&create.name) || create.name == SYSTEM_SCHEMA_KEYSPACE {
        return if create.if_not_exists {
            Ok(RowSet::empty())
        } else {
            Err(SessionError::already_exists(format!(
                "Keyspace {} already exists",
                create.name
            )))
        };
    }
    if create.replication.factor == 0 {
        return Err(SessionError::invalid("replication_factor must be at least 1"));
    }

    state.keyspaces.insert(
        create.name.clone(),
        Keyspace {
            replication: create.replication.clone(),
            tables: BTreeMap::new(),
        },
    );
    Ok(RowSet::empty())
}

fn create_table(state: &mut State, create: &CreateTable) -> Result<RowSet, SessionError> {
    let keyspace = state.keyspace_mut(create.table.keyspace())?;
    if keyspace.tables.contains_key(create.table.column_family()) {
        return if create.if_not_exists {
            Ok(RowSet::empty())
        } else {
            Err(SessionError::already_exists(format!(
                "Table {} already exists",
                create.table
            )))
        };
    }

    keyspace
        .tables
        .insert(create.table.column_family().to_string(), Table::new(create)?);
    Ok(RowSet::empty())
}

fn create_index(state: &mut State, create: &CreateIndex) -> Result<RowSet, SessionError> {
    let created = state.table_mut(&create.table)?.add_index(create)?;
    if !created && !create.if_not_exists {
        return Err(SessionError::already_exists(format!(
            "Index {} already exists",
            create.name
        )));
    }

    Ok(RowSet::empty())
}

fn select_rows(state: &State, select: &Select) -> Result<RowSet, SessionError> {
    if select.table.keyspace() == SYSTEM_SCHEMA_KEYSPACE {
        return system_schema(state, select);
    }

    state.table(&select.table)?.select(select)
}

// system_schema.{keyspaces,tables,columns,indexes}, materialized on read.
fn system_schema(state: &State, select: &Select) -> Result<RowSet, SessionError> {
    let rows: Vec<Row> = match select.table.column_family() {
        "keyspaces" => state
            .keyspaces
            .iter()
            .map(|(name, keyspace)| {
                Row::new()
                    .with("keyspace_name", name.as_str())
                    .with("replication", keyspace.replication.to_cql_map())
            })
            .collect(),
        "tables" => state
            .keyspaces
            .iter()
            .flat_map(|(keyspace, ks)| {
                ks.tables.keys().map(move |table| {
                    Row::new()
                        .with("keyspace_name", keyspace.as_str())
                        .with("table_name", table.as_str())
                })
            })
            .collect(),
        "columns" => state
            .keyspaces
            .iter()
            .flat_map(|(keyspace, ks)| {
                ks.tables.iter().flat_map(move |(table, t)| {
                    t.columns().iter().map(move |(column, column_type)| {
                        Row::new()
                            .with("keyspace_name", keyspace.as_str())
                            .with("table_name", table.as_str())
                            .with("column_name", column.as_str())
                            .with("type", column_type.to_string())
                    })
                })
            })
            .collect(),
        "indexes" => state
            .keyspaces
            .iter()
            .flat_map(|(keyspace, ks)| {
                ks.tables.iter().flat_map(move |(table, t)| {
                    t.indexes().map(move |(index, column)| {
                        Row::new()
                            .with("keyspace_name", keyspace.as_str())
                            .with("table_name", table.as_str())
                            .with("index_name", index)
                            .with("target", column)
                    })
                })
            })
            .collect(),
        other => {
            return Err(SessionError::invalid(format!(
                "unconfigured table {SYSTEM_SCHEMA_KEYSPACE}.{other}"
            )));
        }
    };

    let rows = rows.into_iter().filter(|row| {
        select.relations.iter().all(|relation| {
            row.get(&relation.column)
                .is_some_and(|cell| relation.matches(cell))
        })
    });

    let rows: Vec<Row> = match &select.projection {
        Projection::Count => {
            let count = i64::try_from(rows.count()).unwrap_or(i64::MAX);
            vec![Row::new().with("count", count)]
        }
        Projection::All => rows.collect(),
        Projection::Columns(columns) => rows
            .map(|row| {
                Row::from_columns(
                    columns
                        .iter()
                        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                        .collect(),
                )
            })
            .collect(),
    };

    Ok(RowSet::new(rows))
}

impl Session for MemorySession {
    fn execute(&self, statement: &Statement) -> Result<RowSet, SessionError> {
        self.executed.lock().push(statement.cql());

        self.apply(statement)
    }

    fn execute_raw(&self, cql: &str) -> Result<RowSet, SessionError> {
        self.executed.lock().push(cql.to_string());

        let current = self.current_keyspace();
        let body = parse::parse(cql, current.as_deref())?;

        self.apply(&Statement::new(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{
            Consistency, SessionErrorKind,
            statement::{Insert, Using},
        },
        model::ColumnType,
    };

    fn session_with_users() -> MemorySession {
        let session = MemorySession::new();
        session
            .execute(&Statement::new(CreateKeyspace {
                name: "app".into(),
                replication: Replication::simple(3),
                if_not_exists: true,
            }))
            .expect("keyspace should be created");
        session
            .execute(&Statement::new(CreateTable {
                table: TableRef::new("app", "users"),
                columns: vec![("id".into(), ColumnType::Text), ("age".into(), ColumnType::Int)],
                primary_key: "id".into(),
                if_not_exists: true,
            }))
            .expect("table should be created");
        session
    }

    #[test]
    fn raw_statements_use_the_current_keyspace() {
        let session = session_with_users();

        session.execute_raw("USE app").expect("use should succeed");
        session
            .execute_raw("INSERT INTO users (id, age) VALUES ('u1', 30)")
            .expect("raw insert should succeed");
        let rows = session
            .execute_raw("SELECT age FROM users WHERE id = 'u1'")
            .expect("raw select should succeed");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("age"), Some(&Value::Int(30)));
        assert_eq!(session.current_keyspace().as_deref(), Some("app"));
    }

    #[test]
    fn create_without_if_not_exists_reports_already_exists() {
        let session = session_with_users();

        let err = session
            .execute(&Statement::new(CreateKeyspace {
                name: "app".into(),
                replication: Replication::default(),
                if_not_exists: false,
            }))
            .expect_err("duplicate keyspace should fail");

        assert_eq!(err.kind, SessionErrorKind::AlreadyExists);
    }

    #[test]
    fn consistency_beyond_live_replicas_is_unavailable() {
        let session = session_with_users();
        session.set_live_replicas(1);
        let select = Statement::new(Select::new(TableRef::new("app", "users")));

        session
            .execute(&select.clone().with_consistency(Some(Consistency::One)))
            .expect("ONE should succeed with one live replica");
        let err = session
            .execute(&select.with_consistency(Some(Consistency::All)))
            .expect_err("ALL should fail with one live replica");

        assert_eq!(err.kind, SessionErrorKind::Unavailable);
    }

    #[test]
    fn batch_consistency_checks_every_keyspace() {
        let session = session_with_users();
        session
            .execute(&Statement::new(CreateKeyspace {
                name: "solo".into(),
                replication: Replication::simple(1),
                if_not_exists: true,
            }))
            .expect("keyspace should be created");
        session
            .execute(&Statement::new(CreateTable {
                table: TableRef::new("solo", "users"),
                columns: vec![("id".into(), ColumnType::Text)],
                primary_key: "id".into(),
                if_not_exists: true,
            }))
            .expect("table should be created");
        session.set_live_replicas(1);

        let insert = |keyspace: &str| {
            Statement::new(Insert {
                table: TableRef::new(keyspace, "users"),
                values: vec![("id".into(), Value::from("u1"))],
                if_not_exists: false,
                using: Using::default(),
            })
        };
        let batch = Statement::new(Batch {
            kind: BatchKind::Logged,
            statements: vec![insert("solo"), insert("app")],
        })
        .with_consistency(Some(Consistency::Quorum));

        let err = session
            .execute(&batch)
            .expect_err("QUORUM in app needs two of three replicas");

        assert_eq!(err.kind, SessionErrorKind::Unavailable);
        assert_eq!(session.row_count(&TableRef::new("solo", "users")), Some(0));
    }

    #[test]
    fn system_schema_lists_indexes() {
        let session = session_with_users();
        session
            .execute(&Statement::new(CreateIndex {
                table: TableRef::new("app", "users"),
                name: "users_age_idx".into(),
                column: "age".into(),
                if_not_exists: true,
            }))
            .expect("index should be created");

        let rows = session
            .execute_raw(
                "SELECT index_name FROM system_schema.indexes \
                 WHERE keyspace_name = 'app' AND table_name = 'users'",
            )
            .expect("system schema should be readable");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("index_name"), Some(&Value::from("users_age_idx")));
    }

    #[test]
    fn system_schema_lists_tables() {
        let session = session_with_users();

        let rows = session
            .execute_raw("SELECT table_name FROM system_schema.tables WHERE keyspace_name = 'app'")
            .expect("system schema should be readable");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("table_name"), Some(&Value::from("users")));
    }

    #[test]
    fn executed_records_rendered_cql() {
        let session = session_with_users();

        assert_eq!(
            session.executed(),
            vec![
                "CREATE KEYSPACE IF NOT EXISTS app WITH replication = {'class': 'SimpleStrategy', 'replication_factor': 3}".to_string(),
                "CREATE TABLE IF NOT EXISTS app.users (id text PRIMARY KEY, age int)".to_string(),
            ]
        );
    }
}
