mod render;

use crate::{
    db::{Consistency, schema::Replication},
    model::ColumnType,
    value::{Value, canonical_cmp},
};
use std::{cmp::Ordering, fmt, time::Duration};

pub use render::{Cql, quote_identifier};

///
/// TableRef
/// Fully-qualified column family.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TableRef {
    keyspace: String,
    column_family: String,
}

impl TableRef {
    pub fn new(keyspace: impl Into<String>, column_family: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            column_family: column_family.into(),
        }
    }

    #[must_use]
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    #[must_use]
    pub fn column_family(&self) -> &str {
        &self.column_family
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}",
            quote_identifier(&self.keyspace),
            quote_identifier(&self.column_family)
        )
    }
}

// ============================================================================
// PREDICATES
// ============================================================================

///
/// RelationOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelationOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
}

impl RelationOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "IN",
        }
    }

    #[must_use]
    pub const fn is_range(self) -> bool {
        matches!(self, Self::Lt | Self::Lte | Self::Gt | Self::Gte)
    }
}

///
/// Relation
///
/// One `WHERE` term. For `In` the value is a `Value::List` of candidates.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
    pub column: String,
    pub op: RelationOp,
    pub value: Value,
}

impl Relation {
    pub fn new(column: impl Into<String>, op: RelationOp, value: Value) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }

    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Self::new(column, RelationOp::Eq, value)
    }

    pub fn in_list(column: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(column, RelationOp::In, Value::List(values))
    }

    /// Whether a stored cell satisfies this term. Null cells never match.
    #[must_use]
    pub fn matches(&self, cell: &Value) -> bool {
        if cell.is_null() {
            return false;
        }

        let cmp = || canonical_cmp(cell, &self.value);
        match self.op {
            RelationOp::Eq => cmp() == Ordering::Equal,
            RelationOp::Lt => cmp() == Ordering::Less,
            RelationOp::Lte => cmp() != Ordering::Greater,
            RelationOp::Gt => cmp() == Ordering::Greater,
            RelationOp::Gte => cmp() != Ordering::Less,
            RelationOp::In => match &self.value {
                Value::List(candidates) => candidates
                    .iter()
                    .any(|candidate| canonical_cmp(cell, candidate) == Ordering::Equal),
                _ => false,
            },
        }
    }
}

// ============================================================================
// STATEMENT BODIES
// ============================================================================

///
/// Projection
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Projection {
    All,
    Columns(Vec<String>),
    Count,
}

///
/// Select
///

#[derive(Clone, Debug, PartialEq)]
pub struct Select {
    pub table: TableRef,
    pub projection: Projection,
    pub relations: Vec<Relation>,
    pub limit: Option<u32>,
    pub allow_filtering: bool,
}

impl Select {
    #[must_use]
    pub const fn new(table: TableRef) -> Self {
        Self {
            table,
            projection: Projection::All,
            relations: Vec::new(),
            limit: None,
            allow_filtering: false,
        }
    }
}

///
/// Using
/// `USING TTL ... AND TIMESTAMP ...` options on a write.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Using {
    /// Seconds.
    pub ttl: Option<u32>,
    /// Microseconds since the epoch.
    pub timestamp: Option<i64>,
}

impl Using {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ttl.is_none() && self.timestamp.is_none()
    }
}

///
/// Insert
///

#[derive(Clone, Debug, PartialEq)]
pub struct Insert {
    pub table: TableRef,
    pub values: Vec<(String, Value)>,
    pub if_not_exists: bool,
    pub using: Using,
}

///
/// Assignment
/// One `SET` term of an update.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Assignment {
    Set { column: String, value: Value },
    /// `col = col + ?` on a collection.
    Append { column: String, value: Value },
    /// `col = col - ?` on a collection.
    Remove { column: String, value: Value },
}

impl Assignment {
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Set { column, .. } | Self::Append { column, .. } | Self::Remove { column, .. } => {
                column
            }
        }
    }

    #[must_use]
    pub const fn value(&self) -> &Value {
        match self {
            Self::Set { value, .. } | Self::Append { value, .. } | Self::Remove { value, .. } => {
                value
            }
        }
    }
}

///
/// Update
///

#[derive(Clone, Debug, PartialEq)]
pub struct Update {
    pub table: TableRef,
    pub assignments: Vec<Assignment>,
    pub relations: Vec<Relation>,
    pub using: Using,
}

///
/// Delete
/// Whole rows when `columns` is empty, otherwise only the named columns.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Delete {
    pub table: TableRef,
    pub columns: Vec<String>,
    pub relations: Vec<Relation>,
}

///
/// BatchKind
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BatchKind {
    #[default]
    Logged,
    Unlogged,
}

///
/// Batch
///
/// Writes submitted together. A batch is not a transaction: statements
/// applied before a failure stay applied.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub kind: BatchKind,
    pub statements: Vec<Statement>,
}

///
/// CreateKeyspace
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateKeyspace {
    pub name: String,
    pub replication: Replication,
    pub if_not_exists: bool,
}

///
/// CreateTable
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateTable {
    pub table: TableRef,
    pub columns: Vec<(String, ColumnType)>,
    pub primary_key: String,
    pub if_not_exists: bool,
}

///
/// CreateIndex
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateIndex {
    pub table: TableRef,
    pub name: String,
    pub column: String,
    pub if_not_exists: bool,
}

///
/// StatementBody
///

#[derive(Clone, Debug, PartialEq)]
pub enum StatementBody {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Batch(Batch),
    Truncate(TableRef),
    CreateKeyspace(CreateKeyspace),
    CreateTable(CreateTable),
    CreateIndex(CreateIndex),
    Use(String),
}

macro_rules! impl_body_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for StatementBody {
                fn from(body: $variant) -> Self {
                    Self::$variant(body)
                }
            }
        )*
    };
}

impl_body_from!(
    Select,
    Insert,
    Update,
    Delete,
    Batch,
    CreateKeyspace,
    CreateTable,
    CreateIndex
);

///
/// StatementKind
/// Operation label used in logs, metrics and write errors.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StatementKind {
    Select,
    Count,
    Insert,
    Update,
    Delete,
    Batch,
    Truncate,
    CreateKeyspace,
    CreateTable,
    CreateIndex,
    Use,
    Raw,
}

impl StatementKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Count => "count",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Batch => "batch",
            Self::Truncate => "truncate",
            Self::CreateKeyspace => "create_keyspace",
            Self::CreateTable => "create_table",
            Self::CreateIndex => "create_index",
            Self::Use => "use",
            Self::Raw => "raw",
        }
    }

    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::Select | Self::Count)
    }

    #[must_use]
    pub const fn is_schema(self) -> bool {
        matches!(
            self,
            Self::CreateKeyspace | Self::CreateTable | Self::CreateIndex
        )
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// STATEMENT
// ============================================================================

///
/// Statement
///
/// One compiled operation plus its execution options.
/// The timeout is opaque to the engine and handed to the session as-is.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    body: StatementBody,
    consistency: Option<Consistency>,
    timeout: Option<Duration>,
}

impl Statement {
    pub fn new(body: impl Into<StatementBody>) -> Self {
        Self {
            body: body.into(),
            consistency: None,
            timeout: None,
        }
    }

    #[must_use]
    pub const fn truncate(table: TableRef) -> Self {
        Self {
            body: StatementBody::Truncate(table),
            consistency: None,
            timeout: None,
        }
    }

    pub fn use_keyspace(keyspace: impl Into<String>) -> Self {
        Self::new(StatementBody::Use(keyspace.into()))
    }

    #[must_use]
    pub fn with_consistency(mut self, consistency: Option<Consistency>) -> Self {
        self.consistency = consistency;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn body(&self) -> &StatementBody {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> StatementBody {
        self.body
    }

    #[must_use]
    pub const fn consistency(&self) -> Option<Consistency> {
        self.consistency
    }

    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub const fn kind(&self) -> StatementKind {
        match &self.body {
            StatementBody::Select(select) => match select.projection {
                Projection::Count => StatementKind::Count,
                _ => StatementKind::Select,
            },
            StatementBody::Insert(_) => StatementKind::Insert,
            StatementBody::Update(_) => StatementKind::Update,
            StatementBody::Delete(_) => StatementKind::Delete,
            StatementBody::Batch(_) => StatementKind::Batch,
            StatementBody::Truncate(_) => StatementKind::Truncate,
            StatementBody::CreateKeyspace(_) => StatementKind::CreateKeyspace,
            StatementBody::CreateTable(_) => StatementKind::CreateTable,
            StatementBody::CreateIndex(_) => StatementKind::CreateIndex,
            StatementBody::Use(_) => StatementKind::Use,
        }
    }

    /// Target table, if the statement has exactly one.
    #[must_use]
    pub fn table(&self) -> Option<&TableRef> {
        match &self.body {
            StatementBody::Select(s) => Some(&s.table),
            StatementBody::Insert(s) => Some(&s.table),
            StatementBody::Update(s) => Some(&s.table),
            StatementBody::Delete(s) => Some(&s.table),
            StatementBody::Truncate(table) => Some(table),
            StatementBody::CreateTable(s) => Some(&s.table),
            StatementBody::CreateIndex(s) => Some(&s.table),
            StatementBody::Batch(_)
            | StatementBody::CreateKeyspace(_)
            | StatementBody::Use(_) => None,
        }
    }

    /// Render CQL text with `?` markers and the ordered bound values.
    #[must_use]
    pub fn to_cql(&self) -> Cql {
        render::render(&self.body)
    }

    #[must_use]
    pub fn cql(&self) -> String {
        self.to_cql().text
    }

    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.to_cql().values
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_relations_compare_canonically() {
        let gte = Relation::new("age", RelationOp::Gte, Value::Int(30));
        let lt = Relation::new("age", RelationOp::Lt, Value::BigInt(40));

        assert!(gte.matches(&Value::Int(30)));
        assert!(!gte.matches(&Value::Int(29)));
        assert!(lt.matches(&Value::Int(39)));
        assert!(!lt.matches(&Value::Int(40)));
        assert!(!gte.matches(&Value::Null), "null cells never match");
    }

    #[test]
    fn in_relation_matches_any_candidate() {
        let rel = Relation::in_list("id", vec![Value::from("a"), Value::from("c")]);

        assert!(rel.matches(&Value::from("c")));
        assert!(!rel.matches(&Value::from("b")));
    }

    #[test]
    fn count_projection_reports_count_kind() {
        let mut select = Select::new(TableRef::new("app", "users"));
        select.projection = Projection::Count;

        let statement = Statement::new(select).with_consistency(Some(Consistency::One));
        assert_eq!(statement.kind(), StatementKind::Count);
        assert!(statement.kind().is_read());
        assert_eq!(statement.consistency(), Some(Consistency::One));
    }
}
