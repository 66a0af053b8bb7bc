use crate::{
    db::statement::{
        Assignment, Batch, BatchKind, CreateIndex, CreateKeyspace, CreateTable, Delete, Insert,
        Projection, Relation, RelationOp, Select, StatementBody, Update, Using,
    },
    value::Value,
};
use std::{borrow::Cow, fmt::Write as _};

// Words that cannot appear unquoted as identifiers.
const RESERVED: &[&str] = &[
    "add", "allow", "alter", "and", "apply", "asc", "authorize", "batch", "begin", "by",
    "columnfamily", "create", "delete", "desc", "describe", "drop", "entries", "execute", "from",
    "full", "grant", "if", "in", "index", "infinity", "insert", "into", "keyspace", "limit",
    "modify", "nan", "norecursive", "not", "null", "of", "on", "or", "order", "primary",
    "rename", "revoke", "schema", "select", "set", "table", "to", "token", "truncate",
    "unlogged", "update", "use", "using", "where", "with",
];

///
/// Cql
/// Rendered statement: text with `?` markers plus values in marker order.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Cql {
    pub text: String,
    pub values: Vec<Value>,
}

/// Quote an identifier unless it is a plain lowercase name.
#[must_use]
pub fn quote_identifier(name: &str) -> Cow<'_, str> {
    let mut chars = name.chars();
    let plain = chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !RESERVED.contains(&name);

    if plain {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

pub(super) fn render(body: &StatementBody) -> Cql {
    let mut w = Writer::default();
    w.body(body);

    Cql {
        text: w.text,
        values: w.values,
    }
}

///
/// Writer
///

#[derive(Default)]
struct Writer {
    text: String,
    values: Vec<Value>,
}

impl Writer {
    fn push(&mut self, s: &str) {
        self.text.push_str(s);
    }

    fn ident(&mut self, name: &str) {
        let quoted = quote_identifier(name);
        self.text.push_str(&quoted);
    }

    fn bind(&mut self, value: &Value) {
        self.text.push('?');
        self.values.push(value.clone());
    }

    fn idents<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for (i, name) in names.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.ident(name);
        }
    }

    fn body(&mut self, body: &StatementBody) {
        match body {
            StatementBody::Select(s) => self.select(s),
            StatementBody::Insert(s) => self.insert(s),
            StatementBody::Update(s) => self.update(s),
            StatementBody::Delete(s) => self.delete(s),
            StatementBody::Batch(s) => self.batch(s),
            StatementBody::Truncate(table) => {
                let _ = write!(self.text, "TRUNCATE {table}");
            }
            StatementBody::CreateKeyspace(s) => self.create_keyspace(s),
            StatementBody::CreateTable(s) => self.create_table(s),
            StatementBody::CreateIndex(s) => self.create_index(s),
            StatementBody::Use(keyspace) => {
                self.push("USE ");
                self.ident(keyspace);
            }
        }
    }

    fn select(&mut self, s: &Select) {
        self.push("SELECT ");
        match &s.projection {
            Projection::All => self.push("*"),
            Projection::Columns(columns) => self.idents(columns.iter().map(String::as_str)),
            Projection::Count => self.push("COUNT(*)"),
        }
        let _ = write!(self.text, " FROM {}", s.table);
        self.relations(&s.relations);
        if let Some(limit) = s.limit {
            let _ = write!(self.text, " LIMIT {limit}");
        }
        if s.allow_filtering {
            self.push(" ALLOW FILTERING");
        }
    }

    fn insert(&mut self, s: &Insert) {
        let _ = write!(self.text, "INSERT INTO {} (", s.table);
        self.idents(s.values.iter().map(|(column, _)| column.as_str()));
        self.push(") VALUES (");
        for (i, (_, value)) in s.values.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.bind(value);
        }
        self.push(")");
        if s.if_not_exists {
            self.push(" IF NOT EXISTS");
        }
        self.using(s.using);
    }

    fn update(&mut self, s: &Update) {
        let _ = write!(self.text, "UPDATE {}", s.table);
        self.using(s.using);
        self.push(" SET ");
        for (i, assignment) in s.assignments.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.ident(assignment.column());
            self.push(" = ");
            match assignment {
                Assignment::Set { value, .. } => self.bind(value),
                Assignment::Append { column, value } => {
                    self.ident(column);
                    self.push(" + ");
                    self.bind(value);
                }
                Assignment::Remove { column, value } => {
                    self.ident(column);
                    self.push(" - ");
                    self.bind(value);
                }
            }
        }
        self.relations(&s.relations);
    }

    fn delete(&mut self, s: &Delete) {
        self.push("DELETE ");
        if !s.columns.is_empty() {
            self.idents(s.columns.iter().map(String::as_str));
            self.push(" ");
        }
        let _ = write!(self.text, "FROM {}", s.table);
        self.relations(&s.relations);
    }

    fn batch(&mut self, s: &Batch) {
        match s.kind {
            BatchKind::Logged => self.push("BEGIN BATCH "),
            BatchKind::Unlogged => self.push("BEGIN UNLOGGED BATCH "),
        }
        for statement in &s.statements {
            self.body(statement.body());
            self.push("; ");
        }
        self.push("APPLY BATCH");
    }

    fn create_keyspace(&mut self, s: &CreateKeyspace) {
        self.push("CREATE KEYSPACE ");
        if s.if_not_exists {
            self.push("IF NOT EXISTS ");
        }
        self.ident(&s.name);
        let _ = write!(self.text, " WITH replication = {}", s.replication.to_cql_map());
    }

    fn create_table(&mut self, s: &CreateTable) {
        self.push("CREATE TABLE ");
        if s.if_not_exists {
            self.push("IF NOT EXISTS ");
        }
        let _ = write!(self.text, "{} (", s.table);
        for (i, (column, column_type)) in s.columns.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.ident(column);
            let _ = write!(self.text, " {column_type}");
            if *column == s.primary_key {
                self.push(" PRIMARY KEY");
            }
        }
        self.push(")");
    }

    fn create_index(&mut self, s: &CreateIndex) {
        self.push("CREATE INDEX ");
        if s.if_not_exists {
            self.push("IF NOT EXISTS ");
        }
        self.ident(&s.name);
        let _ = write!(self.text, " ON {} (", s.table);
        self.ident(&s.column);
        self.push(")");
    }

    fn relations(&mut self, relations: &[Relation]) {
        for (i, relation) in relations.iter().enumerate() {
            self.push(if i == 0 { " WHERE " } else { " AND " });
            self.ident(&relation.column);
            let _ = write!(self.text, " {} ", relation.op.as_str());

            match (&relation.op, &relation.value) {
                (RelationOp::In, Value::List(candidates)) => {
                    self.push("(");
                    for (j, candidate) in candidates.iter().enumerate() {
                        if j > 0 {
                            self.push(", ");
                        }
                        self.bind(candidate);
                    }
                    self.push(")");
                }
                (_, value) => self.bind(value),
            }
        }
    }

    fn using(&mut self, using: Using) {
        if using.is_empty() {
            return;
        }

        self.push(" USING");
        if let Some(ttl) = using.ttl {
            let _ = write!(self.text, " TTL {ttl}");
        }
        if let Some(timestamp) = using.timestamp {
            if using.ttl.is_some() {
                self.push(" AND");
            }
            let _ = write!(self.text, " TIMESTAMP {timestamp}");
        }
    }
}
