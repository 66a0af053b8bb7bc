//! Parser for the raw CQL subset the in-memory session accepts.
//!
//! Supported: `USE`, `TRUNCATE`, `SELECT` (`*`, `COUNT(*)` or a column
//! list, `WHERE`, `LIMIT`, `ALLOW FILTERING`), `INSERT ... VALUES`,
//! `UPDATE ... SET col = literal` and `DELETE`. Literals are strings,
//! numbers, booleans and `null`; bind markers are not accepted.

use crate::{
    db::{
        SessionError,
        statement::{
            Assignment, Delete, Insert, Projection, Relation, RelationOp, Select, StatementBody,
            TableRef, Update, Using,
        },
    },
    value::Value,
};

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Str(String),
    Number(String),
    Symbol(&'static str),
}

fn invalid(message: impl Into<String>) -> SessionError {
    SessionError::invalid(message)
}

fn tokenize(cql: &str) -> Result<Vec<Token>, SessionError> {
    let chars: Vec<char> = cql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Word(chars[start..i].iter().collect()));
        } else if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            tokens.push(Token::Number(chars[start..i].iter().collect()));
        } else if c == '\'' || c == '"' {
            let (text, next) = quoted(&chars, i, c)?;
            tokens.push(if c == '\'' {
                Token::Str(text)
            } else {
                Token::Quoted(text)
            });
            i = next;
        } else {
            let two: String = chars[i..chars.len().min(i + 2)].iter().collect();
            let symbol = match (two.as_str(), c) {
                ("<=", _) => "<=",
                (">=", _) => ">=",
                (_, '<') => "<",
                (_, '>') => ">",
                (_, '=') => "=",
                (_, '(') => "(",
                (_, ')') => ")",
                (_, ',') => ",",
                (_, '.') => ".",
                (_, '*') => "*",
                (_, ';') => ";",
                (_, '?') => "?",
                _ => return Err(invalid(format!("line 1:{i} unexpected character '{c}'"))),
            };
            i += symbol.len();
            tokens.push(Token::Symbol(symbol));
        }
    }

    Ok(tokens)
}

// A quote character inside the literal is escaped by doubling it.
fn quoted(chars: &[char], start: usize, quote: char) -> Result<(String, usize), SessionError> {
    let mut text = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                text.push(quote);
                i += 2;
                continue;
            }
            return Ok((text, i + 1));
        }
        text.push(chars[i]);
        i += 1;
    }

    Err(invalid("unterminated quoted literal"))
}

///
/// Parser
///

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    current_keyspace: Option<&'a str>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = self.at_keyword(keyword);
        if found {
            self.pos += 1;
        }
        found
    }

    fn keyword(&mut self, keyword: &str) -> Result<(), SessionError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword))
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        let found = matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol);
        if found {
            self.pos += 1;
        }
        found
    }

    fn symbol(&mut self, symbol: &str) -> Result<(), SessionError> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.unexpected(symbol))
        }
    }

    fn unexpected(&self, expected: &str) -> SessionError {
        match self.peek() {
            Some(token) => invalid(format!("expected {expected}, found {token:?}")),
            None => invalid(format!("expected {expected}, found end of input")),
        }
    }

    fn identifier(&mut self) -> Result<String, SessionError> {
        match self.next() {
            Some(Token::Word(word)) => Ok(word.to_ascii_lowercase()),
            Some(Token::Quoted(name)) => Ok(name),
            _ => {
                self.pos -= 1;
                Err(self.unexpected("identifier"))
            }
        }
    }

    fn table(&mut self) -> Result<TableRef, SessionError> {
        let first = self.identifier()?;
        if self.eat_symbol(".") {
            let column_family = self.identifier()?;
            return Ok(TableRef::new(first, column_family));
        }

        let keyspace = self
            .current_keyspace
            .ok_or_else(|| invalid("No keyspace has been specified. USE a keyspace, or explicitly specify keyspace.tablename"))?;
        Ok(TableRef::new(keyspace, first))
    }

    fn literal(&mut self) -> Result<Value, SessionError> {
        match self.next() {
            Some(Token::Str(text)) => Ok(Value::Text(text)),
            Some(Token::Number(n)) if n.contains('.') => n
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| invalid(format!("invalid number {n}"))),
            Some(Token::Number(n)) => n
                .parse::<i64>()
                .map(Value::BigInt)
                .map_err(|_| invalid(format!("invalid number {n}"))),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("null") => Ok(Value::Null),
            Some(Token::Symbol("?")) => Err(invalid("bind markers are not supported in raw statements")),
            _ => {
                self.pos -= 1;
                Err(self.unexpected("literal"))
            }
        }
    }

    fn list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, SessionError>,
    ) -> Result<Vec<T>, SessionError> {
        self.symbol("(")?;
        let mut items = vec![item(self)?];
        while self.eat_symbol(",") {
            items.push(item(self)?);
        }
        self.symbol(")")?;

        Ok(items)
    }

    fn relations(&mut self) -> Result<Vec<Relation>, SessionError> {
        if !self.eat_keyword("where") {
            return Ok(Vec::new());
        }

        let mut relations = vec![self.relation()?];
        while self.eat_keyword("and") {
            relations.push(self.relation()?);
        }

        Ok(relations)
    }

    fn relation(&mut self) -> Result<Relation, SessionError> {
        let column = self.identifier()?;

        if self.eat_keyword("in") {
            let values = self.list(Self::literal)?;
            return Ok(Relation::in_list(column, values));
        }

        let op = match self.next() {
            Some(Token::Symbol("=")) => RelationOp::Eq,
            Some(Token::Symbol("<")) => RelationOp::Lt,
            Some(Token::Symbol("<=")) => RelationOp::Lte,
            Some(Token::Symbol(">")) => RelationOp::Gt,
            Some(Token::Symbol(">=")) => RelationOp::Gte,
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("relation operator"));
            }
        };

        Ok(Relation::new(column, op, self.literal()?))
    }

    fn end(&mut self) -> Result<(), SessionError> {
        self.eat_symbol(";");
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.unexpected("end of statement")),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statement(&mut self) -> Result<StatementBody, SessionError> {
        let body = if self.eat_keyword("use") {
            StatementBody::Use(self.identifier()?)
        } else if self.eat_keyword("truncate") {
            self.eat_keyword("table");
            StatementBody::Truncate(self.table()?)
        } else if self.eat_keyword("select") {
            StatementBody::Select(self.select()?)
        } else if self.eat_keyword("insert") {
            StatementBody::Insert(self.insert()?)
        } else if self.eat_keyword("update") {
            StatementBody::Update(self.update()?)
        } else if self.eat_keyword("delete") {
            StatementBody::Delete(self.delete()?)
        } else {
            return Err(self.unexpected("USE, TRUNCATE, SELECT, INSERT, UPDATE or DELETE"));
        };

        self.end()?;
        Ok(body)
    }

    fn select(&mut self) -> Result<Select, SessionError> {
        let projection = if self.eat_symbol("*") {
            Projection::All
        } else if self.eat_keyword("count") {
            self.symbol("(")?;
            self.symbol("*")?;
            self.symbol(")")?;
            Projection::Count
        } else {
            let mut columns = vec![self.identifier()?];
            while self.eat_symbol(",") {
                columns.push(self.identifier()?);
            }
            Projection::Columns(columns)
        };

        self.keyword("from")?;
        let mut select = Select::new(self.table()?);
        select.projection = projection;
        select.relations = self.relations()?;

        if self.eat_keyword("limit") {
            select.limit = match self.literal()? {
                Value::BigInt(n) => Some(u32::try_from(n).map_err(|_| invalid("LIMIT must be strictly positive"))?),
                _ => return Err(invalid("LIMIT must be an integer")),
            };
        }
        if self.eat_keyword("allow") {
            self.keyword("filtering")?;
            select.allow_filtering = true;
        }

        Ok(select)
    }

    fn insert(&mut self) -> Result<Insert, SessionError> {
        self.keyword("into")?;
        let table = self.table()?;
        let columns = self.list(Self::identifier)?;
        self.keyword("values")?;
        let values = self.list(Self::literal)?;

        if columns.len() != values.len() {
            return Err(invalid("Unmatched column names/values"));
        }

        let mut if_not_exists = false;
        if self.eat_keyword("if") {
            self.keyword("not")?;
            self.keyword("exists")?;
            if_not_exists = true;
        }

        Ok(Insert {
            table,
            values: columns.into_iter().zip(values).collect(),
            if_not_exists,
            using: Using::default(),
        })
    }

    fn update(&mut self) -> Result<Update, SessionError> {
        let table = self.table()?;
        self.keyword("set")?;

        let mut assignments = Vec::new();
        loop {
            let column = self.identifier()?;
            self.symbol("=")?;
            let value = self.literal()?;
            assignments.push(Assignment::Set { column, value });

            if !self.eat_symbol(",") {
                break;
            }
        }

        Ok(Update {
            table,
            assignments,
            relations: self.relations()?,
            using: Using::default(),
        })
    }

    fn delete(&mut self) -> Result<Delete, SessionError> {
        let mut columns = Vec::new();
        if !self.at_keyword("from") {
            columns.push(self.identifier()?);
            while self.eat_symbol(",") {
                columns.push(self.identifier()?);
            }
        }

        self.keyword("from")?;
        Ok(Delete {
            table: self.table()?,
            columns,
            relations: self.relations()?,
        })
    }
}

/// Parse one raw statement. Unqualified tables resolve against
/// `current_keyspace`.
pub(super) fn parse(cql: &str, current_keyspace: Option<&str>) -> Result<StatementBody, SessionError> {
    let mut parser = Parser {
        tokens: tokenize(cql)?,
        pos: 0,
        current_keyspace,
    };

    parser.statement()
}
