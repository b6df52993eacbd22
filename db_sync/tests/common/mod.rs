//! In-memory database double for pipeline tests
//!
//! Serves metadata and rows like a MySQL schema would and understands the
//! view and row statements the generator emits.

#![allow(dead_code)]

use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Mutex;

use db_sync::db::StatementTarget;
use db_sync::error::{Error, Result};
use db_sync::schema::{MetadataProvider, Row, TableDefinition, Value, ViewDefinition};

struct MemoryTable {
    definition: TableDefinition,
    create_sql: Option<String>,
    rows: Vec<Row>,
}

#[derive(Default)]
struct State {
    tables: IndexMap<String, MemoryTable>,
    views: Vec<ViewDefinition>,
    executed: Vec<String>,
    fail_on: Option<String>,
    broken: Option<String>,
}

#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<State>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn with_table(self, definition: TableDefinition, rows: Vec<Row>) -> Self {
        let create_sql = Some(format!("CREATE TABLE `{}` (\n  ...\n)", definition.name));
        self.state().tables.insert(
            definition.name.clone(),
            MemoryTable {
                definition,
                create_sql,
                rows,
            },
        );
        self
    }

    /// Make `SHOW CREATE TABLE` fail for a table
    pub fn without_create_sql(self, table: &str) -> Self {
        if let Some(t) = self.state().tables.get_mut(table) {
            t.create_sql = None;
        }
        self
    }

    pub fn with_view(self, name: &str, definition: &str) -> Self {
        self.state().views.push(ViewDefinition::new(name, definition));
        self
    }

    /// Fail every statement containing `marker`
    pub fn fail_on(self, marker: &str) -> Self {
        self.state().fail_on = Some(marker.to_string());
        self
    }

    /// Fail every metadata query touching `table`
    pub fn broken_table(self, table: &str) -> Self {
        self.state().broken = Some(table.to_string());
        self
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn views(&self) -> Vec<ViewDefinition> {
        self.state().views.clone()
    }

    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    fn check_broken(&self, table: &str) -> Result<()> {
        match &self.state().broken {
            Some(broken) if broken == table => Err(Error::MetadataQuery(format!(
                "Table '{}' is marked as crashed",
                table
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl MetadataProvider for MemoryDatabase {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.state().tables.keys().cloned().collect())
    }

    async fn table_definition(&self, table: &str) -> Result<TableDefinition> {
        self.check_broken(table)?;
        self.state()
            .tables
            .get(table)
            .map(|t| t.definition.clone())
            .ok_or_else(|| Error::MetadataQuery(format!("Table '{}' doesn't exist", table)))
    }

    async fn list_views(&self) -> Result<Vec<ViewDefinition>> {
        Ok(self.state().views.clone())
    }

    async fn primary_key_values(&self, table: &str, primary_key: &str) -> Result<Vec<Value>> {
        self.check_broken(table)?;
        let state = self.state();
        let t = state
            .tables
            .get(table)
            .ok_or_else(|| Error::MetadataQuery(format!("Table '{}' doesn't exist", table)))?;
        Ok(t.rows
            .iter()
            .filter_map(|row| row.get(primary_key).cloned())
            .collect())
    }

    async fn row_by_primary_key(
        &self,
        table: &str,
        primary_key: &str,
        value: &Value,
    ) -> Result<Option<Row>> {
        let state = self.state();
        let t = state
            .tables
            .get(table)
            .ok_or_else(|| Error::MetadataQuery(format!("Table '{}' doesn't exist", table)))?;
        Ok(t.rows
            .iter()
            .find(|row| {
                row.get(primary_key)
                    .map_or(false, |v| v.render() == value.render())
            })
            .cloned())
    }

    async fn create_table_sql(&self, table: &str) -> Result<String> {
        self.state()
            .tables
            .get(table)
            .and_then(|t| t.create_sql.clone())
            .ok_or_else(|| Error::DefinitionFetch(format!("No create statement for {}", table)))
    }
}

#[async_trait]
impl StatementTarget for MemoryDatabase {
    async fn execute(&self, sql: &str) -> Result<()> {
        let mut state = self.state();
        if let Some(marker) = &state.fail_on {
            if sql.contains(marker.as_str()) {
                return Err(Error::StatementExecution(format!(
                    "You have an error in your SQL syntax near '{}'",
                    marker
                )));
            }
        }

        apply_statement(&mut state, sql)?;
        state.executed.push(sql.to_string());
        Ok(())
    }
}

fn apply_statement(state: &mut State, sql: &str) -> Result<()> {
    let sql = sql.trim().trim_end_matches(';');
    let unsupported = || Error::StatementExecution(format!("Unsupported statement: {}", sql));

    if let Some(rest) = sql.strip_prefix("DROP VIEW IF EXISTS ") {
        let name = unquote_ident(rest);
        state.views.retain(|v| v.name != name);
        return Ok(());
    }

    if let Some(rest) = sql.strip_prefix("CREATE VIEW ") {
        let (name, body) = rest.split_once(" AS ").ok_or_else(unsupported)?;
        let name = unquote_ident(name);
        if state.views.iter().any(|v| v.name == name) {
            return Err(Error::StatementExecution(format!(
                "Table '{}' already exists",
                name
            )));
        }
        state.views.push(ViewDefinition::new(&name, body));
        return Ok(());
    }

    if let Some(rest) = sql.strip_prefix("INSERT INTO ") {
        let (table, rest) = rest.split_once(" (").ok_or_else(unsupported)?;
        let (columns, values) = rest.split_once(") VALUES (").ok_or_else(unsupported)?;
        let values = values.strip_suffix(')').ok_or_else(unsupported)?;

        let columns: Vec<String> = columns.split(", ").map(unquote_ident).collect();
        let values = parse_literals(values);
        let row: Row = columns.into_iter().zip(values).collect();

        table_mut(state, table)?.rows.push(row);
        return Ok(());
    }

    if let Some(rest) = sql.strip_prefix("UPDATE ") {
        let (table, rest) = rest.split_once(" SET ").ok_or_else(unsupported)?;
        let (assignments, condition) = rest.rsplit_once(" WHERE ").ok_or_else(unsupported)?;
        let (key_column, key) = parse_condition(condition).ok_or_else(unsupported)?;

        let assignments: Vec<(String, Value)> = split_top_level(assignments)
            .into_iter()
            .filter_map(|pair| {
                let (column, value) = pair.split_once(" = ")?;
                Some((unquote_ident(column), parse_literal(value)))
            })
            .collect();

        let t = table_mut(state, table)?;
        for row in t.rows.iter_mut() {
            if row.get(&key_column).and_then(Value::render) == key.render() {
                for (column, value) in &assignments {
                    row.insert(column.clone(), value.clone());
                }
            }
        }
        return Ok(());
    }

    if let Some(rest) = sql.strip_prefix("DELETE FROM ") {
        let (table, condition) = rest.split_once(" WHERE ").ok_or_else(unsupported)?;
        let (key_column, key) = parse_condition(condition).ok_or_else(unsupported)?;

        table_mut(state, table)?
            .rows
            .retain(|row| row.get(&key_column).and_then(Value::render) != key.render());
        return Ok(());
    }

    Err(unsupported())
}

fn table_mut<'a>(state: &'a mut State, quoted: &str) -> Result<&'a mut MemoryTable> {
    let name = unquote_ident(quoted);
    state
        .tables
        .get_mut(&name)
        .ok_or_else(|| Error::StatementExecution(format!("Table '{}' doesn't exist", name)))
}

fn parse_condition(condition: &str) -> Option<(String, Value)> {
    let (column, value) = condition.split_once(" = ")?;
    Some((unquote_ident(column), parse_literal(value)))
}

fn unquote_ident(quoted: &str) -> String {
    let quoted = quoted.trim();
    quoted
        .strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
        .unwrap_or(quoted)
        .replace("``", "`")
}

fn parse_literals(values: &str) -> Vec<Value> {
    split_top_level(values)
        .into_iter()
        .map(|v| parse_literal(&v))
        .collect()
}

fn parse_literal(literal: &str) -> Value {
    let literal = literal.trim();
    if literal == "NULL" {
        return Value::Null;
    }
    if let Some(digits) = literal.strip_prefix("X'").and_then(|s| s.strip_suffix('\'')) {
        if let Ok(bytes) = hex::decode(digits) {
            return Value::Bytes(bytes);
        }
    }
    if let Some(inner) = literal.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Value::Text(unescape(inner));
    }
    if let Ok(i) = literal.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(u) = literal.parse::<u64>() {
        return Value::UInt(u);
    }
    if let Ok(f) = literal.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Text(literal.to_string())
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Split on `, ` outside of quoted strings
fn split_top_level(list: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = list.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '\'' {
                in_string = false;
            }
            continue;
        }

        match c {
            '\'' => {
                in_string = true;
                current.push(c);
            }
            ',' if chars.peek() == Some(&' ') => {
                chars.next();
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
