//! Type definitions for database schema objects and row data

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a table column as reported by the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Raw type string, e.g. `varchar(50)` or `tinyint(1) unsigned`
    pub data_type: String,
    /// Character length, for character types only
    pub length: Option<u32>,
    pub nullable: bool,
    pub default: Option<String>,
    pub auto_increment: bool,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub comment: Option<String>,
}

impl Column {
    /// Create a new nullable column with the given name and type
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            length: None,
            nullable: true,
            default: None,
            auto_increment: false,
            charset: None,
            collation: None,
            comment: None,
        }
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set a default value for the column
    pub fn default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    /// Mark the column as auto increment
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Set the column comment
    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// Kind of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexKind {
    Primary,
    Unique,
    Index,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Primary => write!(f, "PRIMARY"),
            IndexKind::Unique => write!(f, "UNIQUE"),
            IndexKind::Index => write!(f, "INDEX"),
        }
    }
}

/// Represents an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub kind: IndexKind,
    pub columns: Vec<String>,
}

impl Index {
    pub fn new(name: &str, kind: IndexKind, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Represents a database table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    /// Primary key column, set only when the key has exactly one column
    pub primary_key: Option<String>,
}

impl TableDefinition {
    /// Create a new table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
            primary_key: None,
        }
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Add an index to the table
    pub fn add_index(&mut self, index: Index) {
        self.indexes.push(index);
    }

    /// Set the primary key column for the table
    pub fn set_primary_key(&mut self, column: &str) {
        self.primary_key = Some(column.to_string());
    }
}

/// Represents a database view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub name: String,
    pub definition: String,
}

impl ViewDefinition {
    pub fn new(name: &str, definition: &str) -> Self {
        Self {
            name: name.to_string(),
            definition: definition.to_string(),
        }
    }
}

/// A single scalar read from a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    /// Binary string or BLOB content, kept byte-exact
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Textual rendering used to match values across databases, `None` for NULL
    pub fn render(&self) -> Option<String> {
        if self.is_null() {
            None
        } else {
            Some(self.to_string())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::UInt(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// One row, keyed by column name in select order
pub type Row = IndexMap<String, Value>;

/// Loose row equality: same column set and the same rendering for every value.
///
/// The type a driver decoded a value into does not matter, so `Int(1)` and
/// `Text("1")` are equal. NULL only equals NULL.
pub fn rows_equal(left: &Row, right: &Row) -> bool {
    if left.len() != right.len() {
        return false;
    }

    left.iter().all(|(column, value)| {
        right
            .get(column)
            .map_or(false, |other| value.render() == other.render())
    })
}

/// Build a row from `(column, value)` pairs
pub fn row<I, K, V>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_with_different_value_types_compare_by_rendering() {
        let left = row([("id", Value::Int(1)), ("name", Value::from("Alice"))]);
        let right = row([("name", Value::from("Alice")), ("id", Value::from("1"))]);

        assert!(rows_equal(&left, &right));
    }

    #[test]
    fn null_is_not_equal_to_the_text_null() {
        let left = row([("note", Value::Null)]);
        let right = row([("note", Value::from("NULL"))]);

        assert!(!rows_equal(&left, &right));
        assert!(rows_equal(&left, &left.clone()));
    }

    #[test]
    fn rows_with_different_columns_are_not_equal() {
        let left = row([("id", 1), ("name", 2)]);
        let right = row([("id", 1), ("title", 2)]);
        let shorter = row([("id", 1)]);

        assert!(!rows_equal(&left, &right));
        assert!(!rows_equal(&left, &shorter));
    }

    #[test]
    fn bytes_render_as_hex_and_never_match_lossy_text() {
        let raw = Value::from(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(raw.render().as_deref(), Some("0xdeadbeef"));

        let left = row([("id", Value::Bytes(vec![0xff, 0x00]))]);
        let lossy = String::from_utf8_lossy(&[0xff, 0x00]).into_owned();
        let right = row([("id", Value::from(lossy))]);
        assert!(!rows_equal(&left, &right));
        assert!(rows_equal(&left, &left.clone()));
    }
}
