//! Database schema analyzer
//!
//! This module reads table, index and view metadata as well as row data from
//! one MySQL database. The comparator and generator only see it through the
//! [`MetadataProvider`] trait.

use async_trait::async_trait;
use indexmap::IndexMap;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column as _, MySql, Row as _, TypeInfo as _, ValueRef as _};

use crate::db::connection::DatabaseConnection;
use crate::error::{Error, Result};
use crate::schema::types::{Column, Index, IndexKind, Row, TableDefinition, Value, ViewDefinition};
use crate::utils::sql::quote_ident;

/// Read access to the schema and rows of one database
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Names of all base tables, views excluded
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns, indexes and primary key of a table
    async fn table_definition(&self, table: &str) -> Result<TableDefinition>;

    /// All views with their body text
    async fn list_views(&self) -> Result<Vec<ViewDefinition>>;

    /// Every primary key value present in a table
    async fn primary_key_values(&self, table: &str, primary_key: &str) -> Result<Vec<Value>>;

    /// The full row with the given primary key value, if it exists
    async fn row_by_primary_key(
        &self,
        table: &str,
        primary_key: &str,
        value: &Value,
    ) -> Result<Option<Row>>;

    /// The database's own `CREATE TABLE` text for a table
    async fn create_table_sql(&self, table: &str) -> Result<String>;
}

/// MySQL schema analyzer for database schema introspection
pub struct SchemaAnalyzer {
    connection: DatabaseConnection,
}

impl SchemaAnalyzer {
    /// Create a new schema analyzer
    pub fn new(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

#[async_trait]
impl MetadataProvider for SchemaAnalyzer {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let sql = r#"
            SELECT TABLE_NAME AS table_name
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let rows = sqlx::query(sql)
            .fetch_all(self.connection.pool())
            .await
            .map_err(|e| Error::metadata("Failed to query tables", e))?;

        rows.iter()
            .map(|row| required_text(row, "table_name"))
            .collect()
    }

    async fn table_definition(&self, table: &str) -> Result<TableDefinition> {
        let mut definition = TableDefinition::new(table);

        let sql = r#"
            SELECT
                COLUMN_NAME AS column_name,
                COLUMN_TYPE AS column_type,
                IS_NULLABLE AS is_nullable,
                COLUMN_DEFAULT AS column_default,
                EXTRA AS extra,
                CHARACTER_SET_NAME AS character_set_name,
                COLLATION_NAME AS collation_name,
                COLUMN_COMMENT AS column_comment,
                CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED) AS character_maximum_length
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let column_rows = sqlx::query(sql)
            .bind(table)
            .fetch_all(self.connection.pool())
            .await
            .map_err(|e| Error::metadata(format!("Failed to query columns of {}", table), e))?;

        for row in &column_rows {
            let extra = optional_text(row, "extra")?.unwrap_or_default();
            let length: Option<i64> = row
                .try_get("character_maximum_length")
                .map_err(|e| Error::metadata("Failed to read column length", e))?;

            definition.add_column(Column {
                name: required_text(row, "column_name")?,
                data_type: required_text(row, "column_type")?,
                length: length.and_then(|l| u32::try_from(l).ok()),
                nullable: required_text(row, "is_nullable")? == "YES",
                default: optional_text(row, "column_default")?,
                auto_increment: extra.to_lowercase().contains("auto_increment"),
                charset: optional_text(row, "character_set_name")?,
                collation: optional_text(row, "collation_name")?,
                // MySQL reports a missing comment as ''
                comment: optional_text(row, "column_comment")?.filter(|c| !c.is_empty()),
            });
        }

        let sql = r#"
            SELECT
                INDEX_NAME AS index_name,
                COLUMN_NAME AS column_name,
                CAST(NON_UNIQUE AS SIGNED) AS non_unique
            FROM INFORMATION_SCHEMA.STATISTICS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            ORDER BY INDEX_NAME, SEQ_IN_INDEX
        "#;

        let index_rows = sqlx::query(sql)
            .bind(table)
            .fetch_all(self.connection.pool())
            .await
            .map_err(|e| Error::metadata(format!("Failed to query indexes of {}", table), e))?;

        let mut indexes: IndexMap<String, Index> = IndexMap::new();
        for row in &index_rows {
            let index_name = required_text(row, "index_name")?;
            let non_unique: i64 = row
                .try_get("non_unique")
                .map_err(|e| Error::metadata("Failed to read index uniqueness", e))?;

            let kind = if index_name == "PRIMARY" {
                IndexKind::Primary
            } else if non_unique == 0 {
                IndexKind::Unique
            } else {
                IndexKind::Index
            };

            let index = indexes.entry(index_name.clone()).or_insert_with(|| Index {
                name: index_name,
                kind,
                columns: Vec::new(),
            });

            // functional index parts have no column name
            if let Some(column_name) = optional_text(row, "column_name")? {
                index.columns.push(column_name);
            }
        }

        definition.indexes = indexes.into_values().collect();

        let primary_columns = definition
            .indexes
            .iter()
            .find(|index| index.kind == IndexKind::Primary)
            .map(|index| index.columns.clone())
            .unwrap_or_default();
        if let [column] = primary_columns.as_slice() {
            definition.set_primary_key(column);
        }

        Ok(definition)
    }

    async fn list_views(&self) -> Result<Vec<ViewDefinition>> {
        let sql = r#"
            SELECT TABLE_NAME AS table_name, VIEW_DEFINITION AS view_definition
            FROM INFORMATION_SCHEMA.VIEWS
            WHERE TABLE_SCHEMA = DATABASE()
            ORDER BY TABLE_NAME
        "#;

        let rows = sqlx::query(sql)
            .fetch_all(self.connection.pool())
            .await
            .map_err(|e| Error::metadata("Failed to query views", e))?;

        rows.iter()
            .map(|row| -> Result<ViewDefinition> {
                Ok(ViewDefinition {
                    name: required_text(row, "table_name")?,
                    definition: optional_text(row, "view_definition")?.unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn primary_key_values(&self, table: &str, primary_key: &str) -> Result<Vec<Value>> {
        let sql = format!(
            "SELECT {} FROM {}",
            quote_ident(primary_key),
            quote_ident(table)
        );

        let rows = sqlx::query(&sql)
            .fetch_all(self.connection.pool())
            .await
            .map_err(|e| {
                Error::metadata(format!("Failed to query primary key values of {}", table), e)
            })?;

        rows.iter().map(|row| decode_value(row, 0)).collect()
    }

    async fn row_by_primary_key(
        &self,
        table: &str,
        primary_key: &str,
        value: &Value,
    ) -> Result<Option<Row>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            quote_ident(table),
            quote_ident(primary_key)
        );

        let found = bind_value(sqlx::query(&sql), value)
            .fetch_optional(self.connection.pool())
            .await
            .map_err(|e| Error::metadata(format!("Failed to query row of {}", table), e))?;

        let Some(found) = found else {
            return Ok(None);
        };

        let mut row = Row::with_capacity(found.columns().len());
        for (index, column) in found.columns().iter().enumerate() {
            row.insert(column.name().to_string(), decode_value(&found, index)?);
        }

        Ok(Some(row))
    }

    async fn create_table_sql(&self, table: &str) -> Result<String> {
        let sql = format!("SHOW CREATE TABLE {}", quote_ident(table));

        let row = sqlx::query(&sql)
            .fetch_optional(self.connection.pool())
            .await
            .map_err(|e| {
                Error::DefinitionFetch(format!(
                    "Failed to query create statement of {}: {}",
                    table, e
                ))
            })?
            .ok_or_else(|| {
                Error::DefinitionFetch(format!("No result from SHOW CREATE TABLE for {}", table))
            })?;

        text_at(&row, 1)?.ok_or_else(|| {
            Error::DefinitionFetch(format!("Empty create statement for {}", table))
        })
    }
}

/// Read a string column, tolerating binary-typed metadata columns
fn optional_text(row: &MySqlRow, column: &str) -> Result<Option<String>> {
    let bytes: Option<Vec<u8>> = row
        .try_get_unchecked(column)
        .map_err(|e| Error::metadata(format!("Failed to read {}", column), e))?;
    Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
}

fn required_text(row: &MySqlRow, column: &str) -> Result<String> {
    optional_text(row, column)?
        .ok_or_else(|| Error::MetadataQuery(format!("Unexpected NULL in {}", column)))
}

fn text_at(row: &MySqlRow, index: usize) -> Result<Option<String>> {
    let bytes: Option<Vec<u8>> = row
        .try_get_unchecked(index)
        .map_err(|e| Error::metadata(format!("Failed to read column {}", index), e))?;
    Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::UInt(u) => query.bind(*u),
        Value::Float(x) => query.bind(*x),
        Value::Text(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
    }
}

/// Decode one column of a result row into a [`Value`]
fn decode_value(row: &MySqlRow, index: usize) -> Result<Value> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| Error::metadata("Failed to read value", e))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let type_name = row.columns()[index].type_info().name().to_uppercase();
    let decode_err = |e: sqlx::Error| Error::metadata(format!("Failed to decode {}", type_name), e);
    let raw_bytes = || {
        row.try_get_unchecked::<Vec<u8>, _>(index)
            .map_err(decode_err)
    };

    let value = match type_name.as_str() {
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            Value::Int(row.try_get_unchecked::<i64, _>(index).map_err(decode_err)?)
        }
        name if name.ends_with("INT UNSIGNED") => {
            Value::UInt(row.try_get_unchecked::<u64, _>(index).map_err(decode_err)?)
        }
        "FLOAT" => Value::Float(f64::from(
            row.try_get_unchecked::<f32, _>(index).map_err(decode_err)?,
        )),
        "DOUBLE" => Value::Float(row.try_get_unchecked::<f64, _>(index).map_err(decode_err)?),
        // zero dates have no chrono form
        "DATE" => match row.try_get_unchecked::<chrono::NaiveDate, _>(index) {
            Ok(date) => Value::Text(date.to_string()),
            Err(_) => Value::Text(temporal_text(&type_name, &raw_bytes()?)),
        },
        "DATETIME" | "TIMESTAMP" => {
            match row.try_get_unchecked::<chrono::NaiveDateTime, _>(index) {
                Ok(datetime) => Value::Text(datetime.to_string()),
                Err(_) => Value::Text(temporal_text(&type_name, &raw_bytes()?)),
            }
        }
        // TIME spans -838:59:59 to 838:59:59, beyond what NaiveTime holds
        "TIME" => Value::Text(temporal_text(&type_name, &raw_bytes()?)),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => Value::Bytes(raw_bytes()?),
        _ => match String::from_utf8(raw_bytes()?) {
            Ok(text) => Value::Text(text),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
    };

    Ok(value)
}

/// Format a DATE, DATETIME, TIMESTAMP or TIME value the way MySQL prints it
///
/// `bytes` is either the binary protocol encoding (a length byte followed by
/// the fields) or, for text protocol results, the already formatted value.
fn temporal_text(type_name: &str, bytes: &[u8]) -> String {
    let is_binary = bytes
        .first()
        .map_or(false, |&len| usize::from(len) + 1 == bytes.len());
    if !is_binary {
        return String::from_utf8_lossy(bytes).into_owned();
    }

    let body = &bytes[1..];
    let byte = |i: usize| body.get(i).copied().unwrap_or(0);
    let micros = |at: usize| {
        body.get(at..at + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .filter(|&m| m > 0)
            .map(|m| format!(".{:06}", m))
            .unwrap_or_default()
    };

    if type_name == "TIME" {
        let sign = if byte(0) == 1 { "-" } else { "" };
        let days = u32::from_le_bytes([byte(1), byte(2), byte(3), byte(4)]);
        let hours = days * 24 + u32::from(byte(5));
        return format!(
            "{}{:02}:{:02}:{:02}{}",
            sign,
            hours,
            byte(6),
            byte(7),
            micros(8)
        );
    }

    let year = u16::from_le_bytes([byte(0), byte(1)]);
    let date = format!("{:04}-{:02}-{:02}", year, byte(2), byte(3));
    if type_name == "DATE" {
        return date;
    }

    format!(
        "{} {:02}:{:02}:{:02}{}",
        date,
        byte(4),
        byte(5),
        byte(6),
        micros(7)
    )
}
