//! Statement generator
//!
//! This module turns a [`Difference`] into MySQL statements. The order is
//! fixed so that each statement only depends on the ones before it:
//!
//! 1. drop views that are removed or replaced
//! 2. table structure changes
//! 3. create views that are new or replaced
//! 4. row inserts, updates and deletes

use crate::error::{Error, Result};
use crate::schema::analyzer::MetadataProvider;
use crate::schema::diff::{DataDifference, Difference, StructureDifference, UpdateRow};
use crate::schema::types::{Column, Index, IndexKind, Row};
use crate::utils::sql::{default_literal, ident_list, literal, quote_ident, quote_str};

/// Statement generator
pub struct StatementGenerator<'a> {
    source: &'a dyn MetadataProvider,
}

impl<'a> StatementGenerator<'a> {
    /// Create a new generator reading `CREATE TABLE` text from the source
    pub fn new(source: &'a dyn MetadataProvider) -> Self {
        Self { source }
    }

    /// Generate the ordered statement list for a difference
    pub async fn generate(&self, diff: &Difference) -> Result<Vec<String>> {
        let mut statements = Vec::new();

        for view in diff
            .view_differences
            .iter()
            .filter(|v| v.operation.drops_existing())
        {
            statements.push(format!("DROP VIEW IF EXISTS {};", quote_ident(&view.view_name)));
        }

        for structure in &diff.structure_differences {
            statements.extend(self.generate_structure_sql(structure).await?);
        }

        for view in diff
            .view_differences
            .iter()
            .filter(|v| v.operation.creates_new())
        {
            let body = view.new_definition.as_deref().unwrap_or_default();
            statements.push(format!(
                "CREATE VIEW {} AS {};",
                quote_ident(&view.view_name),
                body.trim().trim_end_matches(';')
            ));
        }

        for data in diff.data_differences.values() {
            statements.extend(generate_data_sql(data));
        }

        tracing::info!(count = statements.len(), "Generated statements");

        Ok(statements)
    }

    async fn generate_structure_sql(&self, diff: &StructureDifference) -> Result<Vec<String>> {
        let table = &diff.table_name;

        if diff.is_new_table {
            let create_sql = self
                .source
                .create_table_sql(table)
                .await
                .map_err(|e| match e {
                    Error::DefinitionFetch(_) => e,
                    other => Error::DefinitionFetch(format!(
                        "Failed to get create table statement for {}: {}",
                        table, other
                    )),
                })?;
            return Ok(vec![format!("{};", create_sql.trim_end().trim_end_matches(';'))]);
        }

        Ok(alter_table_sql(diff))
    }
}

/// Incremental `ALTER TABLE` statements for an existing table
///
/// Columns are added, dropped and modified first, then indexes are dropped
/// and added.
pub fn alter_table_sql(diff: &StructureDifference) -> Vec<String> {
    let table = quote_ident(&diff.table_name);
    let mut statements = Vec::new();

    for column in &diff.columns_added {
        statements.push(format!(
            "ALTER TABLE {} ADD COLUMN {};",
            table,
            column_definition(column)
        ));
    }

    for column_name in &diff.columns_deleted {
        statements.push(format!(
            "ALTER TABLE {} DROP COLUMN {};",
            table,
            quote_ident(column_name)
        ));
    }

    for modification in &diff.columns_modified {
        statements.push(format!(
            "ALTER TABLE {} MODIFY COLUMN {};",
            table,
            column_definition(&modification.new_column)
        ));
    }

    for index in &diff.indexes_deleted {
        statements.push(match index.kind {
            IndexKind::Primary => format!("ALTER TABLE {} DROP PRIMARY KEY;", table),
            _ => format!("ALTER TABLE {} DROP INDEX {};", table, quote_ident(&index.name)),
        });
    }

    for index in &diff.indexes_added {
        statements.push(add_index_sql(&table, index));
    }

    statements
}

fn add_index_sql(table: &str, index: &Index) -> String {
    let columns = ident_list(&index.columns);
    match index.kind {
        IndexKind::Primary => format!("ALTER TABLE {} ADD PRIMARY KEY ({});", table, columns),
        IndexKind::Unique => format!(
            "ALTER TABLE {} ADD UNIQUE KEY {} ({});",
            table,
            quote_ident(&index.name),
            columns
        ),
        IndexKind::Index => format!(
            "ALTER TABLE {} ADD INDEX {} ({});",
            table,
            quote_ident(&index.name),
            columns
        ),
    }
}

/// Full column definition as used by `ADD COLUMN` and `MODIFY COLUMN`
pub fn column_definition(column: &Column) -> String {
    let mut sql = format!("{} {}", quote_ident(&column.name), column.data_type);

    // the length is only appended when the type string lacks it
    if let Some(length) = column.length {
        let upper = column.data_type.to_uppercase();
        if length > 0 && !upper.contains('(') && upper.contains("CHAR") {
            sql.push_str(&format!("({})", length));
        }
    }

    if let Some(default) = &column.default {
        sql.push_str(&format!(" DEFAULT {}", default_literal(&column.data_type, default)));
    }

    if !column.nullable {
        sql.push_str(" NOT NULL");
    }

    if column.auto_increment {
        sql.push_str(" AUTO_INCREMENT");
    }

    if let Some(charset) = &column.charset {
        sql.push_str(&format!(" CHARACTER SET {}", charset));
    }

    if let Some(collation) = &column.collation {
        sql.push_str(&format!(" COLLATE {}", collation));
    }

    if let Some(comment) = &column.comment {
        sql.push_str(&format!(" COMMENT {}", quote_str(comment)));
    }

    sql
}

/// Row statements for one table: inserts, then updates, then deletes
pub fn generate_data_sql(diff: &DataDifference) -> Vec<String> {
    let table = quote_ident(&diff.table_name);
    let primary_key = diff.primary_key.as_str();

    let inserts = diff.rows_to_insert.iter().map(|row| insert_sql(&table, row));
    let updates = diff
        .rows_to_update
        .iter()
        .filter_map(|update| update_sql(&table, primary_key, update));
    let deletes = diff
        .rows_to_delete
        .iter()
        .map(|row| delete_sql(&table, primary_key, row));

    inserts.chain(updates).chain(deletes).collect()
}

fn insert_sql(table: &str, row: &Row) -> String {
    let columns: Vec<&String> = row.keys().collect();
    let values: Vec<String> = row.values().map(literal).collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        table,
        ident_list(&columns),
        values.join(", ")
    )
}

/// `None` when the row has nothing besides the primary key to set
fn update_sql(table: &str, primary_key: &str, update: &UpdateRow) -> Option<String> {
    let assignments: Vec<String> = update
        .new_values
        .iter()
        .filter(|(column, _)| column.as_str() != primary_key)
        .map(|(column, value)| format!("{} = {}", quote_ident(column), literal(value)))
        .collect();

    if assignments.is_empty() {
        return None;
    }

    Some(format!(
        "UPDATE {} SET {} WHERE {} = {};",
        table,
        assignments.join(", "),
        quote_ident(primary_key),
        literal(&update.primary_key_value)
    ))
}

fn delete_sql(table: &str, primary_key: &str, row: &Row) -> String {
    let key = row
        .get(primary_key)
        .map(literal)
        .unwrap_or_else(|| "NULL".to_string());

    format!(
        "DELETE FROM {} WHERE {} = {};",
        table,
        quote_ident(primary_key),
        key
    )
}
