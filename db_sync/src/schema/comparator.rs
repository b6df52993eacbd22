//! Source/target comparator
//!
//! Derives the structural, data and view differences between two databases.
//! Tables that only exist in the target are never reported: this tool does
//! not drop tables.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{Error, Result};
use crate::schema::analyzer::MetadataProvider;
use crate::schema::diff::{
    ColumnModification, DataDifference, Difference, StructureDifference, UpdateRow,
    ViewDifference, ViewOperation,
};
use crate::schema::types::{rows_equal, Column, Index, Row, Value, ViewDefinition};

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Columns that differ between a source and a target table
#[derive(Debug, Default)]
pub struct ColumnChanges {
    pub added: Vec<Column>,
    pub deleted: Vec<String>,
    pub modified: Vec<ColumnModification>,
}

/// Indexes that differ between a source and a target table, by name
#[derive(Debug, Default)]
pub struct IndexChanges {
    pub added: Vec<Index>,
    pub deleted: Vec<Index>,
}

/// Compares a source database against a target database
pub struct Comparator<'a> {
    source: &'a dyn MetadataProvider,
    target: &'a dyn MetadataProvider,
}

impl<'a> Comparator<'a> {
    pub fn new(source: &'a dyn MetadataProvider, target: &'a dyn MetadataProvider) -> Self {
        Self { source, target }
    }

    /// Compute the full difference between source and target
    ///
    /// Rows are only compared for tables listed in `data_sync_tables`. Any
    /// failing metadata or row query aborts the whole comparison.
    pub async fn compare(&self, data_sync_tables: &[String]) -> Result<Difference> {
        let source_tables = self.source.list_tables().await.map_err(as_metadata_error)?;
        let target_tables: HashSet<String> = self
            .target
            .list_tables()
            .await
            .map_err(as_metadata_error)?
            .into_iter()
            .collect();

        let structure_differences = self
            .compare_table_structures(&source_tables, &target_tables)
            .await?;
        let data_differences = self
            .compare_table_data(&source_tables, data_sync_tables)
            .await?;
        let view_differences = self.compare_views().await?;

        let diff = Difference {
            structure_differences,
            data_differences,
            view_differences,
        };

        tracing::info!(
            structure = diff.structure_differences.len(),
            data = diff.data_differences.len(),
            views = diff.view_differences.len(),
            "Comparison complete"
        );

        Ok(diff)
    }

    async fn compare_table_structures(
        &self,
        source_tables: &[String],
        target_tables: &HashSet<String>,
    ) -> Result<Vec<StructureDifference>> {
        let mut differences = Vec::new();

        for table_name in source_tables {
            let source_def = self
                .source
                .table_definition(table_name)
                .await
                .map_err(as_metadata_error)?;

            if !target_tables.contains(table_name) {
                tracing::debug!(table = %table_name, "Table missing from target");
                differences.push(StructureDifference::new_table(source_def));
                continue;
            }

            let target_def = self
                .target
                .table_definition(table_name)
                .await
                .map_err(as_metadata_error)?;

            let columns = compare_columns(&source_def.columns, &target_def.columns);
            let indexes = compare_indexes(&source_def.indexes, &target_def.indexes);

            let mut diff = StructureDifference::new(table_name);
            diff.columns_added = columns.added;
            diff.columns_deleted = columns.deleted;
            diff.columns_modified = columns.modified;
            diff.indexes_added = indexes.added;
            diff.indexes_deleted = indexes.deleted;

            if !diff.is_empty() {
                differences.push(diff);
            }
        }

        Ok(differences)
    }

    async fn compare_table_data(
        &self,
        source_tables: &[String],
        data_sync_tables: &[String],
    ) -> Result<BTreeMap<String, DataDifference>> {
        let wanted: HashSet<&str> = data_sync_tables.iter().map(String::as_str).collect();
        let mut differences = BTreeMap::new();

        for table_name in source_tables.iter().filter(|t| wanted.contains(t.as_str())) {
            let source_def = self
                .source
                .table_definition(table_name)
                .await
                .map_err(as_metadata_error)?;

            let Some(primary_key) = source_def.primary_key.as_deref() else {
                tracing::debug!(
                    table = %table_name,
                    "Skipping data sync for table without a single-column primary key"
                );
                continue;
            };

            let diff = self.compare_rows(table_name, primary_key).await?;
            if !diff.is_empty() {
                differences.insert(table_name.clone(), diff);
            }
        }

        Ok(differences)
    }

    /// Compare the rows of one table by primary key
    ///
    /// Keys are matched by their rendering, consistent with [`rows_equal`].
    async fn compare_rows(&self, table: &str, primary_key: &str) -> Result<DataDifference> {
        let mut diff = DataDifference::new(table, primary_key);

        let source_keys = key_set(
            self.source
                .primary_key_values(table, primary_key)
                .await
                .map_err(as_metadata_error)?,
        );

        // A table that only exists in the source has no rows in the target yet
        let target_values = match self.target.primary_key_values(table, primary_key).await {
            Ok(values) => values,
            Err(e) => {
                if self.target_has_table(table).await? {
                    return Err(as_metadata_error(e));
                }
                Vec::new()
            }
        };
        let target_keys = key_set(target_values);

        for (rendered, key) in &source_keys {
            let source_row = self.fetch_row(self.source, table, primary_key, key).await?;

            if !target_keys.contains_key(rendered) {
                diff.rows_to_insert.push(source_row);
                continue;
            }

            let target_row = self.fetch_row(self.target, table, primary_key, key).await?;
            if !rows_equal(&source_row, &target_row) {
                diff.rows_to_update.push(UpdateRow {
                    primary_key_value: key.clone(),
                    old_values: target_row,
                    new_values: source_row,
                });
            }
        }

        for (rendered, key) in &target_keys {
            if !source_keys.contains_key(rendered) {
                let target_row = self.fetch_row(self.target, table, primary_key, key).await?;
                diff.rows_to_delete.push(target_row);
            }
        }

        tracing::debug!(
            table = %table,
            insert = diff.rows_to_insert.len(),
            update = diff.rows_to_update.len(),
            delete = diff.rows_to_delete.len(),
            "Compared table data"
        );

        Ok(diff)
    }

    async fn target_has_table(&self, table: &str) -> Result<bool> {
        let tables = self.target.list_tables().await.map_err(as_metadata_error)?;
        Ok(tables.iter().any(|t| t == table))
    }

    async fn fetch_row(
        &self,
        provider: &dyn MetadataProvider,
        table: &str,
        primary_key: &str,
        key: &Value,
    ) -> Result<Row> {
        provider
            .row_by_primary_key(table, primary_key, key)
            .await
            .map_err(as_metadata_error)?
            .ok_or_else(|| {
                Error::MetadataQuery(format!(
                    "Row {} = {} of {} disappeared during comparison",
                    primary_key, key, table
                ))
            })
    }

    async fn compare_views(&self) -> Result<Vec<ViewDifference>> {
        let source_views = self.source.list_views().await.map_err(as_metadata_error)?;
        let target_views = self.target.list_views().await.map_err(as_metadata_error)?;
        Ok(compare_view_definitions(&source_views, &target_views))
    }
}

/// Diff two view listings by name, comparing normalized bodies
pub fn compare_view_definitions(
    source_views: &[ViewDefinition],
    target_views: &[ViewDefinition],
) -> Vec<ViewDifference> {
    let source_by_name: HashMap<&str, &ViewDefinition> =
        source_views.iter().map(|v| (v.name.as_str(), v)).collect();
    let target_by_name: HashMap<&str, &ViewDefinition> =
        target_views.iter().map(|v| (v.name.as_str(), v)).collect();

    let mut differences = Vec::new();

    for source_view in source_views {
        match target_by_name.get(source_view.name.as_str()) {
            None => differences.push(ViewDifference {
                view_name: source_view.name.clone(),
                operation: ViewOperation::Create,
                old_definition: None,
                new_definition: Some(source_view.definition.clone()),
            }),
            Some(target_view) => {
                if normalize_view_definition(&source_view.definition)
                    != normalize_view_definition(&target_view.definition)
                {
                    differences.push(ViewDifference {
                        view_name: source_view.name.clone(),
                        operation: ViewOperation::Modify,
                        old_definition: Some(target_view.definition.clone()),
                        new_definition: Some(source_view.definition.clone()),
                    });
                }
            }
        }
    }

    for target_view in target_views {
        if !source_by_name.contains_key(target_view.name.as_str()) {
            differences.push(ViewDifference {
                view_name: target_view.name.clone(),
                operation: ViewOperation::Drop,
                old_definition: Some(target_view.definition.clone()),
                new_definition: None,
            });
        }
    }

    differences
}

/// Split two column lists into added, deleted and modified columns
pub fn compare_columns(source_columns: &[Column], target_columns: &[Column]) -> ColumnChanges {
    let source_by_name: HashMap<&str, &Column> =
        source_columns.iter().map(|c| (c.name.as_str(), c)).collect();
    let target_by_name: HashMap<&str, &Column> =
        target_columns.iter().map(|c| (c.name.as_str(), c)).collect();

    let mut changes = ColumnChanges::default();

    for source_col in source_columns {
        match target_by_name.get(source_col.name.as_str()) {
            None => changes.added.push(source_col.clone()),
            Some(target_col) if !columns_equal(source_col, target_col) => {
                changes.modified.push(ColumnModification {
                    column_name: source_col.name.clone(),
                    old_column: (*target_col).clone(),
                    new_column: source_col.clone(),
                });
            }
            Some(_) => {}
        }
    }

    changes.deleted = target_columns
        .iter()
        .filter(|c| !source_by_name.contains_key(c.name.as_str()))
        .map(|c| c.name.clone())
        .collect();

    changes
}

/// Split two index lists into added and deleted indexes, keyed by name only
///
/// An index that keeps its name but changes columns or kind is not reported.
pub fn compare_indexes(source_indexes: &[Index], target_indexes: &[Index]) -> IndexChanges {
    let source_names: HashSet<&str> = source_indexes.iter().map(|i| i.name.as_str()).collect();
    let target_names: HashSet<&str> = target_indexes.iter().map(|i| i.name.as_str()).collect();

    IndexChanges {
        added: source_indexes
            .iter()
            .filter(|i| !target_names.contains(i.name.as_str()))
            .cloned()
            .collect(),
        deleted: target_indexes
            .iter()
            .filter(|i| !source_names.contains(i.name.as_str()))
            .cloned()
            .collect(),
    }
}

/// Column equality used for change detection
///
/// Charset and collation are ignored; changing them is a table-level
/// conversion rather than a column edit.
pub fn columns_equal(left: &Column, right: &Column) -> bool {
    left.name == right.name
        && normalize_type(&left.data_type) == normalize_type(&right.data_type)
        && left.nullable == right.nullable
        && left.default == right.default
        && left.auto_increment == right.auto_increment
        && left.comment == right.comment
}

/// Canonical form of a column type: uppercase, without the first
/// parenthesised length group, single spaced.
///
/// `TINYINT(1) UNSIGNED` becomes `TINYINT UNSIGNED`.
pub fn normalize_type(data_type: &str) -> String {
    let upper = data_type.to_uppercase();

    let stripped = match (upper.find('('), upper.find(')')) {
        (Some(open), Some(close)) if open > 0 && close > open => {
            format!("{} {}", &upper[..open], &upper[close + 1..])
        }
        _ => upper,
    };

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form of a view body: trimmed, whitespace collapsed, lowercase
pub fn normalize_view_definition(definition: &str) -> String {
    WHITESPACE
        .replace_all(definition.trim(), " ")
        .to_lowercase()
}

fn key_set(values: Vec<Value>) -> BTreeMap<String, Value> {
    values
        .into_iter()
        .map(|value| (value.to_string(), value))
        .collect()
}

fn as_metadata_error(error: Error) -> Error {
    match error {
        Error::MetadataQuery(_) => error,
        other => Error::MetadataQuery(other.to_string()),
    }
}
