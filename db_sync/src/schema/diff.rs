//! Difference model
//!
//! Plain data produced by the comparator and consumed by the statement
//! generator and the verifier.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::schema::types::{Column, Index, Row, TableDefinition, Value};

/// Everything that separates the target from the source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Difference {
    pub structure_differences: Vec<StructureDifference>,
    /// Keyed by table name
    pub data_differences: BTreeMap<String, DataDifference>,
    pub view_differences: Vec<ViewDifference>,
}

impl Difference {
    /// Check if the diff is empty (no changes needed)
    pub fn is_empty(&self) -> bool {
        self.structure_differences.is_empty()
            && self.data_differences.is_empty()
            && self.view_differences.is_empty()
    }

    /// Total number of rows to insert, update or delete across all tables
    pub fn row_change_count(&self) -> usize {
        self.data_differences
            .values()
            .map(DataDifference::change_count)
            .sum()
    }
}

/// Schema changes needed to align one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureDifference {
    pub table_name: String,
    /// The table does not exist in the target at all
    pub is_new_table: bool,
    /// Full source definition, present for new tables
    pub table_definition: Option<TableDefinition>,
    pub columns_added: Vec<Column>,
    pub columns_deleted: Vec<String>,
    pub columns_modified: Vec<ColumnModification>,
    pub indexes_added: Vec<Index>,
    pub indexes_deleted: Vec<Index>,
}

impl StructureDifference {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            is_new_table: false,
            table_definition: None,
            columns_added: Vec::new(),
            columns_deleted: Vec::new(),
            columns_modified: Vec::new(),
            indexes_added: Vec::new(),
            indexes_deleted: Vec::new(),
        }
    }

    /// Difference for a table missing from the target
    pub fn new_table(definition: TableDefinition) -> Self {
        Self {
            table_name: definition.name.clone(),
            is_new_table: true,
            columns_added: definition.columns.clone(),
            indexes_added: definition.indexes.clone(),
            table_definition: Some(definition),
            columns_deleted: Vec::new(),
            columns_modified: Vec::new(),
            indexes_deleted: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.is_new_table
            && self.columns_added.is_empty()
            && self.columns_deleted.is_empty()
            && self.columns_modified.is_empty()
            && self.indexes_added.is_empty()
            && self.indexes_deleted.is_empty()
    }
}

/// A column present on both sides with a different definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnModification {
    pub column_name: String,
    /// Target snapshot
    pub old_column: Column,
    /// Source snapshot, used to build the replacement definition
    pub new_column: Column,
}

/// Row changes needed to align one table, keyed by primary key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataDifference {
    pub table_name: String,
    pub primary_key: String,
    pub rows_to_insert: Vec<Row>,
    pub rows_to_update: Vec<UpdateRow>,
    pub rows_to_delete: Vec<Row>,
}

impl DataDifference {
    pub fn new(table_name: &str, primary_key: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            primary_key: primary_key.to_string(),
            rows_to_insert: Vec::new(),
            rows_to_update: Vec::new(),
            rows_to_delete: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }

    pub fn change_count(&self) -> usize {
        self.rows_to_insert.len() + self.rows_to_update.len() + self.rows_to_delete.len()
    }
}

/// A row whose primary key exists on both sides with different contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRow {
    pub primary_key_value: Value,
    pub old_values: Row,
    pub new_values: Row,
}

/// What has to happen to a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ViewOperation {
    Create,
    Drop,
    Modify,
}

impl ViewOperation {
    /// The old view has to go before tables are altered
    pub fn drops_existing(self) -> bool {
        matches!(self, ViewOperation::Drop | ViewOperation::Modify)
    }

    /// The source view has to be (re)created after tables are altered
    pub fn creates_new(self) -> bool {
        matches!(self, ViewOperation::Create | ViewOperation::Modify)
    }
}

impl fmt::Display for ViewOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewOperation::Create => write!(f, "CREATE"),
            ViewOperation::Drop => write!(f, "DROP"),
            ViewOperation::Modify => write!(f, "MODIFY"),
        }
    }
}

/// A view that has to be created, dropped or replaced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDifference {
    pub view_name: String,
    pub operation: ViewOperation,
    pub old_definition: Option<String>,
    pub new_definition: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{row, IndexKind};

    #[test]
    fn empty_difference() {
        let diff = Difference::default();
        assert!(diff.is_empty());
        assert_eq!(diff.row_change_count(), 0);
    }

    #[test]
    fn any_collection_makes_the_difference_non_empty() {
        let mut diff = Difference::default();
        diff.view_differences.push(ViewDifference {
            view_name: "v".to_string(),
            operation: ViewOperation::Drop,
            old_definition: Some("select 1".to_string()),
            new_definition: None,
        });
        assert!(!diff.is_empty());

        let mut diff = Difference::default();
        let mut data = DataDifference::new("t", "id");
        data.rows_to_delete.push(row([("id", 1)]));
        diff.data_differences.insert("t".to_string(), data);
        assert!(!diff.is_empty());
        assert_eq!(diff.row_change_count(), 1);
    }

    #[test]
    fn new_table_carries_full_definition() {
        let mut table = TableDefinition::new("orders");
        table.add_column(Column::new("id", "int").nullable(false));
        table.add_index(Index::new("PRIMARY", IndexKind::Primary, &["id"]));

        let diff = StructureDifference::new_table(table.clone());

        assert!(diff.is_new_table);
        assert!(!diff.is_empty());
        assert_eq!(diff.columns_added, table.columns);
        assert_eq!(diff.indexes_added, table.indexes);
        assert_eq!(diff.table_definition, Some(table));
        assert!(StructureDifference::new("orders").is_empty());
    }

    #[test]
    fn view_operation_phases() {
        assert!(ViewOperation::Modify.drops_existing());
        assert!(ViewOperation::Modify.creates_new());
        assert!(!ViewOperation::Create.drops_existing());
        assert!(!ViewOperation::Drop.creates_new());
        assert_eq!(ViewOperation::Drop.to_string(), "DROP");
    }
}
