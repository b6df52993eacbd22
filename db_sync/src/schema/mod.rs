//! Schema module for db_sync
//!
//! This module reads database metadata, compares two databases and turns the
//! difference into statements.

pub mod analyzer;
pub mod comparator;
pub mod diff;
pub mod generator;
pub mod types;
pub mod verifier;

// Re-export key types
pub use analyzer::{MetadataProvider, SchemaAnalyzer};
pub use comparator::{normalize_type, normalize_view_definition, Comparator};
pub use diff::{
    ColumnModification, DataDifference, Difference, StructureDifference, UpdateRow,
    ViewDifference, ViewOperation,
};
pub use generator::StatementGenerator;
pub use types::{Column, Index, IndexKind, Row, TableDefinition, Value, ViewDefinition};
pub use verifier::{Verification, Verifier};
