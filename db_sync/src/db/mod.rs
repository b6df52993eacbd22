//! Database module for db_sync
//!
//! This module handles database connections and statement execution.

pub mod connection;
pub mod executor;

// Re-export key types
pub use connection::DatabaseConnection;
pub use executor::{
    failed_results, ExecutionLog, ExecutionResult, ExecutionSummary, Executor, StatementTarget,
    TracingLog,
};
