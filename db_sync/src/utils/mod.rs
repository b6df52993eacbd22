//! Utilities for db_sync
//!
//! This module provides logging setup and SQL quoting helpers.

pub mod logging;
pub mod sql;

pub use sql::{default_literal, ident_list, literal, quote_ident, quote_str};
