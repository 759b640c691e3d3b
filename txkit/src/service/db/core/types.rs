//! Common type definitions for database service
//!
//! Shared types used across database service modules

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Query result row type - column name to value
pub type QueryRow = HashMap<String, serde_json::Value>;

/// Positional query argument
pub type QueryArg = serde_json::Value;

/// Statement descriptor: a name for log correlation plus the raw SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub name: String,
    pub sql: String,
}

impl Query {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Outcome of a statement that returns no rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTag {
    pub rows_affected: u64,
}

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
}

impl IsolationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
        }
    }
}

/// Options passed to the store when a transaction begins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub isolation_level: IsolationLevel,
}

impl TxOptions {
    pub fn with_isolation(isolation_level: IsolationLevel) -> Self {
        Self { isolation_level }
    }
}

/// Placeholder syntax used when rendering statements for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaceholderFormat {
    /// `$1, $2, ...`
    #[default]
    Dollar,
    /// `?, ?, ...`
    Question,
}
