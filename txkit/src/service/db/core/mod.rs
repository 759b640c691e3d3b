//! Core database service modules
//!
//! Modular components for transactional store access with clear separation of concerns

pub mod context_tx;
pub mod executor;
pub mod prettier;
pub mod transaction;
pub mod types;

pub use context_tx::{make_context_tx, tx_from_context};
pub use executor::QueryExecutor;
pub use prettier::pretty;
pub use transaction::TransactionManager;
pub use types::*;
