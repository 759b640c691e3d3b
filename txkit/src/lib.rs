//! Transactional store access with an ambient transaction, plus a
//! cooperative shutdown coordinator.
//!
//! ```no_run
//! use txkit::{Client, Context, DbConfig, PgClient, Query, TransactionManager};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), txkit::AppError> {
//! let ctx = Context::background();
//! let client = PgClient::new(&ctx, &DbConfig::from_env()?).await?;
//! let db = client.db();
//! let txm = TransactionManager::new(db.clone());
//!
//! txm.read_committed(&ctx, |ctx| async move {
//!     let q = Query::new("chat.create", "INSERT INTO chat (title) VALUES ($1)");
//!     db.exec_context(&ctx, &q, &[json!("general")]).await?;
//!     Ok(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod closer;
pub mod config;
pub mod context;
pub mod logging;
pub mod service;
pub mod sys;
pub mod tool;

pub use closer::{Closer, ShutdownReport, ShutdownSignal};
pub use config::DbConfig;
pub use context::{CancelReason, Context};
pub use service::db::{
    Client, CommandTag, IsolationLevel, PgClient, Query, QueryArg, QueryExecutor, QueryRow,
    Store, Transaction, TransactionManager, TxOptions,
};
pub use tool::error::AppError;
