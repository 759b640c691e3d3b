//! PostgreSQL 저장소 (sqlx)

pub mod client;
pub mod store;

pub use client::PgClient;
pub use store::{PgStore, PgTransaction};
