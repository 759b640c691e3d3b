pub mod db;

pub use db::DbConfig;
