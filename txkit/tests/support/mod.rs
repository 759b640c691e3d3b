//! In-memory store used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use txkit::service::db::{Executor, Pinger, Store, Transaction, Transactor};
use txkit::{AppError, CommandTag, QueryArg, QueryRow, TxOptions};

pub type EventLog = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
pub struct FakeStore {
    pub events: EventLog,
    pub begins: AtomicUsize,
    pub txs: Mutex<Vec<Arc<FakeTx>>>,
    pub rows: Mutex<Vec<QueryRow>>,
    pub fail_begin: AtomicBool,
    pub fail_commit: AtomicBool,
    pub fail_rollback: AtomicBool,
    pub slow_commit: AtomicBool,
    pub hang: Arc<AtomicBool>,
    pub closed: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| e.as_str() == event).count()
    }

    pub fn set_rows(&self, rows: Vec<QueryRow>) {
        *self.rows.lock() = rows;
    }

    pub fn last_tx(&self) -> Option<Arc<FakeTx>> {
        self.txs.lock().last().cloned()
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    async fn maybe_hang(&self) {
        if self.hang.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
    }
}

/// Identity check between a handle seen through the context and a fake tx.
pub fn is_same_tx(handle: &Arc<dyn Transaction>, tx: &Arc<FakeTx>) -> bool {
    Arc::as_ptr(handle) as *const u8 == Arc::as_ptr(tx) as *const u8
}

#[async_trait]
impl Executor for FakeStore {
    async fn execute(&self, sql: &str, _args: &[QueryArg]) -> Result<CommandTag, AppError> {
        self.maybe_hang().await;
        self.record(format!("exec@store:{}", sql));
        Ok(CommandTag { rows_affected: 1 })
    }

    async fn query(&self, sql: &str, _args: &[QueryArg]) -> Result<Vec<QueryRow>, AppError> {
        self.maybe_hang().await;
        self.record(format!("query@store:{}", sql));
        Ok(self.rows.lock().clone())
    }

    async fn query_scalar(
        &self,
        sql: &str,
        _args: &[QueryArg],
    ) -> Result<Option<serde_json::Value>, AppError> {
        self.maybe_hang().await;
        self.record(format!("scalar@store:{}", sql));
        Ok(self
            .rows
            .lock()
            .first()
            .and_then(|row| row.get("value").cloned()))
    }
}

#[async_trait]
impl Transactor for FakeStore {
    async fn begin_tx(&self, opts: TxOptions) -> Result<Arc<dyn Transaction>, AppError> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        if self.fail_begin.load(Ordering::SeqCst) {
            self.record("begin:failed");
            return Err(AppError::DatabaseConnection("pool exhausted".to_string()));
        }

        let id = self.txs.lock().len() + 1;
        self.record(format!("begin:{}:{}", id, opts.isolation_level.as_str()));

        let tx = Arc::new(FakeTx {
            id,
            events: self.events.clone(),
            finalized: AtomicUsize::new(0),
            fail_commit: self.fail_commit.load(Ordering::SeqCst),
            fail_rollback: self.fail_rollback.load(Ordering::SeqCst),
            slow_commit: self.slow_commit.load(Ordering::SeqCst),
            hang: self.hang.clone(),
        });
        self.txs.lock().push(tx.clone());
        Ok(tx)
    }
}

#[async_trait]
impl Pinger for FakeStore {
    async fn ping(&self) -> Result<(), AppError> {
        self.maybe_hang().await;
        self.record("ping");
        Ok(())
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.record("close");
    }
}

pub struct FakeTx {
    pub id: usize,
    events: EventLog,
    pub finalized: AtomicUsize,
    fail_commit: bool,
    fail_rollback: bool,
    slow_commit: bool,
    hang: Arc<AtomicBool>,
}

impl FakeTx {
    fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }
}

#[async_trait]
impl Executor for FakeTx {
    async fn execute(&self, sql: &str, _args: &[QueryArg]) -> Result<CommandTag, AppError> {
        if self.hang.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        self.record(format!("exec@tx{}:{}", self.id, sql));
        Ok(CommandTag { rows_affected: 1 })
    }

    async fn query(&self, sql: &str, _args: &[QueryArg]) -> Result<Vec<QueryRow>, AppError> {
        self.record(format!("query@tx{}:{}", self.id, sql));
        Ok(Vec::new())
    }

    async fn query_scalar(
        &self,
        sql: &str,
        _args: &[QueryArg],
    ) -> Result<Option<serde_json::Value>, AppError> {
        self.record(format!("scalar@tx{}:{}", self.id, sql));
        Ok(Some(serde_json::json!(self.id)))
    }
}

#[async_trait]
impl Transaction for FakeTx {
    async fn commit(&self) -> Result<(), AppError> {
        if self.slow_commit {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
        self.finalized.fetch_add(1, Ordering::SeqCst);
        self.record(format!("commit:{}", self.id));
        if self.fail_commit {
            return Err(AppError::DatabaseQuery("serialization failure".to_string()));
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), AppError> {
        self.finalized.fetch_add(1, Ordering::SeqCst);
        self.record(format!("rollback:{}", self.id));
        if self.fail_rollback {
            return Err(AppError::DatabaseConnection("connection reset".to_string()));
        }
        Ok(())
    }
}
