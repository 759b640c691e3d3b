//! Transaction management module
//!
//! Runs a unit of work inside one physical transaction that nested calls
//! share through the ambient [`Context`].

use crate::context::Context;
use crate::service::db::core::context_tx::{make_context_tx, tx_from_context};
use crate::service::db::core::types::{IsolationLevel, TxOptions};
use crate::service::db::traits::{Transaction, Transactor};
use crate::tool::context_wait::panic_message;
use crate::tool::error::AppError;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Transaction manager for database operations
#[derive(Clone)]
pub struct TransactionManager {
    db: Arc<dyn Transactor>,
}

impl TransactionManager {
    pub fn new(db: Arc<dyn Transactor>) -> Self {
        Self { db }
    }

    /// Execute `handler` in a READ COMMITTED transaction.
    pub async fn read_committed<T, F, Fut>(&self, ctx: &Context, handler: F) -> Result<T, AppError>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.run_in_transaction(ctx, IsolationLevel::ReadCommitted, handler)
            .await
    }

    pub async fn run_in_transaction<T, F, Fut>(
        &self,
        ctx: &Context,
        isolation_level: IsolationLevel,
        handler: F,
    ) -> Result<T, AppError>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.transaction(ctx, TxOptions::with_isolation(isolation_level), handler)
            .await
    }

    async fn transaction<T, F, Fut>(
        &self,
        ctx: &Context,
        opts: TxOptions,
        handler: F,
    ) -> Result<T, AppError>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        // Nested call: ride the outer transaction, the outer call finalizes it.
        if tx_from_context(ctx).is_some() {
            debug!("Joining ambient transaction");
            return handler(ctx.clone()).await.map_err(AppError::from_unit_of_work);
        }

        let tx = self.db.begin_tx(opts).await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            AppError::BeginFailed(Box::new(e))
        })?;

        debug!("Transaction started ({})", opts.isolation_level.as_str());

        let mut guard = FinalizeGuard::new(tx.clone());
        let tx_ctx = make_context_tx(ctx, tx.clone());

        // The recovery boundary covers this invocation's handler only.
        let outcome = AssertUnwindSafe(async move { handler(tx_ctx).await })
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(AppError::UnitOfWorkFailed(err)),
            Err(payload) => {
                let panic = AppError::Panic(panic_message(payload));
                error!("Unit of work aborted: {}", panic);
                Err(AppError::UnitOfWorkFailed(panic.into()))
            }
        };

        // The guard stays armed until finalization completes.
        match result {
            Ok(value) => {
                let committed = tx.commit().await;
                guard.disarm();
                committed.map_err(|e| {
                    error!("Failed to commit transaction: {}", e);
                    AppError::CommitFailed(Box::new(e))
                })?;

                info!("Transaction committed successfully");
                Ok(value)
            }
            Err(err) => {
                let rolled_back = tx.rollback().await;
                guard.disarm();
                if let Err(rollback_err) = rolled_back {
                    error!("Failed to rollback transaction: {}", rollback_err);
                    return Err(AppError::RollbackFailed {
                        cause: Box::new(err),
                        rollback: Box::new(rollback_err),
                    });
                }

                warn!("Transaction rolled back due to error: {}", err);
                Err(err)
            }
        }
    }
}

/// Rolls the transaction back in the background if the owning future is
/// dropped before it reaches finalization.
struct FinalizeGuard {
    tx: Option<Arc<dyn Transaction>>,
}

impl FinalizeGuard {
    fn new(tx: Arc<dyn Transaction>) -> Self {
        Self { tx: Some(tx) }
    }

    fn disarm(&mut self) {
        self.tx = None;
    }
}

impl Drop for FinalizeGuard {
    fn drop(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };

        warn!("Transaction abandoned before finalization, rolling back");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match tx.rollback().await {
                        Ok(()) | Err(AppError::TransactionClosed) => {}
                        Err(e) => error!("Failed to rollback abandoned transaction: {}", e),
                    }
                });
            }
            Err(_) => error!("No runtime available to rollback abandoned transaction"),
        }
    }
}
