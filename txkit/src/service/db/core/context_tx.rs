//! Ambient transaction wiring
//!
//! Attaches an open transaction to a [`Context`] so nested store calls pick it
//! up without the handle being passed around.

use crate::context::Context;
use crate::service::db::traits::Transaction;
use std::sync::Arc;

/// Context slot holding the ambient transaction.
struct TxSlot(Arc<dyn Transaction>);

/// Derives a context that carries `tx`. `ctx` itself is left untouched.
pub fn make_context_tx(ctx: &Context, tx: Arc<dyn Transaction>) -> Context {
    ctx.with_value(TxSlot(tx))
}

/// Nearest transaction attached to `ctx`'s lineage.
pub fn tx_from_context(ctx: &Context) -> Option<Arc<dyn Transaction>> {
    ctx.value::<TxSlot>().map(|slot| slot.0.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::db::core::types::{CommandTag, QueryArg, QueryRow};
    use crate::service::db::traits::Executor;
    use crate::tool::error::AppError;
    use async_trait::async_trait;

    struct NoopTx;

    #[async_trait]
    impl Executor for NoopTx {
        async fn execute(&self, _sql: &str, _args: &[QueryArg]) -> Result<CommandTag, AppError> {
            Ok(CommandTag::default())
        }

        async fn query(&self, _sql: &str, _args: &[QueryArg]) -> Result<Vec<QueryRow>, AppError> {
            Ok(Vec::new())
        }

        async fn query_scalar(
            &self,
            _sql: &str,
            _args: &[QueryArg],
        ) -> Result<Option<serde_json::Value>, AppError> {
            Ok(None)
        }
    }

    #[async_trait]
    impl Transaction for NoopTx {
        async fn commit(&self) -> Result<(), AppError> {
            Ok(())
        }

        async fn rollback(&self) -> Result<(), AppError> {
            Ok(())
        }
    }

    #[test]
    fn test_attach_does_not_touch_parent() {
        let parent = Context::background();
        let tx: Arc<dyn Transaction> = Arc::new(NoopTx);

        let child = make_context_tx(&parent, tx.clone());
        let grandchild = child.with_value(5u32);

        assert!(tx_from_context(&parent).is_none());
        assert!(Arc::ptr_eq(&tx_from_context(&child).unwrap(), &tx));
        assert!(Arc::ptr_eq(&tx_from_context(&grandchild).unwrap(), &tx));
    }
}
