//! 쿼리 실행 모듈
//!
//! 모든 저장소 호출을 컨텍스트 취소와 경쟁시키고,
//! 컨텍스트에 트랜잭션이 있으면 그 트랜잭션 안에서 실행합니다.

use crate::context::Context;
use crate::service::db::core::context_tx::tx_from_context;
use crate::service::db::core::prettier::pretty;
use crate::service::db::core::types::{
    CommandTag, PlaceholderFormat, Query, QueryArg, QueryRow, TxOptions,
};
use crate::service::db::traits::{Store, Transaction, Transactor};
use crate::tool::context_wait::handle_error_with_context;
use crate::tool::error::AppError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// 실행 대상: 컨텍스트의 트랜잭션 또는 기본 연결 풀
enum Target {
    Tx(Arc<dyn Transaction>),
    Store(Arc<dyn Store>),
}

impl Target {
    async fn execute(&self, sql: &str, args: &[QueryArg]) -> Result<CommandTag, AppError> {
        match self {
            Target::Tx(tx) => tx.execute(sql, args).await,
            Target::Store(store) => store.execute(sql, args).await,
        }
    }

    async fn query(&self, sql: &str, args: &[QueryArg]) -> Result<Vec<QueryRow>, AppError> {
        match self {
            Target::Tx(tx) => tx.query(sql, args).await,
            Target::Store(store) => store.query(sql, args).await,
        }
    }

    async fn query_scalar(
        &self,
        sql: &str,
        args: &[QueryArg],
    ) -> Result<Option<serde_json::Value>, AppError> {
        match self {
            Target::Tx(tx) => tx.query_scalar(sql, args).await,
            Target::Store(store) => store.query_scalar(sql, args).await,
        }
    }
}

/// 취소 가능한 쿼리 실행기
#[derive(Clone)]
pub struct QueryExecutor {
    /// 기본 저장소 핸들
    store: Arc<dyn Store>,

    /// 로그 렌더링용 플레이스홀더 형식
    placeholder: PlaceholderFormat,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            placeholder: PlaceholderFormat::Dollar,
        }
    }

    pub fn with_placeholder(mut self, placeholder: PlaceholderFormat) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// INSERT/UPDATE/DELETE 실행
    pub async fn exec_context(
        &self,
        ctx: &Context,
        q: &Query,
        args: &[QueryArg],
    ) -> Result<CommandTag, AppError> {
        self.log_query(q, args);

        let target = self.target(ctx);
        let (sql, args) = (q.sql.clone(), args.to_vec());
        handle_error_with_context(ctx, async move { target.execute(&sql, &args).await }).await
    }

    /// 모든 행 조회
    pub async fn query_context(
        &self,
        ctx: &Context,
        q: &Query,
        args: &[QueryArg],
    ) -> Result<Vec<QueryRow>, AppError> {
        self.log_query(q, args);
        self.dispatch_query(ctx, q, args).await
    }

    /// 첫 행의 첫 컬럼을 `T`로 디코딩
    pub async fn query_row_context_scan<T>(
        &self,
        ctx: &Context,
        q: &Query,
        args: &[QueryArg],
    ) -> Result<T, AppError>
    where
        T: DeserializeOwned,
    {
        self.log_query(q, args);

        let target = self.target(ctx);
        let (sql, args) = (q.sql.clone(), args.to_vec());
        let value =
            handle_error_with_context(ctx, async move { target.query_scalar(&sql, &args).await })
                .await?
                .ok_or_else(|| AppError::NotFound(q.name.clone()))?;

        serde_json::from_value(value).map_err(|e| AppError::Decode(format!("{}: {}", q.name, e)))
    }

    /// 정확히 한 행을 `T`로 디코딩
    pub async fn scan_one_context<T>(
        &self,
        ctx: &Context,
        q: &Query,
        args: &[QueryArg],
    ) -> Result<T, AppError>
    where
        T: DeserializeOwned,
    {
        self.log_query(q, args);

        let mut rows = self.dispatch_query(ctx, q, args).await?;
        match rows.len() {
            0 => Err(AppError::NotFound(q.name.clone())),
            1 => decode_row(q, rows.remove(0)),
            n => Err(AppError::DatabaseQuery(format!(
                "{}: expected 1 row, got: {}",
                q.name, n
            ))),
        }
    }

    /// 모든 행을 `T`로 디코딩
    pub async fn scan_all_context<T>(
        &self,
        ctx: &Context,
        q: &Query,
        args: &[QueryArg],
    ) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned,
    {
        self.log_query(q, args);

        self.dispatch_query(ctx, q, args)
            .await?
            .into_iter()
            .map(|row| decode_row(q, row))
            .collect()
    }

    /// 기본 연결 상태 확인
    pub async fn ping(&self, ctx: &Context) -> Result<(), AppError> {
        let store = self.store.clone();
        handle_error_with_context(ctx, async move { store.ping().await }).await
    }

    pub async fn close(&self) {
        self.store.close().await;
    }

    async fn dispatch_query(
        &self,
        ctx: &Context,
        q: &Query,
        args: &[QueryArg],
    ) -> Result<Vec<QueryRow>, AppError> {
        let target = self.target(ctx);
        let (sql, args) = (q.sql.clone(), args.to_vec());
        handle_error_with_context(ctx, async move { target.query(&sql, &args).await }).await
    }

    fn target(&self, ctx: &Context) -> Target {
        match tx_from_context(ctx) {
            Some(tx) => Target::Tx(tx),
            None => Target::Store(self.store.clone()),
        }
    }

    fn log_query(&self, q: &Query, args: &[QueryArg]) {
        debug!(
            "sql: {} | query: {}",
            q.name,
            pretty(&q.sql, self.placeholder, args)
        );
    }
}

#[async_trait]
impl Transactor for QueryExecutor {
    async fn begin_tx(&self, opts: TxOptions) -> Result<Arc<dyn Transaction>, AppError> {
        self.store.begin_tx(opts).await
    }
}

fn decode_row<T: DeserializeOwned>(q: &Query, row: QueryRow) -> Result<T, AppError> {
    let object = row.into_iter().collect::<serde_json::Map<_, _>>();
    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| AppError::Decode(format!("{}: {}", q.name, e)))
}
