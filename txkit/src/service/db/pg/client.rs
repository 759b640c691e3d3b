use crate::config::db::{redact_dsn, DbConfig};
use crate::context::Context;
use crate::service::db::core::executor::QueryExecutor;
use crate::service::db::pg::store::PgStore;
use crate::service::db::traits::Client;
use crate::tool::context_wait::handle_error_with_context;
use crate::tool::error::AppError;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

/// PostgreSQL 클라이언트
pub struct PgClient {
    master: Arc<QueryExecutor>,
}

impl PgClient {
    /// 연결 풀을 생성합니다. 컨텍스트가 먼저 만료되면 취소 에러를 반환합니다.
    pub async fn new(ctx: &Context, config: &DbConfig) -> Result<Self, AppError> {
        let mut options = PgConnectOptions::from_str(&config.dsn).map_err(|e| {
            AppError::Configuration(format!("invalid dsn {}: {}", redact_dsn(&config.dsn), e))
        })?;
        if let Some(timeout) = config.statement_timeout {
            options = options.options([("statement_timeout", timeout.as_millis().to_string())]);
        }

        let pool_options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout);

        info!("데이터베이스 연결 시도: {}", redact_dsn(&config.dsn));

        let pool = handle_error_with_context(ctx, async move {
            pool_options.connect_with(options).await.map_err(|e| {
                error!("데이터베이스 연결 실패: {}", e);
                AppError::DatabaseConnection(format!("failed to connect to postgres: {}", e))
            })
        })
        .await?;

        info!("PostgreSQL 연결 풀 생성 완료");
        Ok(Self::from_store(Arc::new(PgStore::new(pool))))
    }

    pub fn from_store(store: Arc<PgStore>) -> Self {
        Self {
            master: Arc::new(QueryExecutor::new(store)),
        }
    }
}

#[async_trait]
impl Client for PgClient {
    fn db(&self) -> Arc<QueryExecutor> {
        self.master.clone()
    }

    async fn close(&self) -> Result<(), AppError> {
        self.master.close().await;
        Ok(())
    }
}
