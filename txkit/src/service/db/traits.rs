//! 저장소 협력자 트레이트 정의
//!
//! 드라이버 구현체가 제공해야 하는 최소한의 인터페이스입니다.
//! 트랜잭션 관리자와 취소 가능한 실행기는 이 트레이트에만 의존합니다.

use crate::service::db::core::executor::QueryExecutor;
use crate::service::db::core::types::{CommandTag, QueryArg, QueryRow, TxOptions};
use crate::tool::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;

/// 문장 실행과 행 조회
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, sql: &str, args: &[QueryArg]) -> Result<CommandTag, AppError>;

    async fn query(&self, sql: &str, args: &[QueryArg]) -> Result<Vec<QueryRow>, AppError>;

    /// 첫 행의 첫 컬럼. 결과 행이 없으면 `None`
    async fn query_scalar(
        &self,
        sql: &str,
        args: &[QueryArg],
    ) -> Result<Option<serde_json::Value>, AppError>;
}

/// 열린 트랜잭션 핸들
///
/// 트랜잭션 관리자는 `commit`/`rollback`을 최대 한 번 호출합니다.
/// 구현체는 그 이후의 사용에 [`AppError::TransactionClosed`]를 반환해야 합니다.
#[async_trait]
pub trait Transaction: Executor {
    async fn commit(&self) -> Result<(), AppError>;

    async fn rollback(&self) -> Result<(), AppError>;
}

#[async_trait]
pub trait Transactor: Send + Sync {
    async fn begin_tx(&self, opts: TxOptions) -> Result<Arc<dyn Transaction>, AppError>;
}

#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self) -> Result<(), AppError>;
}

/// 기본 연결(풀)을 가진 저장소 핸들
#[async_trait]
pub trait Store: Executor + Transactor + Pinger {
    async fn close(&self);
}

/// 저장소 클라이언트
#[async_trait]
pub trait Client: Send + Sync {
    fn db(&self) -> Arc<QueryExecutor>;

    async fn close(&self) -> Result<(), AppError>;
}
