//! 에러 관리 시스템
//!
//! 트랜잭션 계층과 종료 코디네이터에서 발생하는 모든 에러를 체계적으로 관리합니다.
//! 심각도에 따른 로깅과 gRPC Status 변환을 지원합니다.

use crate::context::CancelReason;
use thiserror::Error;
use tonic::Status;
use tracing::{error, info, warn};

/// 공통 애플리케이션 에러 정의
#[derive(Error, Debug)]
pub enum AppError {
    // 트랜잭션 관련 에러
    #[error("failed to begin tx: {0}")]
    BeginFailed(#[source] Box<AppError>),

    #[error("failed executing code inside transaction: {0}")]
    UnitOfWorkFailed(#[source] anyhow::Error),

    #[error("tx commit failed: {0}")]
    CommitFailed(#[source] Box<AppError>),

    /// 작업 단위 실패 후 롤백까지 실패한 경우
    #[error("{cause}; errRollback: {rollback}")]
    RollbackFailed {
        cause: Box<AppError>,
        #[source]
        rollback: Box<AppError>,
    },

    #[error("transaction already finalized")]
    TransactionClosed,

    #[error("panic recovered: {0}")]
    Panic(String),

    // 컨텍스트 취소
    #[error("{0}")]
    Canceled(CancelReason),

    // 종료 관련 에러
    #[error("close err: {0}")]
    ShutdownCallbackFailed(String),

    #[error("shutdown already started, registration rejected")]
    ShutdownStarted,

    // 데이터베이스 관련 에러
    #[error("database connection failed: {0}")]
    DatabaseConnection(String),

    #[error("database query failed: {0}")]
    DatabaseQuery(String),

    #[error("no rows in result set: {0}")]
    NotFound(String),

    #[error("failed to decode row: {0}")]
    Decode(String),

    // 시스템 에러
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// 작업 단위 에러를 감쌉니다. `anyhow`를 거쳐 온 `AppError`는 그대로 유지합니다.
    pub fn from_unit_of_work(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(other) => AppError::UnitOfWorkFailed(other),
        }
    }

    /// 호출자가 포기한 작업인지 확인합니다. 트랜잭션 에러로 감싸진 경우도 포함합니다.
    pub fn is_canceled(&self) -> bool {
        self.cancel_reason().is_some()
    }

    /// 에러 체인 안의 취소 사유
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            AppError::Canceled(reason) => Some(*reason),
            AppError::BeginFailed(inner) | AppError::CommitFailed(inner) => inner.cancel_reason(),
            AppError::RollbackFailed { cause, .. } => cause.cancel_reason(),
            AppError::UnitOfWorkFailed(inner) => inner
                .downcast_ref::<AppError>()
                .and_then(AppError::cancel_reason),
            _ => None,
        }
    }

    /// 에러의 심각도를 반환합니다.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // Critical: 열린 트랜잭션이 정리되지 못했거나 연결 장애
            AppError::RollbackFailed { .. }
            | AppError::DatabaseConnection(_)
            | AppError::Panic(_) => ErrorSeverity::Critical,

            // High: 트랜잭션 실패
            AppError::BeginFailed(_)
            | AppError::CommitFailed(_)
            | AppError::DatabaseQuery(_)
            | AppError::Decode(_)
            | AppError::ShutdownCallbackFailed(_) => ErrorSeverity::High,

            // Medium: 비즈니스 로직 실패
            AppError::UnitOfWorkFailed(_)
            | AppError::TransactionClosed
            | AppError::Configuration(_)
            | AppError::Internal(_) => ErrorSeverity::Medium,

            // Low: 호출자 취소, 데이터 없음
            AppError::Canceled(_) | AppError::NotFound(_) | AppError::ShutdownStarted => {
                ErrorSeverity::Low
            }
        }
    }

    /// 심각도에 따라 적절한 로깅 레벨로 에러를 기록합니다.
    pub fn log(&self, context: &str) {
        match self.severity() {
            ErrorSeverity::Critical => error!("[CRITICAL] {} - {}", context, self),
            ErrorSeverity::High => error!("[HIGH] {} - {}", context, self),
            ErrorSeverity::Medium => warn!("[MEDIUM] {} - {}", context, self),
            ErrorSeverity::Low => info!("[LOW] {} - {}", context, self),
        }
    }

    /// 에러를 gRPC Status로 변환합니다.
    pub fn to_status(&self) -> Status {
        self.log("gRPC Status 변환");
        Status::new(self.code(), self.to_string())
    }

    pub fn code(&self) -> tonic::Code {
        use tonic::Code;

        match self {
            AppError::Canceled(CancelReason::Canceled) => Code::Cancelled,
            AppError::Canceled(CancelReason::DeadlineExceeded) => Code::DeadlineExceeded,
            AppError::NotFound(_) => Code::NotFound,
            AppError::DatabaseConnection(_) | AppError::ShutdownStarted => Code::Unavailable,
            AppError::BeginFailed(inner) | AppError::CommitFailed(inner) => inner.code(),
            AppError::RollbackFailed { cause, .. } => cause.code(),
            AppError::UnitOfWorkFailed(inner) => inner
                .downcast_ref::<AppError>()
                .map(AppError::code)
                .unwrap_or(Code::Internal),
            AppError::Configuration(_) => Code::FailedPrecondition,
            _ => Code::Internal,
        }
    }
}

/// 에러 심각도 레벨
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Critical, // 리소스 누수 가능성
    High,     // 저장소 작업 실패
    Medium,   // 비즈니스 로직 실패
    Low,      // 일반적인 경고
}

impl From<AppError> for Status {
    fn from(e: AppError) -> Self {
        Status::new(e.code(), e.to_string())
    }
}

impl From<CancelReason> for AppError {
    fn from(reason: CancelReason) -> Self {
        AppError::Canceled(reason)
    }
}

// sqlx 에러 변환
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("database record not found".to_string()),
            sqlx::Error::PoolTimedOut => {
                AppError::DatabaseConnection("database connection pool timeout".to_string())
            }
            sqlx::Error::PoolClosed => {
                AppError::DatabaseConnection("database pool is closed".to_string())
            }
            sqlx::Error::Io(io_err) => AppError::DatabaseConnection(io_err.to_string()),
            sqlx::Error::Configuration(cfg_err) => AppError::Configuration(cfg_err.to_string()),
            sqlx::Error::ColumnDecode { index, source } => {
                AppError::Decode(format!("column {index}: {source}"))
            }
            _ => AppError::DatabaseQuery(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_failure_renders_both_causes() {
        let err = AppError::RollbackFailed {
            cause: Box::new(AppError::UnitOfWorkFailed(anyhow::anyhow!("insert failed"))),
            rollback: Box::new(AppError::DatabaseConnection("conn reset".to_string())),
        };

        let msg = err.to_string();
        assert!(msg.contains("insert failed"));
        assert!(msg.contains("conn reset"));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_from_unit_of_work_keeps_app_error() {
        let err = AppError::from_unit_of_work(AppError::NotFound("user".to_string()).into());
        assert!(matches!(err, AppError::NotFound(_)));

        let err = AppError::from_unit_of_work(anyhow::anyhow!("boom"));
        assert!(matches!(err, AppError::UnitOfWorkFailed(_)));
    }

    #[test]
    fn test_cancel_seen_through_transaction_wrappers() {
        let deadline = || AppError::Canceled(CancelReason::DeadlineExceeded);

        let wrapped = AppError::UnitOfWorkFailed(deadline().into());
        assert!(wrapped.is_canceled());
        assert_eq!(wrapped.cancel_reason(), Some(CancelReason::DeadlineExceeded));

        let rollback = AppError::RollbackFailed {
            cause: Box::new(AppError::UnitOfWorkFailed(deadline().into())),
            rollback: Box::new(AppError::DatabaseConnection("conn reset".to_string())),
        };
        assert!(rollback.is_canceled());
        assert_eq!(rollback.code(), tonic::Code::DeadlineExceeded);

        assert!(AppError::CommitFailed(Box::new(deadline())).is_canceled());
        assert!(!AppError::UnitOfWorkFailed(anyhow::anyhow!("boom")).is_canceled());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Canceled(CancelReason::DeadlineExceeded).code(),
            tonic::Code::DeadlineExceeded
        );
        assert_eq!(
            AppError::Canceled(CancelReason::Canceled).code(),
            tonic::Code::Cancelled
        );
        let wrapped = AppError::UnitOfWorkFailed(AppError::NotFound("x".to_string()).into());
        assert_eq!(wrapped.code(), tonic::Code::NotFound);
        assert_eq!(Status::from(AppError::ShutdownStarted).code(), tonic::Code::Unavailable);
    }
}
