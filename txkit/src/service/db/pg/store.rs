//! sqlx 기반 PostgreSQL 저장소 구현
//!
//! 인자는 JSON 종류에 따라 바인딩됩니다. 숫자는 `int8`/`float8`, 불리언은 `bool`,
//! 문자열은 `text`, 배열과 객체는 `jsonb`로 전달되고, `null`은 타입 없이 보내져
//! 서버가 문맥에서 타입을 추론합니다.
//! 문자열을 `uuid`, `timestamptz` 같은 비텍스트 컬럼과 비교하거나 넣을 때는
//! `$1::uuid`처럼 명시적 캐스트가 필요합니다.

use crate::service::db::core::types::{CommandTag, QueryArg, QueryRow, TxOptions};
use crate::service::db::traits::{Executor, Pinger, Store, Transaction, Transactor};
use crate::tool::error::AppError;
use async_trait::async_trait;
use sqlx::encode::IsNull;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgPool, PgRow, PgTypeInfo};
use sqlx::query::Query as SqlxQuery;
use sqlx::{Column, Postgres, Row, TypeInfo};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// 연결 풀 위에서 동작하는 저장소 핸들
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Executor for PgStore {
    async fn execute(&self, sql: &str, args: &[QueryArg]) -> Result<CommandTag, AppError> {
        let result = bind_args(sqlx::query(sql), args)
            .execute(&self.pool)
            .await?;
        Ok(CommandTag {
            rows_affected: result.rows_affected(),
        })
    }

    async fn query(&self, sql: &str, args: &[QueryArg]) -> Result<Vec<QueryRow>, AppError> {
        let rows = bind_args(sqlx::query(sql), args)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_map).collect()
    }

    async fn query_scalar(
        &self,
        sql: &str,
        args: &[QueryArg],
    ) -> Result<Option<serde_json::Value>, AppError> {
        let row = bind_args(sqlx::query(sql), args)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(first_column).transpose()
    }
}

#[async_trait]
impl Transactor for PgStore {
    async fn begin_tx(&self, opts: TxOptions) -> Result<Arc<dyn Transaction>, AppError> {
        let mut tx = self.pool.begin().await?;

        let isolation_sql = format!(
            "SET TRANSACTION ISOLATION LEVEL {}",
            opts.isolation_level.as_str()
        );
        sqlx::query(&isolation_sql).execute(&mut *tx).await?;

        debug!("Transaction isolation level set to {:?}", opts.isolation_level);
        Ok(Arc::new(PgTransaction {
            inner: Mutex::new(Some(tx)),
        }))
    }
}

#[async_trait]
impl Pinger for PgStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn close(&self) {
        info!("데이터베이스 연결 풀을 닫는 중...");
        self.pool.close().await;
        info!("데이터베이스 연결 풀 종료 완료");
    }
}

/// 열린 PostgreSQL 트랜잭션
///
/// 한 트랜잭션의 문장은 순서대로 실행됩니다. commit/rollback 이후의 호출은
/// [`AppError::TransactionClosed`]를 반환합니다.
pub struct PgTransaction {
    inner: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
}

#[async_trait]
impl Executor for PgTransaction {
    async fn execute(&self, sql: &str, args: &[QueryArg]) -> Result<CommandTag, AppError> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or(AppError::TransactionClosed)?;

        let result = bind_args(sqlx::query(sql), args)
            .execute(&mut **tx)
            .await?;
        Ok(CommandTag {
            rows_affected: result.rows_affected(),
        })
    }

    async fn query(&self, sql: &str, args: &[QueryArg]) -> Result<Vec<QueryRow>, AppError> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or(AppError::TransactionClosed)?;

        let rows = bind_args(sqlx::query(sql), args)
            .fetch_all(&mut **tx)
            .await?;
        rows.iter().map(row_to_map).collect()
    }

    async fn query_scalar(
        &self,
        sql: &str,
        args: &[QueryArg],
    ) -> Result<Option<serde_json::Value>, AppError> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or(AppError::TransactionClosed)?;

        let row = bind_args(sqlx::query(sql), args)
            .fetch_optional(&mut **tx)
            .await?;
        row.as_ref().map(first_column).transpose()
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(&self) -> Result<(), AppError> {
        let tx = self
            .inner
            .lock()
            .await
            .take()
            .ok_or(AppError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), AppError> {
        let tx = self
            .inner
            .lock()
            .await
            .take()
            .ok_or(AppError::TransactionClosed)?;
        tx.rollback().await?;
        Ok(())
    }
}

/// JSON 인자를 종류에 맞게 바인딩
fn bind_args<'q>(
    mut query: SqlxQuery<'q, Postgres, PgArguments>,
    args: &'q [QueryArg],
) -> SqlxQuery<'q, Postgres, PgArguments> {
    for arg in args {
        query = match arg {
            serde_json::Value::Null => query.bind(UntypedNull),
            serde_json::Value::Bool(b) => query.bind(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else {
                    query.bind(n.as_f64())
                }
            }
            serde_json::Value::String(s) => query.bind(s.as_str()),
            other => query.bind(sqlx::types::Json(other.clone())),
        };
    }
    query
}

/// OID 0(unspecified)으로 보내는 NULL 파라미터
///
/// 값이 없으므로 바이너리 형식과 상관없이 안전하고, 서버가 컬럼 타입을 추론합니다.
struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl<'q> sqlx::Encode<'q, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> IsNull {
        IsNull::Yes
    }
}

fn row_to_map(row: &PgRow) -> Result<QueryRow, AppError> {
    let mut result = HashMap::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        result.insert(column.name().to_string(), decode_column(row, idx)?);
    }
    Ok(result)
}

fn first_column(row: &PgRow) -> Result<serde_json::Value, AppError> {
    if row.columns().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    decode_column(row, 0)
}

/// 컬럼 타입 이름에 따라 JSON 값으로 디코딩
fn decode_column(row: &PgRow, idx: usize) -> Result<serde_json::Value, AppError> {
    use serde_json::Value;

    let type_name = row.columns()[idx].type_info().name().to_string();
    let value = match type_name.as_str() {
        "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(Value::Bool),
        "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(Value::from),
        "FLOAT4" => row.try_get::<Option<f32>, _>(idx)?.map(Value::from),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(Value::from),
        // 정밀도를 잃지 않도록 문자열로 전달
        "NUMERIC" => row
            .try_get::<Option<sqlx::types::BigDecimal>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx)?,
        "UUID" => row
            .try_get::<Option<sqlx::types::Uuid>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)?
            .map(|v| Value::String(v.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(idx)?
            .map(|v| Value::String(hex::encode(v))),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
            row.try_get::<Option<String>, _>(idx)?.map(Value::String)
        }
        other => {
            return Err(AppError::Decode(format!(
                "unsupported column type {} at index {}",
                other, idx
            )))
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Encode;

    #[test]
    fn test_null_argument_is_sent_without_value() {
        let mut buf = PgArgumentBuffer::default();
        assert!(matches!(UntypedNull.encode_by_ref(&mut buf), IsNull::Yes));
        assert!(buf.is_empty());
    }
}
