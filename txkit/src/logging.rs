//! 로깅 초기화
//!
//! `RUST_LOG`가 설정되어 있으면 그 값을, 아니면 `default_filter`를 사용합니다.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// 전역 fmt 구독자를 설치합니다. 이미 설치되어 있으면 에러를 반환합니다.
pub fn init_logging(default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}
