//! 데이터베이스 헬스체크 데몬
//!
//! 설정을 읽어 연결 풀을 만들고, 종료 시그널을 받으면 등록된 정리 작업을 실행합니다.

use anyhow::{Context as _, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use txkit::closer::{self, ShutdownSignal};
use txkit::logging::init_logging;
use txkit::{Client, Context, DbConfig, PgClient};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("info")?;

    let config = DbConfig::from_env().context("데이터베이스 설정 로드 실패")?;
    let (connect_ctx, _cancel) = Context::background().with_timeout(config.connect_timeout);
    let client = Arc::new(PgClient::new(&connect_ctx, &config).await?);

    closer::listen_global(&[ShutdownSignal::Interrupt, ShutdownSignal::Terminate])?;
    {
        let client = client.clone();
        closer::add(move || async move {
            client.close().await?;
            Ok(())
        })?;
    }

    info!("✅ 데이터베이스 연결 완료, 종료 시그널 대기 중");

    let db = client.db();
    let heartbeat = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            let (ctx, _cancel) = Context::background().with_timeout(Duration::from_secs(5));
            if let Err(e) = db.ping(&ctx).await {
                error!("헬스체크 실패: {}", e);
            }
        }
    });

    closer::wait().await;
    heartbeat.abort();

    info!("🛑 종료 완료");
    Ok(())
}
