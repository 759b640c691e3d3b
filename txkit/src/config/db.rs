//! PostgreSQL 데이터베이스 설정
//!
//! .env 파일과 환경 변수에서 데이터베이스 연결 정보를 읽어옵니다.
//! 값이 없으면 기본값을 사용하고, 숫자 형식이 잘못되면 에러를 반환합니다.

use crate::tool::error::AppError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// PostgreSQL 데이터베이스 설정 구조체
#[derive(Clone)]
pub struct DbConfig {
    pub dsn: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    /// 서버 측 statement timeout (취소로 버려진 작업의 수명을 제한)
    pub statement_timeout: Option<Duration>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            dsn: "postgres://postgres@localhost:5432/postgres".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout: Duration::from_secs(5),
            statement_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("dsn", &redact_dsn(&self.dsn))
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout", &self.connect_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

impl DbConfig {
    /// .env 파일을 로드한 뒤 환경 변수에서 설정을 읽습니다.
    pub fn from_env() -> Result<Self, AppError> {
        load_dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 임의의 키-값 조회 함수로부터 설정을 만듭니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let dsn = match lookup("db_dsn") {
            Some(dsn) => dsn,
            None => {
                let host = lookup("db_host").unwrap_or_else(|| {
                    warn!("db_host 환경변수가 없어서 localhost를 사용합니다.");
                    "localhost".to_string()
                });
                let port: u16 = parse_or("db_port", lookup("db_port"), 5432)?;
                let user = lookup("db_id").unwrap_or_else(|| {
                    warn!("db_id 환경변수가 없어서 postgres를 사용합니다.");
                    "postgres".to_string()
                });
                let password = lookup("db_password").unwrap_or_default();
                let database = lookup("db_name").unwrap_or_else(|| {
                    warn!("db_name 환경변수가 없어서 postgres를 사용합니다.");
                    "postgres".to_string()
                });

                if password.is_empty() {
                    format!("postgres://{}@{}:{}/{}", user, host, port, database)
                } else {
                    format!(
                        "postgres://{}:{}@{}:{}/{}",
                        user, password, host, port, database
                    )
                }
            }
        };

        let max_connections = parse_or(
            "db_max_connections",
            lookup("db_max_connections"),
            defaults.max_connections,
        )?;
        let min_connections = parse_or(
            "db_min_connections",
            lookup("db_min_connections"),
            defaults.min_connections,
        )?;
        if min_connections > max_connections {
            return Err(AppError::Configuration(format!(
                "db_min_connections ({}) exceeds db_max_connections ({})",
                min_connections, max_connections
            )));
        }

        let connect_timeout = Duration::from_millis(parse_or(
            "db_connect_timeout_ms",
            lookup("db_connect_timeout_ms"),
            defaults.connect_timeout.as_millis() as u64,
        )?);

        // 0이면 서버 측 타임아웃 비활성화
        let statement_timeout = match lookup("db_statement_timeout_ms") {
            Some(raw) => match parse_or::<u64>("db_statement_timeout_ms", Some(raw), 0)? {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            None => defaults.statement_timeout,
        };

        let config = Self {
            dsn,
            max_connections,
            min_connections,
            connect_timeout,
            statement_timeout,
        };

        info!("데이터베이스 설정 로드: {}", redact_dsn(&config.dsn));
        Ok(config)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
{
    match raw {
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::Configuration(format!("{} must be a number, got {:?}", key, raw))
        }),
        None => Ok(default),
    }
}

/// 현재 디렉토리, 그 다음 상위 디렉토리의 .env 파일을 시도합니다.
fn load_dotenv() {
    let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let candidates = [
        Some(current_dir.join(".env")),
        current_dir.parent().map(|p| p.join(".env")),
    ];

    for path in candidates.into_iter().flatten() {
        if path.exists() {
            dotenv::from_path(&path).ok();
            info!("환경 파일 로드: {:?}", path);
            return;
        }
    }

    if dotenv::dotenv().is_err() {
        warn!(".env 파일을 찾을 수 없어서 환경 변수를 직접 사용합니다.");
    }
}

/// 로그에 비밀번호가 노출되지 않도록 마스킹합니다.
pub fn redact_dsn(dsn: &str) -> String {
    let Some((scheme, rest)) = dsn.split_once("://") else {
        return dsn.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return dsn.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
        None => dsn.to_string(),
    }
}
