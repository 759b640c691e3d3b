//! 데이터베이스 서비스 모듈
//!
//! 앰비언트 트랜잭션과 취소 가능한 실행기를 제공합니다.
//! 코어는 저장소 트레이트에만 의존하며, PostgreSQL 구현체는 `pg` 모듈에 있습니다.

// 핵심 모듈들 - 관심사의 명확한 분리
pub mod core; // 컨텍스트 연동, 실행, 트랜잭션, 로그 렌더링
pub mod pg; // sqlx 기반 PostgreSQL 저장소
pub mod traits; // 저장소 협력자 인터페이스

// 핵심 컴포넌트들 내보내기
pub use self::core::{
    // 앰비언트 트랜잭션
    context_tx::{make_context_tx, tx_from_context},
    // 쿼리 실행
    executor::QueryExecutor,
    // 트랜잭션 관리
    transaction::TransactionManager,
    // 데이터 타입들
    types::{CommandTag, IsolationLevel, PlaceholderFormat, Query, QueryArg, QueryRow, TxOptions},
};
pub use pg::{PgClient, PgStore, PgTransaction};
pub use traits::{Client, Executor, Pinger, Store, Transaction, Transactor};
