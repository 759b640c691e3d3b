//! Cancelable execution adapter tests

mod support;

use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use support::FakeStore;
use txkit::{AppError, CancelReason, Context, Query, QueryExecutor, QueryRow};

#[derive(Debug, Deserialize, PartialEq)]
struct Message {
    id: i64,
    author: String,
}

fn message_row(id: i64, author: &str) -> QueryRow {
    HashMap::from([
        ("id".to_string(), json!(id)),
        ("author".to_string(), json!(author)),
    ])
}

fn select_messages() -> Query {
    Query::new("message.list", "SELECT id, author FROM message WHERE chat_id = $1")
}

#[tokio::test]
async fn test_hanging_operation_yields_deadline_exceeded() {
    let store = FakeStore::new();
    store.hang.store(true, Ordering::SeqCst);
    let db = QueryExecutor::new(store.clone());

    let (ctx, _cancel) = Context::background().with_timeout(Duration::from_millis(50));
    let started = Instant::now();
    let err = db
        .exec_context(&ctx, &Query::new("noop", "SELECT pg_sleep(3600)"), &[])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Canceled(CancelReason::DeadlineExceeded)
    ));
    assert!(err.is_canceled());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_explicit_cancel_interrupts_wait() {
    let store = FakeStore::new();
    store.hang.store(true, Ordering::SeqCst);
    let db = Arc::new(QueryExecutor::new(store.clone()));

    let (ctx, cancel) = Context::background().with_cancel();
    let waiter = {
        let db = db.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move { db.query_context(&ctx, &select_messages(), &[json!(1)]).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let err = waiter.await.unwrap().unwrap_err();
    assert!(matches!(err, AppError::Canceled(CancelReason::Canceled)));
}

#[tokio::test]
async fn test_canceled_context_is_not_dispatched() {
    let store = FakeStore::new();
    let db = QueryExecutor::new(store.clone());
    let (ctx, cancel) = Context::background().with_cancel();
    cancel.cancel();

    let err = db.ping(&ctx).await.unwrap_err();
    assert!(err.is_canceled());
    assert!(store.events().is_empty());
}

#[tokio::test]
async fn test_scan_all_decodes_rows() {
    let store = FakeStore::new();
    store.set_rows(vec![message_row(1, "ann"), message_row(2, "bob")]);
    let db = QueryExecutor::new(store.clone());

    let messages: Vec<Message> = db
        .scan_all_context(&Context::background(), &select_messages(), &[json!(7)])
        .await
        .unwrap();

    assert_eq!(
        messages,
        vec![
            Message { id: 1, author: "ann".to_string() },
            Message { id: 2, author: "bob".to_string() },
        ]
    );
    assert_eq!(store.count(&format!("query@store:{}", select_messages().sql)), 1);
}

#[tokio::test]
async fn test_scan_one_requires_exactly_one_row() {
    let store = FakeStore::new();
    let db = QueryExecutor::new(store.clone());
    let ctx = Context::background();

    let err = db
        .scan_one_context::<Message>(&ctx, &select_messages(), &[json!(7)])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    store.set_rows(vec![message_row(3, "cid")]);
    let message: Message = db
        .scan_one_context(&ctx, &select_messages(), &[json!(7)])
        .await
        .unwrap();
    assert_eq!(message, Message { id: 3, author: "cid".to_string() });

    store.set_rows(vec![message_row(3, "cid"), message_row(4, "dee")]);
    let err = db
        .scan_one_context::<Message>(&ctx, &select_messages(), &[json!(7)])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DatabaseQuery(_)));
}

#[tokio::test]
async fn test_scalar_scan_and_decode_error() {
    let store = FakeStore::new();
    store.set_rows(vec![HashMap::from([("value".to_string(), json!(12))])]);
    let db = QueryExecutor::new(store.clone());
    let ctx = Context::background();
    let q = Query::new("message.count", "SELECT count(*) AS value FROM message");

    let count: i64 = db.query_row_context_scan(&ctx, &q, &[]).await.unwrap();
    assert_eq!(count, 12);

    let err = db
        .query_row_context_scan::<String>(&ctx, &q, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Decode(_)));
}

#[tokio::test]
async fn test_ping_and_close_reach_store() {
    let store = FakeStore::new();
    let db = QueryExecutor::new(store.clone());

    db.ping(&Context::background()).await.unwrap();
    db.close().await;

    assert!(store.closed.load(Ordering::SeqCst));
    assert_eq!(store.events(), vec!["ping", "close"]);
}
