//! Behaviour of memory-backed stores, with the tokio clock paused to
//! simulate expiry.

use coffer_store::{
    BackendKind, CacheError, CacheValue, Driver, Expiration, NumericOpFailure, StoreConfig,
    StoreFactory,
};
use std::collections::HashMap;
use std::time::Duration;

fn config() -> StoreConfig {
    StoreConfig::new(BackendKind::Memory)
        .with_prefix("cache_")
        .with_expiration(Duration::from_secs(3600))
}

#[tokio::test(start_paused = true)]
async fn test_session_expires_after_an_hour() {
    let store = StoreFactory::new().build(&config()).await.unwrap();

    assert!(store.put("session:42", "alice", Expiration::secs(3600)).await);
    assert_eq!(
        store.get("session:42").await.unwrap(),
        Some(CacheValue::from("alice"))
    );

    tokio::time::advance(Duration::from_secs(3601)).await;
    assert_eq!(store.get("session:42").await.unwrap(), None);
    assert_eq!(
        store.get_default("session:42", "guest").await.unwrap(),
        CacheValue::from("guest")
    );
}

#[tokio::test(start_paused = true)]
async fn test_put_default_uses_configured_expiration() {
    let config = config().with_expiration(Duration::from_secs(10));
    let store = StoreFactory::new().build(&config).await.unwrap();

    store.put_default("short", "v").await;
    store.put("long", "v", Expiration::secs(60)).await;
    assert!(store.forever("pinned", "v").await);

    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(!store.has("short").await);
    assert!(store.has("long").await);
    assert!(store.has("pinned").await);
}

#[tokio::test]
async fn test_put_many_then_many() {
    let store = StoreFactory::new().build(&config()).await.unwrap();

    let entries = [("k1", CacheValue::from("v1")), ("k2", CacheValue::Int(2))];
    assert!(store.put_many(entries, Expiration::secs(60)).await);

    let values = store.many(["k1", "k2", "k3"]).await;
    let expected: HashMap<String, Option<CacheValue>> = [
        ("k1".to_string(), Some(CacheValue::from("v1"))),
        ("k2".to_string(), Some(CacheValue::Int(2))),
        ("k3".to_string(), None),
    ]
    .into_iter()
    .collect();
    assert_eq!(values, expected);
}

#[tokio::test]
async fn test_second_add_is_a_no_op() {
    let store = StoreFactory::new().build(&config()).await.unwrap();

    assert!(store.add("k", "v1", Expiration::secs(60)).await);
    assert!(!store.add("k", "v2", Expiration::secs(60)).await);
    assert_eq!(store.get_scan::<String>("k").await.unwrap(), "v1");
}

#[tokio::test]
async fn test_increment_then_decrement_restores_value() {
    let store = StoreFactory::new().build(&config()).await.unwrap();

    for step in [1, 17, -5, i64::from(i32::MAX)] {
        store.put_default("n", 100).await;
        store.increment("n", step).await.unwrap();
        store.decrement("n", step).await.unwrap();
        assert_eq!(store.get_scan::<i64>("n").await.unwrap(), 100);
    }

    let err = store.increment("absent", 1).await.unwrap_err();
    assert!(matches!(
        err,
        CacheError::NumericOp { reason: NumericOpFailure::NotFound, .. }
    ));
}

#[tokio::test]
async fn test_forget_removes_key() {
    let store = StoreFactory::new().build(&config()).await.unwrap();

    store.put_default("k", "v").await;
    assert!(store.forget("k").await);
    assert!(!store.has("k").await);
    let fallback = store.get_scan_default("k", "fallback".to_string()).await;
    assert_eq!(fallback.unwrap(), "fallback");
}

#[tokio::test]
async fn test_backend_sees_prefixed_keys_only() {
    let store = StoreFactory::new()
        .build(&StoreConfig::new(BackendKind::Memory).with_prefix("p_"))
        .await
        .unwrap();

    store.put("x", "v", Expiration::secs(60)).await;
    assert!(store.driver().has("p_x").await);
    assert!(!store.driver().has("x").await);
    assert_eq!(store.driver().get("x").await.unwrap(), None);
}

#[tokio::test]
async fn test_flush_wipes_every_store_on_the_table() {
    let factory = StoreFactory::new();
    let users = factory
        .build(&StoreConfig::new(BackendKind::Memory).with_prefix("users_"))
        .await
        .unwrap();
    let orders = factory
        .build(&StoreConfig::new(BackendKind::Memory).with_prefix("orders_"))
        .await
        .unwrap();

    users.put_default("1", "alice").await;
    orders.put_default("1", "book").await;

    assert!(orders.flush().await);
    assert!(!users.has("1").await);
    assert!(!orders.has("1").await);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_expiration_is_accepted() {
    let store = StoreFactory::new().build(&config()).await.unwrap();

    assert!(store.put("k", "v", Duration::MAX).await);
    tokio::time::advance(Duration::from_secs(7200)).await;
    assert_eq!(store.get_scan::<String>("k").await.unwrap(), "v");
}
