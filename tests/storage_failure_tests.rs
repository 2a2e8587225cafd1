mod common;

use async_trait::async_trait;
use common::{entity_deduper, id_only_deduper, TestEntity};
use dedup_engine::dedup::{sha256_factory, SENTINEL};
use dedup_engine::{DedupError, DedupStorage, Deduper, ErrorKind, HashStrategy, StorageError};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Storage {}

    #[async_trait]
    impl DedupStorage for Storage {
        async fn exists(&self, key: &[u8]) -> Result<bool, StorageError>;
        async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;
        async fn set_ex(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<(), StorageError>;
        async fn ttl(&self, key: &[u8]) -> Result<i64, StorageError>;
    }
}

fn unavailable() -> StorageError {
    StorageError::Unavailable("connection refused".to_string())
}

fn entity() -> TestEntity {
    TestEntity::new("123", "Test")
}

#[tokio::test]
async fn test_exists_failure_propagates() {
    let mut storage = MockStorage::new();
    storage.expect_exists().times(1).returning(|_| Err(unavailable()));
    storage.expect_set_ex().never();

    let deduper = entity_deduper(Arc::new(storage));
    let err = deduper
        .is_duplicate(Some(&entity()), &HashStrategy::default(), Some(Duration::from_secs(10)))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(err.to_string().contains("connection refused"));
}

#[tokio::test]
async fn test_write_back_failure_is_swallowed_by_is_duplicate() {
    let mut storage = MockStorage::new();
    storage.expect_exists().times(1).returning(|_| Ok(false));
    storage
        .expect_set_ex()
        .times(1)
        .withf(|_, value, ttl| value == SENTINEL && *ttl == Some(Duration::from_secs(10)))
        .returning(|_, _, _| Err(unavailable()));

    let deduper = entity_deduper(Arc::new(storage));
    let duplicate = deduper
        .is_duplicate(Some(&entity()), &HashStrategy::default(), Some(Duration::from_secs(10)))
        .await
        .expect("write-back failure must not fail the check");

    assert!(!duplicate);
    let snapshot = deduper.metrics().snapshot();
    assert_eq!(snapshot.write_back_failures, 1);
    assert_eq!(snapshot.stores, 0);
}

#[tokio::test]
async fn test_existing_key_is_not_rewritten() {
    let mut storage = MockStorage::new();
    storage.expect_exists().times(1).returning(|_| Ok(true));
    storage.expect_set_ex().never();

    let deduper = entity_deduper(Arc::new(storage));
    assert!(deduper
        .is_duplicate(Some(&entity()), &HashStrategy::default(), Some(Duration::from_secs(10)))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_get_failure_propagates() {
    let mut storage = MockStorage::new();
    storage.expect_get().times(1).returning(|_| Err(unavailable()));

    let deduper = entity_deduper(Arc::new(storage));
    let err = deduper
        .is_value_duplicate(Some(&entity()), &HashStrategy::default(), None, true)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
}

#[tokio::test]
async fn test_absent_value_store_failure_is_swallowed() {
    let mut storage = MockStorage::new();
    storage.expect_get().times(1).returning(|_| Ok(None));
    storage
        .expect_set_ex()
        .times(1)
        .returning(|_, _, _| Err(unavailable()));

    let deduper = entity_deduper(Arc::new(storage));
    let duplicate = deduper
        .is_value_duplicate(Some(&entity()), &HashStrategy::default(), Some(Duration::from_secs(10)), true)
        .await
        .unwrap();

    assert!(!duplicate);
    assert_eq!(deduper.metrics().snapshot().write_back_failures, 1);
}

#[tokio::test]
async fn test_empty_value_counts_as_absent() {
    let mut storage = MockStorage::new();
    storage.expect_get().times(1).returning(|_| Ok(Some(Vec::new())));
    storage.expect_set_ex().never();

    let deduper = entity_deduper(Arc::new(storage));
    assert!(!deduper
        .is_value_duplicate(Some(&entity()), &HashStrategy::default(), None, true)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_update_on_mismatch_failure_propagates() {
    let stale = serde_json::to_vec(&TestEntity::new("123", "Stale")).unwrap();
    let mut storage = MockStorage::new();
    storage
        .expect_get()
        .times(1)
        .returning(move |_| Ok(Some(stale.clone())));
    storage
        .expect_set_ex()
        .times(1)
        .returning(|_, _, _| Err(unavailable()));

    let deduper = id_only_deduper(Arc::new(storage));
    let err = deduper
        .is_value_duplicate(Some(&entity()), &HashStrategy::default(), Some(Duration::from_secs(10)), true)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
}

#[tokio::test]
async fn test_mismatch_without_update_leaves_record() {
    let stale = serde_json::to_vec(&TestEntity::new("123", "Stale")).unwrap();
    let mut storage = MockStorage::new();
    storage
        .expect_get()
        .times(1)
        .returning(move |_| Ok(Some(stale.clone())));
    storage.expect_set_ex().never();

    let deduper = id_only_deduper(Arc::new(storage));
    assert!(!deduper
        .is_value_duplicate(Some(&entity()), &HashStrategy::default(), Some(Duration::from_secs(10)), false)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_update_without_ttl_uses_storage_default() {
    let stale = serde_json::to_vec(&TestEntity::new("123", "Stale")).unwrap();
    let expected = serde_json::to_vec(&entity()).unwrap();
    let mut storage = MockStorage::new();
    storage
        .expect_get()
        .times(1)
        .returning(move |_| Ok(Some(stale.clone())));
    storage
        .expect_set_ex()
        .times(1)
        .withf(move |key, value, ttl| key == b"dedup:test:123" && value == expected.as_slice() && ttl.is_none())
        .returning(|_, _, _| Ok(()));

    let deduper = id_only_deduper(Arc::new(storage)).with_prefix("dedup:test:");
    assert!(!deduper
        .is_value_duplicate(Some(&entity()), &HashStrategy::default(), None, true)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_matcher_failure_is_value_match_error() {
    let mut storage = MockStorage::new();
    storage
        .expect_get()
        .times(1)
        .returning(|_| Ok(Some(b"corrupt".to_vec())));
    storage.expect_set_ex().never();

    let deduper = Deduper::new(
        |e: &TestEntity| Ok(e.id.clone().into_bytes()),
        Arc::new(storage),
        sha256_factory(),
        |_: &TestEntity, stored: &[u8]| {
            serde_json::from_slice::<TestEntity>(stored)?;
            Ok(true)
        },
        dedup_engine::dedup::json_serializer::<TestEntity>(),
    );

    let err = deduper
        .is_value_duplicate(Some(&entity()), &HashStrategy::default(), None, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValueMatch);
}

#[tokio::test]
async fn test_store_failure_propagates() {
    let mut storage = MockStorage::new();
    storage
        .expect_set_ex()
        .times(1)
        .returning(|_, _, _| Err(unavailable()));

    let deduper = entity_deduper(Arc::new(storage));
    let err = deduper
        .store(Some(&entity()), &HashStrategy::default(), Duration::from_secs(10))
        .await
        .unwrap_err();

    assert!(matches!(err, DedupError::Storage(StorageError::Unavailable(_))));
}

#[tokio::test]
async fn test_serializer_failure_skips_write() {
    let mut storage = MockStorage::new();
    storage.expect_set_ex().never();

    let deduper = Deduper::new(
        |e: &TestEntity| Ok(e.id.clone().into_bytes()),
        Arc::new(storage),
        sha256_factory(),
        dedup_engine::dedup::json_matcher::<TestEntity>(),
        |_: &TestEntity| Err("cannot encode".into()),
    );

    let err = deduper
        .store(Some(&entity()), &HashStrategy::default(), Duration::from_secs(10))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Serialization);
}

#[tokio::test]
async fn test_store_hash_failure_propagates() {
    let mut storage = MockStorage::new();
    storage
        .expect_set_ex()
        .times(1)
        .returning(|_, _, _| Err(unavailable()));

    let deduper = entity_deduper(Arc::new(storage));
    let err = deduper
        .store_hash(b"abc", Duration::from_secs(10))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
}

#[tokio::test]
async fn test_ttl_interpretation() {
    let mut storage = MockStorage::new();
    storage
        .expect_ttl()
        .withf(|key| key == b"p:missing")
        .returning(|_| Ok(0));
    storage
        .expect_ttl()
        .withf(|key| key == b"p:forever")
        .returning(|_| Ok(-1));
    storage
        .expect_ttl()
        .withf(|key| key == b"p:timed")
        .returning(|_| Ok(2_500));
    storage
        .expect_ttl()
        .withf(|key| key == b"p:broken")
        .returning(|_| Err(unavailable()));

    let deduper = entity_deduper(Arc::new(storage)).with_prefix("p:");

    assert_eq!(deduper.ttl(b"missing").await.unwrap_err().kind(), ErrorKind::KeyMissing);
    assert_eq!(deduper.ttl(b"forever").await.unwrap_err().kind(), ErrorKind::NoExpiration);
    assert_eq!(deduper.ttl(b"timed").await.unwrap(), Duration::from_millis(2_500));
    assert_eq!(deduper.ttl(b"broken").await.unwrap_err().kind(), ErrorKind::Storage);
}
