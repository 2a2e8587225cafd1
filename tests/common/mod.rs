#![allow(dead_code)]

use dedup_engine::dedup::{json_matcher, json_serializer, sha256_factory, DigestFactory};
use dedup_engine::{DedupStorage, Deduper};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestEntity {
    pub id: String,
    pub name: String,
}

impl TestEntity {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// A second entity type with the same fingerprint input as [`TestEntity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherEntity {
    pub id: String,
    pub name: String,
}

/// Fingerprints on `id:name`.
pub fn entity_deduper(storage: Arc<dyn DedupStorage>) -> Deduper {
    entity_deduper_with_digest(storage, sha256_factory())
}

pub fn entity_deduper_with_digest(storage: Arc<dyn DedupStorage>, digest: DigestFactory) -> Deduper {
    Deduper::new(
        |e: &TestEntity| Ok(format!("{}:{}", e.id, e.name).into_bytes()),
        storage,
        digest,
        json_matcher::<TestEntity>(),
        json_serializer::<TestEntity>(),
    )
}

/// Fingerprints on `id` alone, so entities differing only by name collide.
pub fn id_only_deduper(storage: Arc<dyn DedupStorage>) -> Deduper {
    Deduper::new(
        |e: &TestEntity| Ok(e.id.clone().into_bytes()),
        storage,
        sha256_factory(),
        json_matcher::<TestEntity>(),
        json_serializer::<TestEntity>(),
    )
}

pub fn other_deduper(storage: Arc<dyn DedupStorage>) -> Deduper {
    Deduper::new(
        |e: &OtherEntity| Ok(format!("{}:{}", e.id, e.name).into_bytes()),
        storage,
        sha256_factory(),
        json_matcher::<OtherEntity>(),
        json_serializer::<OtherEntity>(),
    )
}
