pub mod deduper;
pub mod json;
pub mod strategy;

pub use deduper::{DedupMetrics, Deduper, Entity, MetricsSnapshot, StoredKey, SENTINEL};
pub use json::{json_matcher, json_serializer};
pub use strategy::{
    digest_factory, reduce, sha256_factory, Accumulator, DigestAccumulator, DigestFactory,
    HashMode, HashStrategy, DEFAULT_KEY_THRESHOLD, DEFAULT_VAL_THRESHOLD,
};
