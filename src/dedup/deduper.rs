use crate::config::DedupSettings;
use crate::dedup::strategy::{DigestFactory, HashStrategy};
use crate::error::{BoxError, DedupError, Result};
use crate::observability::{display_key, get_metrics};
use crate::storage::DedupStorage;
use serde::{Deserialize, Serialize};
use std::any::{type_name, Any};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Value written when only key existence matters.
pub const SENTINEL: &[u8] = b"1";

/// A type-erased entity handed to the deduper. `None` stands for an absent entity.
pub type Entity<'a> = Option<&'a (dyn Any + Send + Sync)>;

type Extractor = Arc<dyn for<'a> Fn(Entity<'a>) -> Result<Vec<u8>> + Send + Sync>;
type Matcher = Arc<dyn for<'a, 'b> Fn(Entity<'a>, &'b [u8]) -> Result<bool> + Send + Sync>;
type Serializer = Arc<dyn for<'a> Fn(Entity<'a>) -> Result<String> + Send + Sync>;

/// Counters for dedup decisions made by one deduper.
#[derive(Debug, Default)]
pub struct DedupMetrics {
    pub total_checks: AtomicU64,
    pub duplicates: AtomicU64,
    pub stores: AtomicU64,
    pub write_back_failures: AtomicU64,
}

impl DedupMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_check(&self, kind: &'static str, duplicate: bool) {
        self.total_checks.fetch_add(1, Ordering::Relaxed);
        if duplicate {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
        }
        get_metrics().record_check(kind, duplicate);
    }

    fn record_store(&self, success: bool) {
        if success {
            self.stores.fetch_add(1, Ordering::Relaxed);
        }
        get_metrics().record_store(success);
    }

    fn record_write_back_failure(&self) {
        self.write_back_failures.fetch_add(1, Ordering::Relaxed);
        get_metrics().record_write_back_failure();
    }

    pub fn duplicate_rate(&self) -> f64 {
        self.snapshot().duplicate_rate()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_checks: self.total_checks.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            write_back_failures: self.write_back_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_checks: u64,
    pub duplicates: u64,
    pub stores: u64,
    pub write_back_failures: u64,
}

impl MetricsSnapshot {
    pub fn duplicate_rate(&self) -> f64 {
        if self.total_checks == 0 {
            0.0
        } else {
            self.duplicates as f64 / self.total_checks as f64
        }
    }
}

/// Result of a successful store: the fingerprint and the full storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredKey {
    pub fingerprint: Vec<u8>,
    pub key: Vec<u8>,
}

fn bind<'a, T: Any>(entity: Entity<'a>) -> Result<&'a T> {
    let entity = entity.ok_or(DedupError::EntityNil)?;
    entity
        .downcast_ref::<T>()
        .ok_or(DedupError::EntityTypeMismatch {
            expected: type_name::<T>(),
        })
}

/// Decides whether an entity was already seen, using a TTL key-value store.
///
/// A deduper is bound to one entity type at construction. Entities of any
/// other type are rejected with [`DedupError::EntityTypeMismatch`]. Keys are
/// `prefix ++ fingerprint`, and the default prefix is derived from the type
/// name so dedupers over different types never share keys.
///
/// Check-then-store sequences are two separate round trips. Concurrent
/// callers may both see a fingerprint as new.
pub struct Deduper {
    extractor: Extractor,
    matcher: Matcher,
    serializer: Serializer,
    storage: Arc<dyn DedupStorage>,
    digest: DigestFactory,
    prefix: Vec<u8>,
    entity_type: &'static str,
    metrics: Arc<DedupMetrics>,
}

impl Deduper {
    pub fn new<T, E, M, S>(
        extractor: E,
        storage: Arc<dyn DedupStorage>,
        digest: DigestFactory,
        matcher: M,
        serializer: S,
    ) -> Self
    where
        T: Any + Send + Sync,
        E: Fn(&T) -> std::result::Result<Vec<u8>, BoxError> + Send + Sync + 'static,
        M: Fn(&T, &[u8]) -> std::result::Result<bool, BoxError> + Send + Sync + 'static,
        S: Fn(&T) -> std::result::Result<String, BoxError> + Send + Sync + 'static,
    {
        let entity_type = type_name::<T>();

        Self {
            extractor: Arc::new(move |entity: Entity<'_>| {
                extractor(bind::<T>(entity)?).map_err(DedupError::InvalidHashInput)
            }),
            matcher: Arc::new(move |entity: Entity<'_>, stored: &[u8]| {
                matcher(bind::<T>(entity)?, stored).map_err(DedupError::ValueMatch)
            }),
            serializer: Arc::new(move |entity: Entity<'_>| {
                serializer(bind::<T>(entity)?).map_err(DedupError::Serialization)
            }),
            storage,
            digest,
            prefix: format!("dedup:{}:", entity_type).into_bytes(),
            entity_type,
            metrics: Arc::new(DedupMetrics::new()),
        }
    }

    /// Replaces the type-derived prefix. An empty prefix is ignored.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        if !prefix.is_empty() {
            self.prefix = prefix.into_bytes();
        }
        self
    }

    /// Applies the configured prefix, if any.
    pub fn with_settings(self, settings: &DedupSettings) -> Self {
        match &settings.prefix {
            Some(prefix) => self.with_prefix(prefix.as_str()),
            None => self,
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Canonical name of the entity type this deduper accepts.
    pub fn entity_type(&self) -> &'static str {
        self.entity_type
    }

    pub fn metrics(&self) -> Arc<DedupMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn key_for(&self, fingerprint: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.prefix.len() + fingerprint.len());
        key.extend_from_slice(&self.prefix);
        key.extend_from_slice(fingerprint);
        key
    }

    /// Computes the fingerprint of `entity` under the strategy's key-hash policy.
    pub fn hash(&self, entity: Entity<'_>, strategy: &HashStrategy) -> Result<Vec<u8>> {
        let input = (self.extractor)(entity)?;
        Ok(strategy.reduce_key(input, &self.digest))
    }

    /// Returns whether the entity's key exists, without looking at stored content.
    ///
    /// With `store_if_absent`, a missing key is written with the sentinel
    /// marker. That write is best effort: a failure is logged and the call
    /// still reports "not a duplicate".
    pub async fn is_duplicate(
        &self,
        entity: Entity<'_>,
        strategy: &HashStrategy,
        store_if_absent: Option<Duration>,
    ) -> Result<bool> {
        let fingerprint = self.hash(entity, strategy)?;
        let key = self.key_for(&fingerprint);

        let exists = self.storage.exists(&key).await?;
        self.metrics.record_check("key", exists);
        tracing::debug!(key = %display_key(&key), duplicate = exists, "Duplicate check");

        if !exists {
            if let Some(ttl) = store_if_absent {
                if let Err(e) = self.store_hash(&fingerprint, ttl).await {
                    self.metrics.record_write_back_failure();
                    tracing::error!(
                        key = %display_key(&key),
                        error = %e,
                        "Failed to store hash after duplicate check"
                    );
                }
            }
        }

        Ok(exists)
    }

    /// Returns whether a record exists for the entity's key and its content
    /// matches the entity.
    ///
    /// The entity is compared in its stored form first: an identical record is
    /// a match. A digested record or the key-only sentinel cannot be decoded,
    /// so anything but an identical record is a mismatch for those. Otherwise
    /// the matcher decides.
    ///
    /// An absent record is stored best effort when `store_if_absent` is set.
    /// On a mismatch with `update_on_mismatch`, the record is overwritten and
    /// a failure to do so is returned to the caller. The overwrite uses
    /// `store_if_absent` as TTL, or the storage default when it is `None`.
    pub async fn is_value_duplicate(
        &self,
        entity: Entity<'_>,
        strategy: &HashStrategy,
        store_if_absent: Option<Duration>,
        update_on_mismatch: bool,
    ) -> Result<bool> {
        let fingerprint = self.hash(entity, strategy)?;
        let key = self.key_for(&fingerprint);

        let existing = match self.storage.get(&key).await? {
            Some(value) if !value.is_empty() => value,
            _ => {
                self.metrics.record_check("value", false);
                if let Some(ttl) = store_if_absent {
                    if let Err(e) = self.store_entity(&key, entity, strategy, Some(ttl)).await {
                        self.metrics.record_write_back_failure();
                        tracing::error!(
                            key = %display_key(&key),
                            error = %e,
                            "Failed to store value after duplicate check"
                        );
                    }
                }
                return Ok(false);
            }
        };

        let (candidate, digested) = self.stored_form(entity, strategy)?;
        let matched = if candidate == existing {
            true
        } else if digested || existing == SENTINEL {
            false
        } else {
            (self.matcher)(entity, &existing)?
        };
        self.metrics.record_check("value", matched);
        tracing::debug!(key = %display_key(&key), duplicate = matched, "Value duplicate check");

        if !matched && update_on_mismatch {
            self.write_value(&key, &candidate, store_if_absent)
                .await
                .map_err(|e| {
                    tracing::error!(
                        key = %display_key(&key),
                        error = %e,
                        "Failed to update stale value"
                    );
                    e
                })?;
        }

        Ok(matched)
    }

    /// Serializes the entity and stores it under its key with the given TTL.
    pub async fn store(
        &self,
        entity: Entity<'_>,
        strategy: &HashStrategy,
        ttl: Duration,
    ) -> Result<StoredKey> {
        let fingerprint = self.hash(entity, strategy)?;
        let key = self.key_for(&fingerprint);
        self.store_entity(&key, entity, strategy, Some(ttl)).await?;

        Ok(StoredKey { fingerprint, key })
    }

    /// The entity as it is written under `strategy`, and whether that form is a digest.
    fn stored_form(&self, entity: Entity<'_>, strategy: &HashStrategy) -> Result<(Vec<u8>, bool)> {
        let serialized = (self.serializer)(entity)?.into_bytes();
        let digested = strategy.digests_value(serialized.len());
        Ok((strategy.reduce_value(serialized, &self.digest), digested))
    }

    async fn store_entity(
        &self,
        key: &[u8],
        entity: Entity<'_>,
        strategy: &HashStrategy,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let (value, _) = self.stored_form(entity, strategy)?;
        self.write_value(key, &value, ttl).await
    }

    async fn write_value(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let result = self.storage.set_ex(key, value, ttl).await;
        self.metrics.record_store(result.is_ok());
        result?;

        tracing::debug!(
            key = %display_key(key),
            value_len = value.len(),
            "Stored dedup value"
        );
        Ok(())
    }

    /// Stores the sentinel marker for an already computed fingerprint.
    pub async fn store_hash(&self, fingerprint: &[u8], ttl: Duration) -> Result<Vec<u8>> {
        let key = self.key_for(fingerprint);

        let result = self.storage.set_ex(&key, SENTINEL, Some(ttl)).await;
        self.metrics.record_store(result.is_ok());
        result?;

        Ok(key)
    }

    /// Remaining lifetime of the record stored for `fingerprint`.
    pub async fn ttl(&self, fingerprint: &[u8]) -> Result<Duration> {
        let key = self.key_for(fingerprint);
        let raw = self.storage.ttl(&key).await?;

        match raw {
            0 => Err(DedupError::KeyMissing),
            ms if ms < 0 => Err(DedupError::NoExpiration),
            ms => Ok(Duration::from_millis(ms as u64)),
        }
    }
}

impl std::fmt::Debug for Deduper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduper")
            .field("entity_type", &self.entity_type)
            .field("prefix", &display_key(&self.prefix))
            .finish_non_exhaustive()
    }
}
