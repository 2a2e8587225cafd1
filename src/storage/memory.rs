use super::{DedupStorage, TTL_MISSING, TTL_PERSISTENT};
use crate::error::StorageError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process storage with lazy expiry, driven by the tokio clock.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<DashMap<Vec<u8>, Entry>>,
    default_ttl: Option<Duration>,
}

impl MemoryStorage {
    /// Keys written without a TTL never expire.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.value().is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }

    fn live(&self, key: &[u8]) -> Option<Entry> {
        let now = Instant::now();
        let entry = self.entries.get(key)?.value().clone();
        if entry.is_live(now) {
            Some(entry)
        } else {
            self.entries.remove_if(key, |_, e| !e.is_live(now));
            None
        }
    }
}

#[async_trait]
impl DedupStorage for MemoryStorage {
    async fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.live(key).is_some())
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.live(key).map(|e| e.value))
    }

    async fn set_ex(
        &self,
        key: &[u8],
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        // A TTL past the clock's range never expires.
        let expires_at = ttl
            .or(self.default_ttl)
            .and_then(|ttl| Instant::now().checked_add(ttl));
        self.entries.insert(
            key.to_vec(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn ttl(&self, key: &[u8]) -> Result<i64, StorageError> {
        let Some(entry) = self.live(key) else {
            return Ok(TTL_MISSING);
        };
        match entry.expires_at {
            None => Ok(TTL_PERSISTENT),
            Some(at) => {
                let remaining = at.saturating_duration_since(Instant::now());
                Ok(i64::try_from(remaining.as_millis()).unwrap_or(i64::MAX).max(1))
            }
        }
    }
}
