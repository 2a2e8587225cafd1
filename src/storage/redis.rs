use super::{DedupStorage, TTL_MISSING, TTL_PERSISTENT};
use crate::config::RedisSettings;
use crate::error::StorageError;
use crate::observability::{display_key, get_metrics, LatencyTimer};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;

/// Expiration applied by `set_ex` when the caller passes no TTL.
pub const DEFAULT_REDIS_TTL: Duration = Duration::from_secs(3600);

/// Redis-backed storage for dedup markers.
#[derive(Clone)]
pub struct RedisStorage {
    client: redis::Client,
    default_ttl: Duration,
}

impl RedisStorage {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            default_ttl: DEFAULT_REDIS_TTL,
        }
    }

    pub fn from_url(url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(url)?;
        Ok(Self::new(client))
    }

    /// Opens a client for `settings.url` with the configured default TTL.
    pub fn from_settings(settings: &RedisSettings) -> Result<Self, StorageError> {
        Ok(Self::from_url(&settings.url)?.with_default_ttl(settings.default_ttl()))
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StorageError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                tracing::warn!("Redis connection error: {}", e);
                StorageError::Redis(e)
            })
    }

    fn record(&self, operation: &str, timer: &LatencyTimer, success: bool) {
        get_metrics().record_storage_operation(operation, timer.elapsed_ms(), success);
    }
}

#[async_trait]
impl DedupStorage for RedisStorage {
    async fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        let timer = LatencyTimer::new();
        let mut conn = self.connection().await?;

        let result: redis::RedisResult<bool> = conn.exists(key).await;
        self.record("exists", &timer, result.is_ok());
        Ok(result?)
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let timer = LatencyTimer::new();
        let mut conn = self.connection().await?;

        let result: redis::RedisResult<Option<Vec<u8>>> = conn.get(key).await;
        self.record("get", &timer, result.is_ok());
        Ok(result?)
    }

    async fn set_ex(
        &self,
        key: &[u8],
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let millis = expire_millis(ttl.unwrap_or(self.default_ttl));
        let timer = LatencyTimer::new();
        let mut conn = self.connection().await?;

        let result: redis::RedisResult<()> = redis::cmd("PSETEX")
            .arg(key)
            .arg(millis)
            .arg(value)
            .query_async(&mut conn)
            .await;
        self.record("set_ex", &timer, result.is_ok());
        if let Err(ref e) = result {
            tracing::warn!(key = %display_key(key), "Redis set error: {}", e);
        }
        Ok(result?)
    }

    async fn ttl(&self, key: &[u8]) -> Result<i64, StorageError> {
        let timer = LatencyTimer::new();
        let mut conn = self.connection().await?;

        let result: redis::RedisResult<i64> = conn.pttl(key).await;
        self.record("ttl", &timer, result.is_ok());
        Ok(map_pttl(result?))
    }
}

/// PSETEX argument for `ttl`. Redis rejects a zero expiration.
fn expire_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Maps Redis `PTTL` replies onto the storage TTL encoding.
fn map_pttl(raw: i64) -> i64 {
    match raw {
        -2 => TTL_MISSING,
        -1 => TTL_PERSISTENT,
        0 => 1,
        ms => ms,
    }
}
