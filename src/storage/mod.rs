pub mod memory;
pub mod redis;

pub use self::memory::MemoryStorage;
pub use self::redis::RedisStorage;

use crate::error::StorageError;
use async_trait::async_trait;
use std::time::Duration;

/// Raw TTL reported for a key that does not exist.
pub const TTL_MISSING: i64 = 0;
/// Raw TTL reported for a key that exists without an expiration.
pub const TTL_PERSISTENT: i64 = -1;

/// Binary-safe key-value operations required by the deduper.
///
/// Implementations must make each single-key operation atomic. No atomicity
/// across calls is ever required.
#[async_trait]
pub trait DedupStorage: Send + Sync {
    /// Returns true if the key is present and not expired.
    async fn exists(&self, key: &[u8]) -> Result<bool, StorageError>;

    /// Returns `None` when the key is missing.
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Overwrites value and TTL. `None` uses the adapter's default expiration.
    async fn set_ex(
        &self,
        key: &[u8],
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), StorageError>;

    /// Remaining TTL in milliseconds: `0` when missing, negative when the key
    /// never expires, positive otherwise.
    async fn ttl(&self, key: &[u8]) -> Result<i64, StorageError>;
}
