pub mod config;
pub mod dedup;
pub mod error;
pub mod observability;
pub mod storage;

pub use config::Settings;
pub use dedup::{Deduper, Entity, HashMode, HashStrategy, StoredKey};
pub use error::{BoxError, DedupError, ErrorKind, Result, StorageError};
pub use storage::{DedupStorage, MemoryStorage, RedisStorage};
