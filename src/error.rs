use thiserror::Error;

/// Boxed error returned by caller-supplied extractor, matcher and serializer functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, DedupError>;

/// Base of the numeric error code space.
pub const DEDUP_ERROR_CODE_BASE: u32 = 100_000;

/// Failure of the backing key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("Entity is nil")]
    EntityNil,

    #[error("Entity is not of type '{expected}'")]
    EntityTypeMismatch { expected: &'static str },

    #[error("Invalid hash input: {0}")]
    InvalidHashInput(#[source] BoxError),

    #[error("Failed to serialize entity: {0}")]
    Serialization(#[source] BoxError),

    #[error("Failed to match value: {0}")]
    ValueMatch(#[source] BoxError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Key does not exist")]
    KeyMissing,

    #[error("Key has no expiration")]
    NoExpiration,
}

/// Stable tag identifying a [`DedupError`] variant independently of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EntityNil,
    EntityTypeMismatch,
    InvalidHashInput,
    Serialization,
    ValueMatch,
    Storage,
    KeyMissing,
    NoExpiration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::EntityNil => "entity_nil",
            ErrorKind::EntityTypeMismatch => "entity_type_mismatch",
            ErrorKind::InvalidHashInput => "invalid_hash_input",
            ErrorKind::Serialization => "serialization",
            ErrorKind::ValueMatch => "value_match",
            ErrorKind::Storage => "storage",
            ErrorKind::KeyMissing => "key_missing",
            ErrorKind::NoExpiration => "no_expiration",
        }
    }

    /// Whether the failure was caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ErrorKind::EntityNil | ErrorKind::EntityTypeMismatch)
    }
}

impl DedupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DedupError::EntityNil => ErrorKind::EntityNil,
            DedupError::EntityTypeMismatch { .. } => ErrorKind::EntityTypeMismatch,
            DedupError::InvalidHashInput(_) => ErrorKind::InvalidHashInput,
            DedupError::Serialization(_) => ErrorKind::Serialization,
            DedupError::ValueMatch(_) => ErrorKind::ValueMatch,
            DedupError::Storage(_) => ErrorKind::Storage,
            DedupError::KeyMissing => ErrorKind::KeyMissing,
            DedupError::NoExpiration => ErrorKind::NoExpiration,
        }
    }

    /// Numeric code: base + 400 for caller faults, base + 500 for everything else.
    pub fn code(&self) -> u32 {
        if self.kind().is_client_error() {
            DEDUP_ERROR_CODE_BASE + 400
        } else {
            DEDUP_ERROR_CODE_BASE + 500
        }
    }
}
