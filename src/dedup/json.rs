//! Ready-made serde_json serializer and matcher for [`Deduper`](super::Deduper).

use crate::error::BoxError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serializes entities as compact JSON.
pub fn json_serializer<T>() -> impl Fn(&T) -> Result<String, BoxError> + Send + Sync + 'static
where
    T: Serialize + 'static,
{
    |entity: &T| serde_json::to_string(entity).map_err(BoxError::from)
}

/// Matches an entity against a stored JSON record by value.
///
/// A record that does not decode as `T` is an error. The deduper never hands
/// digested values or the key-only sentinel to a matcher.
pub fn json_matcher<T>() -> impl Fn(&T, &[u8]) -> Result<bool, BoxError> + Send + Sync + 'static
where
    T: DeserializeOwned + PartialEq + 'static,
{
    |entity: &T, stored: &[u8]| -> Result<bool, BoxError> {
        let decoded: T = serde_json::from_slice(stored)?;
        Ok(decoded == *entity)
    }
}
