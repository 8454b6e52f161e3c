//! Helper functions for common cache operations.

use crate::error::{CacheError, CacheResult};
use crate::traits::CacheStore;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

/// Get a typed value from the cache.
pub async fn get<S, T>(store: &S, key: &str) -> CacheResult<Option<T>>
where
    S: CacheStore + ?Sized,
    T: DeserializeOwned,
{
    if let Some(json) = store.get_json(key).await? {
        let value: T = serde_json::from_str(&json)
            .map_err(|e| CacheError::Deserialization(e.to_string()))?;
        Ok(Some(value))
    } else {
        Ok(None)
    }
}

/// Set a typed value in the cache.
pub async fn set<S, T>(store: &S, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()>
where
    S: CacheStore + ?Sized,
    T: Serialize + ?Sized,
{
    let json =
        serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
    store.set_json(key, json, ttl).await
}

/// Remember a value for a given duration.
///
/// If the key exists, returns the cached value.
/// If not, calls the factory function, caches the result, and returns it.
pub async fn remember<S, T, F, Fut>(
    store: &S,
    key: &str,
    ttl: Duration,
    factory: F,
) -> CacheResult<T>
where
    S: CacheStore + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = CacheResult<T>>,
{
    if let Some(value) = get(store, key).await? {
        return Ok(value);
    }

    let value = factory().await?;
    set(store, key, &value, Some(ttl)).await?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryCache;

    #[tokio::test]
    async fn test_typed_roundtrip() {
        let cache = InMemoryCache::new();
        set(&cache, "ts", &1_700_000_000i64, None).await.unwrap();

        let value: Option<i64> = get(&cache, "ts").await.unwrap();
        assert_eq!(value, Some(1_700_000_000));
    }

    #[tokio::test]
    async fn test_get_wrong_type() {
        let cache = InMemoryCache::new();
        cache
            .set_json("ts", "\"tomorrow\"".to_string(), None)
            .await
            .unwrap();

        let result: CacheResult<Option<i64>> = get(&cache, "ts").await;
        assert!(matches!(result, Err(CacheError::Deserialization(_))));
    }

    #[tokio::test]
    async fn test_remember_calls_factory_once() {
        let cache = InMemoryCache::new();

        let first: i64 = remember(&cache, "n", Duration::from_secs(60), || async { Ok(7) })
            .await
            .unwrap();
        let second: i64 = remember(&cache, "n", Duration::from_secs(60), || async { Ok(9) })
            .await
            .unwrap();

        assert_eq!(first, 7);
        assert_eq!(second, 7);
    }
}
