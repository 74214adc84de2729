// 缓存模块
// 读操作结果按 键族 + 参数 缓存，写操作后按族失效

pub mod keys;
mod memory;
mod redis_store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::RedisResult;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::logger::EventLog;

pub use memory::MemoryCacheStore;
pub use redis_store::RedisCacheStore;

/// 键值存储接口，缓存和限流共用
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> RedisResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> RedisResult<()>;

    async fn keys_with_prefix(&self, prefix: &str) -> RedisResult<Vec<String>>;

    async fn delete(&self, keys: &[String]) -> RedisResult<u64>;

    /// 固定窗口计数，返回 (当前计数, 剩余秒数)
    async fn incr_window(&self, key: &str, window: Duration) -> RedisResult<(u64, u64)>;
}

#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    prefix: String,
    default_ttl: Duration,
    enabled: bool,
    log: EventLog,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>, config: &Config, log: EventLog) -> Self {
        Self {
            store,
            prefix: config.cache_prefix.clone(),
            default_ttl: config.cache_default_expire(),
            enabled: config.cache_enabled(),
            log,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// 命中时直接返回缓存值，否则执行 compute 并写入缓存。
    /// compute 只在未命中时被 await；ttl 为 None 时使用默认过期时间。
    pub async fn cached<A, T, Fut>(
        &self,
        key_name: &str,
        args: &A,
        ttl: Option<Duration>,
        compute: Fut,
    ) -> AppResult<T>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = AppResult<T>>,
    {
        if !self.enabled {
            return compute.await;
        }

        let digest = keys::args_digest(args)
            .map_err(|e| AppError::Internal(format!("failed to serialize cache arguments: {}", e)))?;
        let key = keys::entry_key(&self.prefix, key_name, &digest);

        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    self.log.info(json!({ "message": "cache hit", "key": key }));
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(key = %key, "Discarding undecodable cache entry: {}", e);
                }
            },
            Ok(None) => {}
            Err(e) => {
                // 缓存不可用时退化为直接计算
                tracing::warn!(key = %key, "Cache read failed: {}", e);
            }
        }

        let value = compute.await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                let ttl = ttl.unwrap_or(self.default_ttl);
                match self.store.set_ex(&key, &raw, ttl).await {
                    Ok(()) => self.log.info(json!({
                        "message": "cache store",
                        "key": key,
                        "ttl": ttl.as_secs(),
                    })),
                    Err(e) => tracing::warn!(key = %key, "Cache write failed: {}", e),
                }
            }
            Err(e) => tracing::warn!(key = %key, "Failed to serialize cache value: {}", e),
        }

        Ok(value)
    }

    /// 删除给定键族下的所有缓存
    pub async fn invalidate(&self, key_names: &[&str]) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }

        for key_name in key_names {
            let prefix = keys::family_prefix(&self.prefix, key_name);
            let found = self.store.keys_with_prefix(&prefix).await?;
            if found.is_empty() {
                continue;
            }
            let removed = self.store.delete(&found).await?;
            self.log.info(json!({
                "message": "cache invalidate",
                "key_name": key_name,
                "keys": found,
                "removed": removed,
            }));
        }
        Ok(())
    }

    /// 执行写操作，成功后再失效缓存
    pub async fn invalidating<T, Fut>(&self, key_names: &[&str], op: Fut) -> AppResult<T>
    where
        Fut: Future<Output = AppResult<T>>,
    {
        let value = op.await?;
        self.invalidate(key_names).await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn enabled_cache(store: MemoryCacheStore) -> Cache {
        Cache::new(Arc::new(store), &Config::default(), EventLog::disabled()).with_enabled(true)
    }

    struct FailingStore;

    #[async_trait]
    impl CacheStore for FailingStore {
        async fn get(&self, _key: &str) -> RedisResult<Option<String>> {
            Err((redis::ErrorKind::IoError, "connection refused").into())
        }

        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> RedisResult<()> {
            Err((redis::ErrorKind::IoError, "connection refused").into())
        }

        async fn keys_with_prefix(&self, _prefix: &str) -> RedisResult<Vec<String>> {
            Err((redis::ErrorKind::IoError, "connection refused").into())
        }

        async fn delete(&self, _keys: &[String]) -> RedisResult<u64> {
            Err((redis::ErrorKind::IoError, "connection refused").into())
        }

        async fn incr_window(&self, _key: &str, _window: Duration) -> RedisResult<(u64, u64)> {
            Err((redis::ErrorKind::IoError, "connection refused").into())
        }
    }

    #[tokio::test]
    async fn computes_once_between_invalidations() {
        let cache = enabled_cache(MemoryCacheStore::new());
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let compute = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AppError>(vec![1, 2, 3])
        };

        for _ in 0..3 {
            let value: Vec<i32> = cache
                .cached(keys::USER_LIST, &("search", 1), None, compute())
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(&[keys::USER_LIST]).await.unwrap();
        let _: Vec<i32> = cache
            .cached(keys::USER_LIST, &("search", 1), None, compute())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn different_arguments_use_different_entries() {
        let cache = enabled_cache(MemoryCacheStore::new());
        let a: u32 = cache
            .cached(keys::RECIPE_DETAIL, &"a", None, async { Ok(1) })
            .await
            .unwrap();
        let b: u32 = cache
            .cached(keys::RECIPE_DETAIL, &"b", None, async { Ok(2) })
            .await
            .unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[tokio::test]
    async fn mutation_is_never_followed_by_a_stale_read() {
        let cache = enabled_cache(MemoryCacheStore::new());
        let state = tokio::sync::Mutex::new(String::from("before"));
        let current = &state;

        let read = move || async move { Ok::<_, AppError>(current.lock().await.clone()) };
        let first: String = cache.cached(keys::USER_DETAIL, &7, None, read()).await.unwrap();
        assert_eq!(first, "before");

        cache
            .invalidating(&[keys::USER_DETAIL], async {
                *current.lock().await = "after".to_string();
                Ok(())
            })
            .await
            .unwrap();

        let second: String = cache.cached(keys::USER_DETAIL, &7, None, read()).await.unwrap();
        assert_eq!(second, "after");
    }

    #[tokio::test]
    async fn failed_writes_do_not_invalidate() {
        let store = MemoryCacheStore::new();
        let cache = enabled_cache(store.clone());
        let _: u8 = cache
            .cached(keys::TAG_LIST, &(), None, async { Ok(1) })
            .await
            .unwrap();

        let result: AppResult<()> = cache
            .invalidating(&[keys::TAG_LIST], async { Err(AppError::bad_request("nope")) })
            .await;
        assert!(result.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn store_outage_degrades_to_compute_but_invalidation_fails() {
        let cache = Cache::new(Arc::new(FailingStore), &Config::default(), EventLog::disabled())
            .with_enabled(true);

        let value: u8 = cache
            .cached(keys::TAG_LIST, &(), None, async { Ok(9) })
            .await
            .unwrap();
        assert_eq!(value, 9);

        let err = cache.invalidate(&[keys::TAG_LIST]).await.unwrap_err();
        assert!(matches!(err, AppError::Cache(_)));
    }

    #[tokio::test]
    async fn disabled_cache_always_computes() {
        let store = MemoryCacheStore::new();
        let cache = Cache::new(Arc::new(store.clone()), &Config::default(), EventLog::disabled());
        assert!(!cache.is_enabled());

        let _: u8 = cache
            .cached(keys::TAG_LIST, &(), None, async { Ok(1) })
            .await
            .unwrap();
        assert!(store.is_empty().await);
    }
}
