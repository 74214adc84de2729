use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient, RedisResult};

use super::CacheStore;

const SCAN_BATCH: usize = 200;

/// Redis 缓存存储
#[derive(Clone)]
pub struct RedisCacheStore {
    redis: Arc<RedisClient>,
}

impl RedisCacheStore {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }
}

/// 转义 glob 特殊字符，前缀按字面匹配
fn escape_glob(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        conn.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> RedisResult<()> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> RedisResult<Vec<String>> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let pattern = format!("{}*", escape_glob(prefix));

        // SCAN 不阻塞服务端，游标回到 0 表示遍历结束
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> RedisResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        conn.del(keys).await
    }

    async fn incr_window(&self, key: &str, window: Duration) -> RedisResult<(u64, u64)> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        // 使用 INCR 和 EXPIRE 实现固定窗口计数
        let count: u64 = conn.incr(key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(key, window.as_secs() as i64).await?;
        }

        let ttl: i64 = conn.ttl(key).await?;
        let ttl = if ttl < 0 { window.as_secs() } else { ttl as u64 };
        Ok((count, ttl))
    }
}
