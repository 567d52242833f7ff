use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisResult};

use crate::cache::CacheBackend;

#[derive(Clone)]
pub struct RedisClient {
    pub conn: ConnectionManager,
}

impl RedisClient {
    // ConnectionManager сам переподключается после обрыва
    pub async fn new(redis_url: &str) -> RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(RedisClient { conn })
    }
}

#[async_trait]
impl CacheBackend for RedisClient {
    async fn get(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await
    }

    async fn set_ex(&self, key: &str, value: String, ttl_seconds: u64) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex(key, value, ttl_seconds).await
    }

    async fn incr(&self, key: &str) -> RedisResult<u64> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1u64).await
    }
}
