//! cache.rs
//!
//! Кеш представления зала в Redis.
//!
//! Снимок хранится под ключом поколения `seats:chart:{N}`. Коммит и сброс
//! увеличивают счётчик `seats:generation`, а запись в кеш идёт под тем
//! поколением, которое было прочитано до запроса к хранилищу. Устаревший
//! снимок, записанный после инвалидации, попадает под старый ключ и больше
//! не читается.

use async_trait::async_trait;
use redis::RedisResult;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::Seat;

const SEATS_KEY_PREFIX: &str = "seats:chart";
const GENERATION_KEY: &str = "seats:generation";

/// Минимальный набор команд Redis, который нужен кешу.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> RedisResult<Option<String>>;
    async fn set_ex(&self, key: &str, value: String, ttl_seconds: u64) -> RedisResult<()>;
    async fn incr(&self, key: &str) -> RedisResult<u64>;
}

pub fn seats_key(generation: u64) -> String {
    format!("{}:{}", SEATS_KEY_PREFIX, generation)
}

/// Кеш представления зала. Хранилище мест остаётся источником истины:
/// любая ошибка здесь пишется в лог и считается промахом.
#[derive(Clone)]
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
    ttl_seconds: u64,
}

impl CacheService {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl_seconds: u64) -> Self {
        Self { backend, ttl_seconds }
    }

    /// Текущее поколение снимка. `None`, если Redis недоступен: тогда кеш
    /// в этом запросе не читается и не пишется.
    pub async fn generation(&self) -> Option<u64> {
        match self.backend.get(GENERATION_KEY).await {
            Ok(None) => Some(0),
            Ok(Some(raw)) => raw
                .parse()
                .map_err(|e| warn!("Seat cache generation {:?} is not a number: {:?}", raw, e))
                .ok(),
            Err(e) => {
                warn!("Seat cache generation read failed: {:?}", e);
                None
            }
        }
    }

    pub async fn get_seats(&self, generation: u64) -> Option<Vec<Seat>> {
        let data = match self.backend.get(&seats_key(generation)).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Seat cache read failed: {:?}", e);
                return None;
            }
        };

        let seats = serde_json::from_str(&data?)
            .map_err(|e| warn!("Seat cache holds unreadable data: {:?}", e))
            .ok()?;
        debug!(generation, "Seat cache hit");
        Some(seats)
    }

    pub async fn save_seats(&self, generation: u64, seats: &[Seat]) {
        let data = match serde_json::to_string(seats) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to serialize seats for cache: {:?}", e);
                return;
            }
        };

        if let Err(e) = self
            .backend
            .set_ex(&seats_key(generation), data, self.ttl_seconds)
            .await
        {
            warn!("Seat cache write failed: {:?}", e);
        }
    }

    // Инвалидировать кеш мест после коммита или сброса
    pub async fn invalidate_seats(&self) {
        match self.backend.incr(GENERATION_KEY).await {
            Ok(generation) => info!(generation, "Invalidated seats cache"),
            Err(e) => warn!("Failed to invalidate seats cache: {:?}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryBackend {
        data: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl CacheBackend for MemoryBackend {
        async fn get(&self, key: &str) -> RedisResult<Option<String>> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        async fn set_ex(&self, key: &str, value: String, _ttl_seconds: u64) -> RedisResult<()> {
            self.data.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        async fn incr(&self, key: &str) -> RedisResult<u64> {
            let mut data = self.data.lock().unwrap();
            let next = data.get(key).map_or(0, |v| v.parse::<u64>().unwrap()) + 1;
            data.insert(key.to_string(), next.to_string());
            Ok(next)
        }
    }

    struct DownBackend;

    #[async_trait]
    impl CacheBackend for DownBackend {
        async fn get(&self, _key: &str) -> RedisResult<Option<String>> {
            Err((redis::ErrorKind::IoError, "connection refused").into())
        }

        async fn set_ex(&self, _key: &str, _value: String, _ttl_seconds: u64) -> RedisResult<()> {
            Err((redis::ErrorKind::IoError, "connection refused").into())
        }

        async fn incr(&self, _key: &str) -> RedisResult<u64> {
            Err((redis::ErrorKind::IoError, "connection refused").into())
        }
    }

    fn seats(booked: &[i64]) -> Vec<Seat> {
        (1..=7)
            .map(|id| Seat {
                id,
                booked: booked.contains(&id),
                booking_id: booked.contains(&id).then_some(1),
            })
            .collect()
    }

    #[test]
    fn snapshot_key_carries_generation() {
        assert_eq!(seats_key(0), "seats:chart:0");
        assert_eq!(seats_key(42), "seats:chart:42");
    }

    #[tokio::test]
    async fn saved_seats_are_served_until_invalidated() {
        let cache = CacheService::new(Arc::new(MemoryBackend::default()), 60);

        let generation = cache.generation().await.unwrap();
        assert_eq!(generation, 0);
        assert!(cache.get_seats(generation).await.is_none());

        cache.save_seats(generation, &seats(&[])).await;
        assert_eq!(cache.get_seats(generation).await, Some(seats(&[])));

        cache.invalidate_seats().await;
        let generation = cache.generation().await.unwrap();
        assert_eq!(generation, 1);
        assert!(cache.get_seats(generation).await.is_none());
    }

    #[tokio::test]
    async fn stale_write_after_invalidation_is_never_served() {
        let cache = CacheService::new(Arc::new(MemoryBackend::default()), 60);

        // просмотр читает поколение и снимок до коммита
        let seen = cache.generation().await.unwrap();
        let stale = seats(&[]);

        // конкурентная бронь коммитится и инвалидирует кеш
        cache.invalidate_seats().await;

        // просмотр дописывает старый снимок уже после инвалидации
        cache.save_seats(seen, &stale).await;

        let current = cache.generation().await.unwrap();
        assert_ne!(current, seen);
        assert!(cache.get_seats(current).await.is_none());

        cache.save_seats(current, &seats(&[1, 2, 3])).await;
        assert_eq!(cache.get_seats(current).await, Some(seats(&[1, 2, 3])));
    }

    #[tokio::test]
    async fn unreachable_redis_disables_cache_for_the_request() {
        let cache = CacheService::new(Arc::new(DownBackend), 60);

        assert_eq!(cache.generation().await, None);
        assert!(cache.get_seats(0).await.is_none());

        // ошибки записи и инвалидации только логируются
        cache.save_seats(0, &seats(&[])).await;
        cache.invalidate_seats().await;
    }
}
