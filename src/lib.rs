pub mod allocation;
pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use allocation::AllocationEngine;
use config::{Config, ConfigError, StorageBackend};
use services::booking::BookingService;
use store::{MemorySeatStore, PgSeatStore, SeatStore};

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub booking: BookingService,
    pub cache: Option<cache::CacheService>,
    pub db: Option<database::Database>,
}

impl AppState {
    /// Подключает настроенное хранилище мест и, если задан, кеш в Redis.
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let (store, db) = match config.storage {
            StorageBackend::Postgres => {
                let db_config = config
                    .database
                    .as_ref()
                    .ok_or(ConfigError::Missing("DATABASE_URL"))?;
                let db = database::Database::connect(db_config).await?;
                db.run_migrations().await?;

                let pg = PgSeatStore::new(db.clone());
                pg.ensure_chart(config.chart.total_seats).await?;
                let store: Arc<dyn SeatStore> = Arc::new(pg);
                (store, Some(db))
            }
            StorageBackend::Memory => {
                info!("Using in-memory seat store");
                let store: Arc<dyn SeatStore> = Arc::new(MemorySeatStore::new(
                    config.chart.total_seats,
                    config.chart.seats_per_row,
                ));
                (store, None)
            }
        };

        let cache = match &config.redis {
            Some(redis_config) => {
                let redis = redis_client::RedisClient::new(&redis_config.url).await?;
                info!("Redis connected");
                Some(cache::CacheService::new(Arc::new(redis), redis_config.seats_ttl_seconds))
            }
            None => None,
        };

        let mut state = Self::with_store(&config, store);
        state.cache = cache;
        state.db = db;
        Ok(Arc::new(state))
    }

    /// Состояние поверх готового хранилища, без кеша и подключения к БД.
    pub fn with_store(config: &Config, store: Arc<dyn SeatStore>) -> Self {
        let engine = AllocationEngine::new(config.chart.seats_per_row);
        let booking = BookingService::new(store, engine, config.chart.max_commit_attempts);
        Self {
            booking,
            cache: None,
            db: None,
        }
    }
}

/// HTTP-приложение целиком: health-маршруты в корне, API бронирования под `/api`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(controllers::health::routes())
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
