use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub storage: StorageBackend,
    pub database: Option<DatabaseConfig>,
    pub redis: Option<RedisConfig>,
    pub chart: ChartConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub acquire_timeout_seconds: u64,
}

// Настройки Redis (кеш схемы зала)
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub seats_ttl_seconds: u64,
}

// Схема зала и политика повторов
#[derive(Debug, Clone, Deserialize)]
pub struct ChartConfig {
    pub total_seats: usize,
    pub seats_per_row: usize,
    pub max_commit_attempts: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            total_seats: 80,
            seats_per_row: 7,
            max_commit_attempts: 3,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Собирает конфигурацию из любого источника переменных; `from_env`
    /// передаёт сюда окружение процесса.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let storage = match vars.or("STORAGE_BACKEND", "postgres").to_ascii_lowercase().as_str() {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let log_format = match vars.or("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        let database = match storage {
            StorageBackend::Postgres => Some(DatabaseConfig {
                url: vars.required("DATABASE_URL")?,
                pool_size: vars.parse("DB_POOL_SIZE", 20)?,
                acquire_timeout_seconds: vars.parse("DB_ACQUIRE_TIMEOUT_SECONDS", 5)?,
            }),
            StorageBackend::Memory => None,
        };

        let redis = match vars.get("REDIS_URL") {
            Some(url) => Some(RedisConfig {
                url,
                seats_ttl_seconds: vars.parse("SEATS_CACHE_TTL_SECONDS", 60)?,
            }),
            None => None,
        };

        let defaults = ChartConfig::default();
        let chart = ChartConfig {
            total_seats: vars.parse("TOTAL_SEATS", defaults.total_seats)?,
            seats_per_row: vars.parse("SEATS_PER_ROW", defaults.seats_per_row)?,
            max_commit_attempts: vars.parse("MAX_COMMIT_ATTEMPTS", defaults.max_commit_attempts)?,
        };
        if chart.seats_per_row == 0 {
            return Err(ConfigError::Invalid {
                name: "SEATS_PER_ROW",
                value: "0".to_string(),
            });
        }
        if chart.max_commit_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_COMMIT_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(Config {
            app: AppConfig {
                host: vars.or("HOST", "0.0.0.0"),
                port: vars.parse("PORT", 8000)?,
                environment: vars.or("ENVIRONMENT", "development"),
                rust_log: vars.or("RUST_LOG", "seat_booking=debug,tower_http=debug"),
                log_format,
            },
            storage,
            database,
            redis,
            chart,
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn parse<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            Some(value) => {
                let parsed = value.trim().parse::<T>();
                parsed.map_err(|_| ConfigError::Invalid { name, value })
            }
            None => Ok(default),
        }
    }
}
