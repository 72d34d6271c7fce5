//! Application configuration management.
//!
//! Provides typed configuration loaded from environment variables with
//! validation, including selection and tuning of the storage backend.

use std::path::PathBuf;
use std::time::Duration;

use crate::store::memory::DEFAULT_CAPACITY;

/// Which storage backend the server persists tasks in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Bounded in-process map; lost on restart.
    Memory,
    /// Embedded redb file with TTL and background compaction.
    Redb,
    /// PostgreSQL.
    Postgres,
    /// External Redis.
    Redis,
    /// In-process LRU cache.
    Cache,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redb" => Ok(Self::Redb),
            "postgres" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            "cache" => Ok(Self::Cache),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Owner name under which tasks are addressed (`<name>.tasks.<id>`)
    pub service_name: String,

    /// Server port to bind to
    pub port: u16,

    /// Selected storage backend
    pub backend: StoreBackend,

    /// In-memory backend settings
    pub memory: MemoryConfig,

    /// Embedded KV backend settings
    pub redb: RedbConfig,

    /// PostgreSQL DSN; required when `backend == Postgres`
    pub database_url: Option<String>,

    /// Redis backend settings
    pub redis: RedisConfig,

    /// Cache backend settings
    pub cache: CacheConfig,
}

#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Maximum number of resident tasks before oldest-first eviction
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub struct RedbConfig {
    /// Database file location
    pub path: PathBuf,

    /// How long written tasks stay readable
    pub retention: Duration,

    /// Delay between background compaction runs
    pub compaction_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL; required when `backend == Redis`
    pub url: Option<String>,

    /// Key prefix shared by all task records
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// LRU capacity of the in-process cache
    pub capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Default for RedbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tasks.redb"),
            retention: crate::store::redb::DEFAULT_RETENTION,
            compaction_interval: crate::store::redb::DEFAULT_COMPACTION_INTERVAL,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            bucket: crate::store::redis::DEFAULT_BUCKET.to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Configuration loading error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Configuration error for '{}': {}",
            self.field, self.message
        )
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `SERVICE_NAME`: owner name for resource paths (default: task-tracker)
    /// - `PORT`: server port (default: 8085)
    /// - `STORE_BACKEND`: memory | redb | postgres | redis | cache (default: memory)
    /// - `MEMORY_CAPACITY`: in-memory task limit (default: 1000)
    /// - `REDB_PATH`: redb file path (default: tasks.redb)
    /// - `REDB_RETENTION_SECS`: per-task retention (default: 7 days)
    /// - `REDB_COMPACTION_INTERVAL_SECS`: compaction cadence (default: 300)
    /// - `DATABASE_URL`: PostgreSQL DSN (required for the postgres backend)
    /// - `REDIS_URL`: Redis URL (required for the redis backend)
    /// - `REDIS_BUCKET`: key prefix (default: tasks)
    /// - `CACHE_CAPACITY`: LRU capacity (default: 1000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let service_name =
            std::env::var("SERVICE_NAME").unwrap_or_else(|_| "task-tracker".to_string());
        let port = parse_env_or("PORT", 8085)?;

        let backend = match std::env::var("STORE_BACKEND") {
            Ok(raw) => raw.parse().map_err(|message| ConfigError {
                field: "STORE_BACKEND".to_string(),
                message,
            })?,
            Err(_) => StoreBackend::Memory,
        };

        let memory = MemoryConfig {
            capacity: parse_env_or("MEMORY_CAPACITY", DEFAULT_CAPACITY)?,
        };

        let redb_defaults = RedbConfig::default();
        let redb = RedbConfig {
            path: std::env::var("REDB_PATH")
                .map(PathBuf::from)
                .unwrap_or(redb_defaults.path),
            retention: Duration::from_secs(parse_env_or(
                "REDB_RETENTION_SECS",
                redb_defaults.retention.as_secs(),
            )?),
            compaction_interval: Duration::from_secs(parse_env_or(
                "REDB_COMPACTION_INTERVAL_SECS",
                redb_defaults.compaction_interval.as_secs(),
            )?),
        };

        let redis = RedisConfig {
            url: std::env::var("REDIS_URL").ok(),
            bucket: std::env::var("REDIS_BUCKET")
                .unwrap_or_else(|_| RedisConfig::default().bucket),
        };

        let cache = CacheConfig {
            capacity: parse_env_or("CACHE_CAPACITY", DEFAULT_CAPACITY)?,
        };

        let config = Self {
            service_name,
            port,
            backend,
            memory,
            redb,
            database_url: std::env::var("DATABASE_URL").ok(),
            redis,
            cache,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError {
                field: "SERVICE_NAME".to_string(),
                message: "Cannot be empty".to_string(),
            });
        }

        if self.backend == StoreBackend::Postgres && self.database_url.is_none() {
            return Err(ConfigError {
                field: "DATABASE_URL".to_string(),
                message: "Required for the postgres backend".to_string(),
            });
        }

        if self.backend == StoreBackend::Redis && self.redis.url.is_none() {
            return Err(ConfigError {
                field: "REDIS_URL".to_string(),
                message: "Required for the redis backend".to_string(),
            });
        }

        if self.memory.capacity == 0 {
            return Err(ConfigError {
                field: "MEMORY_CAPACITY".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.redb.retention.is_zero() {
            return Err(ConfigError {
                field: "REDB_RETENTION_SECS".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Parse an environment variable or return a default value.
fn parse_env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(val) => val.parse().map_err(|_| ConfigError {
            field: name.to_string(),
            message: format!("Invalid value '{}', expected a valid number", val),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("memory".parse(), Ok(StoreBackend::Memory));
        assert_eq!("Redb".parse(), Ok(StoreBackend::Redb));
        assert!("mongodb".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_redb_defaults() {
        let config = RedbConfig::default();
        assert_eq!(config.retention, Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(config.compaction_interval, Duration::from_secs(300));
    }
}
