//! Runtime settings stored in the `settings` table
//!
//! Database-first runtime configuration: every key has a built-in default
//! that is written back when the row is missing, so the table always shows
//! the effective values.

use crate::{Error, Result};
use sqlx::SqlitePool;
use std::fmt::Display;
use std::str::FromStr;
use tracing::info;

pub const POLL_INTERVAL_MS_KEY: &str = "generation_poll_interval_ms";
pub const POLL_MAX_ATTEMPTS_KEY: &str = "generation_poll_max_attempts";
pub const MAX_UPLOAD_BYTES_KEY: &str = "max_upload_bytes";
pub const MAX_DOWNLOAD_BYTES_KEY: &str = "max_download_bytes";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 60;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 500 * 1024 * 1024;

/// Write built-in defaults for any missing runtime setting (idempotent)
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    let defaults: [(&str, String); 4] = [
        (POLL_INTERVAL_MS_KEY, DEFAULT_POLL_INTERVAL_MS.to_string()),
        (POLL_MAX_ATTEMPTS_KEY, DEFAULT_POLL_MAX_ATTEMPTS.to_string()),
        (MAX_UPLOAD_BYTES_KEY, DEFAULT_MAX_UPLOAD_BYTES.to_string()),
        (MAX_DOWNLOAD_BYTES_KEY, DEFAULT_MAX_DOWNLOAD_BYTES.to_string()),
    ];

    for (key, value) in defaults {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Read a raw setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

/// Insert or replace a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Read and parse a setting, writing `default` back when the row is missing
pub async fn get_or_init_setting<T>(pool: &SqlitePool, key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match get_setting(pool, key).await? {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| Error::Config(format!("Invalid value for setting '{}': {}", key, e))),
        None => {
            info!("Setting '{}' not found in database, using default: {}", key, default);
            set_setting(pool, key, &default.to_string()).await?;
            Ok(default)
        }
    }
}

/// Runtime settings consumed by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,
    pub max_upload_bytes: u64,
    pub max_download_bytes: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
        }
    }
}

impl RuntimeSettings {
    /// Load runtime settings from the database
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let settings = Self {
            poll_interval_ms: get_or_init_setting(pool, POLL_INTERVAL_MS_KEY, DEFAULT_POLL_INTERVAL_MS)
                .await?,
            poll_max_attempts: get_or_init_setting(
                pool,
                POLL_MAX_ATTEMPTS_KEY,
                DEFAULT_POLL_MAX_ATTEMPTS,
            )
            .await?,
            max_upload_bytes: get_or_init_setting(pool, MAX_UPLOAD_BYTES_KEY, DEFAULT_MAX_UPLOAD_BYTES)
                .await?,
            max_download_bytes: get_or_init_setting(
                pool,
                MAX_DOWNLOAD_BYTES_KEY,
                DEFAULT_MAX_DOWNLOAD_BYTES,
            )
            .await?,
        };

        if settings.poll_max_attempts == 0 {
            return Err(Error::Config(format!("{} must be at least 1", POLL_MAX_ATTEMPTS_KEY)));
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    #[tokio::test]
    async fn test_defaults_written_once() {
        let pool = init_memory_database().await.unwrap();
        init_default_settings(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM settings WHERE key = 'generation_poll_interval_ms'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);

        let settings = RuntimeSettings::load(&pool).await.unwrap();
        assert_eq!(settings, RuntimeSettings::default());
    }

    #[tokio::test]
    async fn test_existing_value_is_kept() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, POLL_MAX_ATTEMPTS_KEY, "5").await.unwrap();
        init_default_settings(&pool).await.unwrap();

        let settings = RuntimeSettings::load(&pool).await.unwrap();
        assert_eq!(settings.poll_max_attempts, 5);
    }

    #[tokio::test]
    async fn test_missing_value_written_back() {
        let pool = init_memory_database().await.unwrap();
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(POLL_INTERVAL_MS_KEY)
            .execute(&pool)
            .await
            .unwrap();

        let value: u64 = get_or_init_setting(&pool, POLL_INTERVAL_MS_KEY, 1234).await.unwrap();
        assert_eq!(value, 1234);
        assert_eq!(
            get_setting(&pool, POLL_INTERVAL_MS_KEY).await.unwrap().as_deref(),
            Some("1234")
        );
    }

    #[tokio::test]
    async fn test_unparseable_value_is_config_error() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, MAX_UPLOAD_BYTES_KEY, "lots").await.unwrap();
        let err = RuntimeSettings::load(&pool).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
