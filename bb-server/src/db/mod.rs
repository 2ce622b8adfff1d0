//! Database access for bb-server
//!
//! One module per table family. Every query that touches user data is
//! scoped by `user_id`, so a record owned by someone else reads exactly
//! like a missing one.

pub mod assets;
pub mod comparisons;
pub mod experiments;
pub mod folders;
pub mod generations;
pub mod projects;
pub mod prompts;
pub mod workflows;

use bb_common::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Fixed-width RFC 3339 so stored timestamps sort lexically
pub fn fmt_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time truncated to the stored precision
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    parse_time(&fmt_time(now), "now").unwrap_or(now)
}

pub fn parse_time(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

pub fn parse_opt_time(value: Option<String>, column: &str) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_time(&v, column)).transpose()
}

pub fn parse_uuid(value: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

pub fn parse_opt_uuid(value: Option<String>, column: &str) -> Result<Option<Uuid>> {
    value.map(|v| parse_uuid(&v, column)).transpose()
}

pub fn to_json<T: Serialize + ?Sized>(value: &T, column: &str) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", column, e)))
}

pub fn from_json<T: DeserializeOwned>(value: &str, column: &str) -> Result<T> {
    serde_json::from_str(value)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", column, e)))
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern
pub fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Test fixtures shared by the repository tests
#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{Folder, Project};
    use sqlx::SqlitePool;
    use uuid::Uuid;

    pub async fn pool() -> SqlitePool {
        bb_common::db::init_memory_database().await.unwrap()
    }

    pub async fn project(pool: &SqlitePool, user: &str, name: &str) -> Project {
        super::projects::insert_project(pool, user, name, None).await.unwrap()
    }

    pub async fn folder(pool: &SqlitePool, user: &str, project_id: Uuid, parent: Option<Uuid>, name: &str) -> Folder {
        super::folders::create_folder(pool, user, project_id, parent, name).await.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_format_sorts_lexically() {
        let a = parse_time("2024-01-01T00:00:00Z", "a").unwrap();
        let b = parse_time("2024-01-01T00:00:00.5Z", "b").unwrap();
        assert!(fmt_time(a) < fmt_time(b));
        assert_eq!(fmt_time(a), "2024-01-01T00:00:00.000000Z");
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("cat"), "%cat%");
    }
}
