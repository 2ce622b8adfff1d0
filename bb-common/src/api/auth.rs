//! API authentication via signed identity tokens
//!
//! Identity issuance (OAuth sign-in) happens outside this service. The
//! service only verifies tokens signed with the shared secret:
//!
//! ```text
//! bb1.<base64url(user_id)>.<expires_at_ms>.<sha256_hex>
//! ```
//!
//! The hash is SHA-256 over `"{user_id}:{expires_at_ms}:{secret}"`. The
//! shared secret lives in the `settings` table under `api_shared_secret`.
//! The special value 0 disables token checking (development mode).
//!
//! # Pure Functions
//!
//! Apart from the secret loaders this module has no I/O and no HTTP
//! framework dependency.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Version prefix of every token
pub const TOKEN_PREFIX: &str = "bb1";

/// Settings key holding the shared secret
pub const SHARED_SECRET_KEY: &str = "api_shared_secret";

/// Maximum accepted user id length
const MAX_USER_ID_LEN: usize = 256;

// ========================================
// Error Types
// ========================================

/// Token validation and secret management errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthTokenError {
    /// Token does not have the expected shape
    Malformed(String),

    /// Token expiry is in the past
    Expired { expires_at: i64, now: i64 },

    /// Hash does not match calculated value
    InvalidHash,

    /// Database error loading or storing the shared secret
    DatabaseError(String),
}

impl std::fmt::Display for AuthTokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthTokenError::Malformed(reason) => write!(f, "Malformed token: {}", reason),
            AuthTokenError::Expired { expires_at, now } => {
                write!(f, "Token expired {}ms ago", now - expires_at)
            }
            AuthTokenError::InvalidHash => write!(f, "Invalid token signature"),
            AuthTokenError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for AuthTokenError {}

// ========================================
// Shared Secret Management
// ========================================

/// Load shared secret from database settings
///
/// Generates and stores a new secret when none exists yet.
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, AuthTokenError> {
    let result: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(SHARED_SECRET_KEY)
        .fetch_optional(db)
        .await
        .map_err(|e| AuthTokenError::DatabaseError(e.to_string()))?;

    match result {
        Some((value,)) => value
            .trim()
            .parse::<i64>()
            .map_err(|e| AuthTokenError::DatabaseError(format!("Invalid i64: {}", e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Generate a random non-zero secret and store it
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, AuthTokenError> {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let secret: i64 = loop {
        let val = rng.gen::<i64>();
        if val != 0 {
            break val;
        }
    };

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(SHARED_SECRET_KEY)
        .bind(secret.to_string())
        .execute(db)
        .await
        .map_err(|e| AuthTokenError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

// ========================================
// Token Issue / Validation
// ========================================

/// Current Unix time in milliseconds
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Calculate the token hash for a user and expiry
///
/// # Examples
///
/// ```
/// use bb_common::api::auth::calculate_hash;
///
/// let a = calculate_hash("alice", 1_700_000_000_000, 42);
/// let b = calculate_hash("alice", 1_700_000_000_000, 43);
/// assert_eq!(a.len(), 64);
/// assert_ne!(a, b);
/// ```
pub fn calculate_hash(user_id: &str, expires_at_ms: i64, secret: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", user_id, expires_at_ms, secret).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Issue a token for `user_id` valid for `ttl`
pub fn issue_token(user_id: &str, ttl: Duration, secret: i64) -> Result<String, AuthTokenError> {
    validate_user_id(user_id)?;

    let expires_at = now_millis().saturating_add(ttl.as_millis() as i64);
    let hash = calculate_hash(user_id, expires_at, secret);

    Ok(format!(
        "{}.{}.{}.{}",
        TOKEN_PREFIX,
        URL_SAFE_NO_PAD.encode(user_id.as_bytes()),
        expires_at,
        hash
    ))
}

/// Validate a token and return the user id it carries
///
/// # Examples
///
/// ```
/// use bb_common::api::auth::{issue_token, now_millis, validate_token};
/// use std::time::Duration;
///
/// let token = issue_token("alice", Duration::from_secs(60), 7).unwrap();
/// assert_eq!(validate_token(&token, 7, now_millis()).unwrap(), "alice");
/// assert!(validate_token(&token, 8, now_millis()).is_err());
/// ```
pub fn validate_token(token: &str, secret: i64, now_ms: i64) -> Result<String, AuthTokenError> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 4 {
        return Err(AuthTokenError::Malformed(format!(
            "expected 4 segments, found {}",
            parts.len()
        )));
    }

    if parts[0] != TOKEN_PREFIX {
        return Err(AuthTokenError::Malformed(format!(
            "unknown token version '{}'",
            parts[0]
        )));
    }

    let user_bytes = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|e| AuthTokenError::Malformed(format!("user segment: {}", e)))?;
    let user_id = String::from_utf8(user_bytes)
        .map_err(|_| AuthTokenError::Malformed("user segment is not UTF-8".to_string()))?;
    validate_user_id(&user_id)?;

    let expires_at: i64 = parts[2]
        .parse()
        .map_err(|_| AuthTokenError::Malformed("expiry is not an integer".to_string()))?;

    let calculated = calculate_hash(&user_id, expires_at, secret);
    if !constant_time_eq(calculated.as_bytes(), parts[3].as_bytes()) {
        return Err(AuthTokenError::InvalidHash);
    }

    if expires_at < now_ms {
        return Err(AuthTokenError::Expired {
            expires_at,
            now: now_ms,
        });
    }

    Ok(user_id)
}

/// Check that a user id is usable as an owner key
pub fn validate_user_id(user_id: &str) -> Result<(), AuthTokenError> {
    if user_id.trim().is_empty() {
        return Err(AuthTokenError::Malformed("empty user id".to_string()));
    }
    if user_id.len() > MAX_USER_ID_LEN {
        return Err(AuthTokenError::Malformed("user id too long".to_string()));
    }
    if user_id.chars().any(char::is_control) {
        return Err(AuthTokenError::Malformed(
            "user id contains control characters".to_string(),
        ));
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
