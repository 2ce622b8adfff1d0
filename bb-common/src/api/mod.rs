//! Shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Database operations (via sqlx)
//!
//! The server wraps these with axum middleware.

pub mod auth;

pub use auth::{
    calculate_hash, initialize_shared_secret, issue_token, load_shared_secret, now_millis,
    validate_token, validate_user_id, AuthTokenError, SHARED_SECRET_KEY, TOKEN_PREFIX,
};
