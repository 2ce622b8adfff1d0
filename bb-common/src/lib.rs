//! # Binary Blender Common Library
//!
//! Shared code for the Binary Blender service crates including:
//! - Error type and result alias
//! - Bootstrap configuration (TOML, environment, root folder)
//! - Database initialization and runtime settings
//! - API token authentication
//! - Event types and the EventBus

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
