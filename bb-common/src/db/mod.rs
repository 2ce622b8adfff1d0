//! Database initialization and runtime settings

pub mod init;
pub mod settings;

pub use init::{create_schema, init_database, init_memory_database};
pub use settings::RuntimeSettings;
