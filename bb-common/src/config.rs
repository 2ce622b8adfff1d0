//! Bootstrap configuration and root folder resolution
//!
//! Two-tier configuration:
//! 1. **Bootstrap** (this module): TOML file, environment variables and
//!    command-line arguments. Read once at startup.
//! 2. **Runtime**: the database `settings` table (see [`crate::db::settings`]).
//!
//! A missing TOML file is never fatal. The service logs a warning and
//! continues with compiled defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "BB_CONFIG";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "BB_ROOT_FOLDER";

/// Directory name used under the platform config/data directories
const APP_DIR_NAME: &str = "binary-blender";

/// Database file name inside the root folder
const DATABASE_FILE_NAME: &str = "binary-blender.db";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and local objects
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Object storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Generation provider credentials and endpoints
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: default_bind_address(),
            port: default_port(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Object storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Files under `<root_folder>/objects` (or `local_path`)
    #[default]
    Local,
    /// S3 or any S3-compatible host
    S3,
    /// Process memory, contents lost on exit
    Memory,
}

/// Object storage configuration
#[derive(Clone, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible hosts
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Permit plain-http endpoints (local S3 emulators)
    #[serde(default)]
    pub allow_http: bool,
    /// Override for the local backend directory
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("allow_http", &self.allow_http)
            .field("local_path", &self.local_path)
            .finish_non_exhaustive()
    }
}

/// Generation provider credentials and base URL overrides
#[derive(Clone, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub replicate_api_token: Option<String>,
    #[serde(default)]
    pub runway_api_key: Option<String>,
    #[serde(default)]
    pub akool_api_key: Option<String>,
    #[serde(default)]
    pub replicate_base_url: Option<String>,
    #[serde(default)]
    pub runway_base_url: Option<String>,
    #[serde(default)]
    pub akool_base_url: Option<String>,
}

impl std::fmt::Debug for ProvidersConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvidersConfig")
            .field("replicate_api_token", &self.replicate_api_token.as_ref().map(|_| "<set>"))
            .field("runway_api_key", &self.runway_api_key.as_ref().map(|_| "<set>"))
            .field("akool_api_key", &self.akool_api_key.as_ref().map(|_| "<set>"))
            .field("replicate_base_url", &self.replicate_base_url)
            .field("runway_base_url", &self.runway_base_url)
            .field("akool_base_url", &self.akool_base_url)
            .finish()
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration following the lookup order:
    /// 1. Explicit path (command line)
    /// 2. `BB_CONFIG` environment variable
    /// 3. `<config_dir>/binary-blender/config.toml`
    /// 4. Compiled defaults
    ///
    /// A missing file at any tier falls back to the defaults with a warning.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(default_config_path);

        let path = match path {
            Some(path) if path.exists() => path,
            Some(path) => {
                warn!("Config file {} not found, using built-in defaults", path.display());
                return Ok(Self::default());
            }
            None => {
                warn!("No config file location available, using built-in defaults");
                return Ok(Self::default());
            }
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Platform config file location (`~/.config/binary-blender/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"))
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./binary-blender-data"))
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. `BB_ROOT_FOLDER` environment variable
/// 3. TOML `root_folder`
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Resolved root folder with derived locations
#[derive(Debug, Clone)]
pub struct RootFolder {
    path: PathBuf,
}

impl RootFolder {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the root folder if it does not exist yet
    pub fn ensure_exists(&self) -> Result<()> {
        if !self.path.exists() {
            std::fs::create_dir_all(&self.path)?;
            info!("Created root folder: {}", self.path.display());
        }
        Ok(())
    }

    /// SQLite database file inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.path.join(DATABASE_FILE_NAME)
    }

    /// Directory used by the local object storage backend
    pub fn objects_path(&self) -> PathBuf {
        self.path.join("objects")
    }
}
