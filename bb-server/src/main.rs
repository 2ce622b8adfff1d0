//! bb-server - Binary Blender generation and asset service
//!
//! `bb-server [serve]` runs the HTTP API; `bb-server issue-token` prints a
//! bearer token for a user, signed with the database's shared secret.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bb_common::api::auth::{issue_token, load_shared_secret};
use bb_common::config::{resolve_root_folder, RootFolder, TomlConfig};
use bb_common::db::{init_database, RuntimeSettings};
use bb_common::events::EventBus;
use bb_server::config::build_provider_registry;
use bb_server::providers::PollConfig;
use bb_server::services::GenerationRunner;
use bb_server::storage::AssetStorage;
use bb_server::{build_router, AppState};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Events buffered per SSE subscriber before it starts lagging
const EVENT_BUS_CAPACITY: usize = 1024;

/// Command-line arguments for bb-server
#[derive(Parser, Debug)]
#[command(name = "bb-server")]
#[command(about = "Binary Blender generation and asset service")]
#[command(version)]
struct Args {
    /// Config file (default: BB_CONFIG, then <config_dir>/binary-blender/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root folder holding the database and local objects
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, global = true, env = "BB_PORT")]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Print a bearer token for a user
    IssueToken {
        /// User id embedded in the token
        #[arg(long)]
        user: String,

        /// Token lifetime in seconds
        #[arg(long, default_value_t = 86_400)]
        ttl_secs: u64,
    },
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid logging.level")?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Arc::new(file)).init();
        }
        None => builder.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config)?;

    // Build identification first, before any database work
    info!(
        "Starting Binary Blender (bb-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolder::new(resolve_root_folder(args.root_folder.as_deref(), &config));
    root_folder.ensure_exists()?;
    info!("Root folder: {}", root_folder.path().display());

    let db_path = root_folder.database_path();
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let shared_secret = load_shared_secret(&pool)
        .await
        .context("Failed to load shared secret")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::IssueToken { user, ttl_secs } => {
            if shared_secret == 0 {
                warn!("API authentication is disabled (api_shared_secret = 0); the token will not be checked");
            }
            let token = issue_token(&user, Duration::from_secs(ttl_secs), shared_secret)
                .context("Failed to issue token")?;
            println!("{}", token);
            Ok(())
        }
        Command::Serve => serve(args.port, config, root_folder, pool, shared_secret).await,
    }
}

async fn serve(
    port: Option<u16>,
    config: TomlConfig,
    root_folder: RootFolder,
    pool: sqlx::SqlitePool,
    shared_secret: i64,
) -> Result<()> {
    if shared_secret == 0 {
        warn!("API authentication disabled (api_shared_secret = 0); callers identify with X-User-Id");
    } else {
        info!("✓ Loaded shared secret for API authentication");
    }

    let settings = RuntimeSettings::load(&pool)
        .await
        .context("Failed to load runtime settings")?;
    info!(
        poll_interval_ms = settings.poll_interval_ms,
        poll_max_attempts = settings.poll_max_attempts,
        "Runtime settings loaded"
    );

    let providers = build_provider_registry(&pool, &config)
        .await
        .context("Failed to configure generation providers")?;
    let configured: Vec<String> = providers.configured().iter().map(|k| k.to_string()).collect();
    if configured.is_empty() {
        warn!("No generation provider configured; generation requests will be rejected");
    } else {
        info!("Generation providers: {}", configured.join(", "));
    }

    let storage = AssetStorage::from_config(&config.storage, &root_folder)
        .context("Failed to configure object storage")?;
    info!("Object storage backend: {}", storage.backend());

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let generations = GenerationRunner::new(
        pool.clone(),
        storage.clone(),
        providers,
        event_bus.clone(),
        PollConfig::from(&settings),
        settings.max_download_bytes,
    );

    if let Err(e) = generations.resume_pending_jobs().await {
        error!("Failed to resume pending generations: {}", e);
    }

    let state = AppState::new(pool, storage, generations, event_bus, shared_secret, settings);
    let app = build_router(state);

    let port = port.unwrap_or(config.port);
    let addr = format!("{}:{}", config.bind_address, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("bb-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Pending jobs stay pending in the database and resume on next start
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
