//! bb-server library - Binary Blender generation and asset service
//!
//! Exposes the JSON REST API and SSE stream over the repositories in [`db`],
//! the provider clients in [`providers`] and the generation runner in
//! [`services`].

use axum::extract::DefaultBodyLimit;
use axum::Router;
use bb_common::db::RuntimeSettings;
use bb_common::events::EventBus;
use sqlx::SqlitePool;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod providers;
pub mod services;
pub mod storage;

pub use error::{ApiError, ApiResult};

use services::GenerationRunner;
use storage::AssetStorage;

/// Module name reported by /health
pub const MODULE_NAME: &str = "bb-server";

/// Slack on top of max_upload_bytes for multipart framing and text fields
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Object store holding asset bytes
    pub storage: AssetStorage,
    /// Submits, tracks and cancels generation jobs
    pub generations: GenerationRunner,
    /// Event bus feeding the SSE stream
    pub event_bus: EventBus,
    /// Token signing secret; 0 disables verification
    pub shared_secret: i64,
    pub settings: RuntimeSettings,
    pub startup_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(
        db: SqlitePool,
        storage: AssetStorage,
        generations: GenerationRunner,
        event_bus: EventBus,
        shared_secret: i64,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            db,
            storage,
            generations,
            event_bus,
            shared_secret,
            settings,
            startup_time: Instant::now(),
        }
    }
}

/// Build application router
///
/// `/health` and `/api/buildinfo` are public; everything else under `/api`
/// goes through [`api::auth_middleware`].
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post, put};

    let upload_limit = state
        .settings
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES)
        .min(usize::MAX as u64) as usize;

    // Protected routes (require authentication)
    let protected = Router::new()
        // Projects and folders
        .route("/api/projects", get(api::list_projects).post(api::create_project))
        .route(
            "/api/projects/:id",
            get(api::get_project).patch(api::update_project).delete(api::delete_project),
        )
        .route(
            "/api/projects/:id/folders",
            get(api::list_folders).post(api::create_folder),
        )
        .route(
            "/api/folders/:id",
            get(api::get_folder).patch(api::update_folder).delete(api::delete_folder),
        )
        // Assets
        .route("/api/assets", get(api::list_assets).post(api::create_text_asset))
        .route(
            "/api/assets/upload",
            post(api::upload_asset).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/assets/:id",
            get(api::get_asset).patch(api::update_asset).delete(api::delete_asset),
        )
        .route("/api/assets/:id/content", get(api::get_asset_content))
        // Prompt library
        .route("/api/prompts", get(api::list_prompts).post(api::create_prompt))
        .route(
            "/api/prompts/:id",
            get(api::get_prompt).patch(api::update_prompt).delete(api::delete_prompt),
        )
        .route("/api/prompts/:id/use", post(api::use_prompt))
        // Experiments
        .route("/api/experiments", get(api::list_experiments).post(api::create_experiment))
        .route(
            "/api/experiments/:id",
            get(api::get_experiment)
                .patch(api::update_experiment)
                .delete(api::delete_experiment),
        )
        .route("/api/experiments/:id/assets", post(api::add_experiment_asset))
        .route(
            "/api/experiments/:id/assets/:asset_id",
            axum::routing::delete(api::remove_experiment_asset),
        )
        // Model comparisons
        .route("/api/comparisons", get(api::list_comparisons).post(api::create_comparison))
        .route(
            "/api/comparisons/:id",
            get(api::get_comparison).delete(api::delete_comparison),
        )
        .route("/api/comparisons/:id/entries", put(api::record_comparison_result))
        .route("/api/comparisons/:id/run", post(api::run_comparison))
        // Workflow patterns
        .route("/api/workflows", get(api::list_workflows).post(api::create_workflow))
        .route(
            "/api/workflows/:id",
            get(api::get_workflow).patch(api::update_workflow).delete(api::delete_workflow),
        )
        .route("/api/workflows/:id/use", post(api::use_workflow))
        // Generations
        .route("/api/generations", get(api::list_generations).post(api::submit_generation))
        .route("/api/generations/:id", get(api::get_generation))
        .route("/api/generations/:id/cancel", post(api::cancel_generation))
        // SSE event stream
        .route("/api/events", get(api::event_stream))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
