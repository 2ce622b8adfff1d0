//! Generation endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use super::CurrentUser;
use crate::db;
use crate::error::ApiResult;
use crate::models::{CreateGenerationRequest, GenerationFilter, GenerationJob};
use crate::pagination::{calculate_pagination, Page};
use crate::AppState;

/// GET /api/generations
pub async fn list_generations(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<GenerationFilter>, QueryRejection>,
) -> ApiResult<Json<Page<GenerationJob>>> {
    let Query(filter) = query?;
    let total = db::generations::count_generations(&state.db, user.id(), &filter).await?;
    let pagination = calculate_pagination(total, filter.page, filter.page_size);
    let items = db::generations::list_generations(
        &state.db,
        user.id(),
        &filter,
        pagination.page_size,
        pagination.offset,
    )
    .await?;
    Ok(Json(Page::new(items, total, pagination)))
}

/// POST /api/generations
///
/// Returns 202 with the pending job; progress arrives over /api/events.
pub async fn submit_generation(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreateGenerationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<GenerationJob>)> {
    let Json(request) = payload?;
    let job = state.generations.submit(user.id(), request).await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// GET /api/generations/:id
pub async fn get_generation(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<GenerationJob>> {
    let Path(id) = path?;
    Ok(Json(db::generations::get_generation(&state.db, user.id(), id).await?))
}

/// POST /api/generations/:id/cancel
pub async fn cancel_generation(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<GenerationJob>> {
    let Path(id) = path?;
    Ok(Json(state.generations.cancel(user.id(), id).await?))
}
